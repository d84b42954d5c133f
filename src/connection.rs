//! TCP transport for the management socket.

use crate::error::{AdminError, Result};
use crate::protocol::{read_frame, Frame};
use crate::transport::Transport;

use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

struct Stream {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

/// A [`Transport`] over a Tokio `TcpStream`.
pub struct TcpTransport {
    addr: String,
    read_timeout: Duration,
    stream: Option<Stream>,
}

impl TcpTransport {
    /// Create a transport for `addr`. Nothing is dialed until
    /// [`Transport::open`].
    pub fn new(addr: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            read_timeout,
            stream: None,
        }
    }

    fn stream(&mut self) -> Result<&mut Stream> {
        self.stream.as_mut().ok_or(AdminError::NotConnected)
    }
}

impl Transport for TcpTransport {
    async fn open(&mut self, timeout: Duration) -> Result<()> {
        debug!("Connecting to {}", self.addr);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| AdminError::ConnectionFailed {
                addr: self.addr.clone(),
                reason: format!("timed out after {:?}", timeout),
            })?
            .map_err(|e| AdminError::ConnectionFailed {
                addr: self.addr.clone(),
                reason: e.to_string(),
            })?;

        let (read_half, write_half) = stream.into_split();
        self.stream = Some(Stream {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let stream = self.stream()?;
        stream.writer.write_all(line.as_bytes()).await?;
        stream.writer.write_all(b"\n").await?;
        stream.writer.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        let read_timeout = self.read_timeout;
        let addr = self.addr.clone();
        let stream = self.stream()?;

        tokio::time::timeout(read_timeout, read_frame(&mut stream.reader, &addr))
            .await
            .map_err(|_| AdminError::Timeout)?
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            trace!("Closed connection to {}", self.addr);
        }
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}
