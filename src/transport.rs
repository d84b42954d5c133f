//! The byte-stream seam between the client and the management socket.
//!
//! [`VarnishAdmin`](crate::VarnishAdmin) only talks to the daemon through
//! this trait, so tests can drive it with a scripted double instead of a
//! live socket. [`TcpTransport`](crate::TcpTransport) is the production
//! implementation.

use crate::error::Result;
use crate::protocol::Frame;
use std::time::Duration;

/// A duplex connection to one fixed `host:port`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open the connection, failing if it cannot be established within
    /// `timeout`.
    async fn open(&mut self, timeout: Duration) -> Result<()>;

    /// Whether a connection is currently held.
    fn is_open(&self) -> bool;

    /// Write `line` followed by a newline.
    async fn write_line(&mut self, line: &str) -> Result<()>;

    /// Read and decode one response frame.
    async fn read_frame(&mut self) -> Result<Frame>;

    /// Drop the connection if there is one. Idempotent.
    fn close(&mut self);

    /// The `host:port` this transport dials.
    fn addr(&self) -> &str;
}
