//! Protocol message framing.
//!
//! Every response from the management socket is one frame:
//!
//! ```text
//! 200 19      \n
//! PONG 1700000000 1.0\n
//! ```
//!
//! The status line carries a three digit code and the payload length, each
//! left-aligned and space padded. Exactly that many payload bytes follow,
//! then a single newline terminator.

use crate::error::{AdminError, Result, StatusCode};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::trace;

/// Longest status line this client accepts. Real ones are 13 bytes.
const MAX_STATUS_LINE: usize = 64;

/// Largest payload the eight-digit length field can declare.
pub const MAX_PAYLOAD: usize = 99_999_999;

/// One decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The numeric status code.
    pub code: u16,
    /// The raw payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame from a code and payload text.
    pub fn new(code: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    /// Get the status code as an enum.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code)
    }

    /// The payload as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Encode this frame the way the daemon writes it.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{:<3} {:<8}\n", self.code, self.payload.len()).into_bytes();
        out.extend_from_slice(&self.payload);
        out.push(b'\n');
        out
    }
}

/// Parse a status line into `(code, payload length)`.
///
/// Returns `None` unless the line holds exactly two numeric fields, the
/// code has three digits and the length is at most [`MAX_PAYLOAD`].
pub fn parse_status_line(line: &str) -> Option<(u16, usize)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut fields = line.split_whitespace();

    let code = fields.next()?;
    let len = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if len.len() > 8 || !len.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let len: usize = len.parse().ok()?;
    if len > MAX_PAYLOAD {
        return None;
    }

    Some((code.parse().ok()?, len))
}

/// Read one frame from `reader`.
///
/// `addr` only names the peer in the error returned for a truncated or
/// malformed frame.
pub async fn read_frame<R>(reader: &mut R, addr: &str) -> Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let bad_response = || AdminError::BadResponse {
        addr: addr.to_string(),
    };

    let mut line = Vec::with_capacity(16);
    let n = (&mut *reader)
        .take(MAX_STATUS_LINE as u64)
        .read_until(b'\n', &mut line)
        .await?;
    if n == 0 || line.last() != Some(&b'\n') {
        trace!("Status line missing or unterminated");
        return Err(bad_response());
    }

    let line = std::str::from_utf8(&line).map_err(|_| bad_response())?;
    let (code, len) = parse_status_line(line).ok_or_else(|| {
        trace!("Malformed status line: {:?}", line);
        bad_response()
    })?;

    // payload plus the trailing terminator; the buffer grows as bytes arrive
    let frame_len = len.checked_add(1).ok_or_else(bad_response)?;
    let mut payload = Vec::with_capacity(frame_len.min(64 * 1024));
    (&mut *reader)
        .take(frame_len as u64)
        .read_to_end(&mut payload)
        .await?;
    if payload.len() != frame_len {
        trace!("Stream closed before {} payload bytes arrived", len);
        return Err(bad_response());
    }

    if payload.pop() != Some(b'\n') {
        trace!("Frame terminator missing");
        return Err(bad_response());
    }

    trace!("Received frame: code={} len={}", code, len);
    Ok(Frame { code, payload })
}

/// Check that `line` goes out as exactly one command.
///
/// A CR or LF would split it into several commands on the wire, each
/// answered by its own frame.
pub fn check_command_line(line: &str) -> Result<()> {
    if let Some(pos) = line.find(['\r', '\n']) {
        return Err(AdminError::InvalidArgument(format!(
            "line break at byte {} in command {:?}",
            pos, line
        )));
    }
    Ok(())
}

/// Format a command line from a keyword and its arguments.
///
/// The line terminator is added by the transport.
pub fn format_command(keyword: &str, args: &[&str]) -> String {
    let mut cmd = keyword.to_string();
    for arg in args {
        cmd.push(' ');
        cmd.push_str(arg);
    }
    cmd
}
