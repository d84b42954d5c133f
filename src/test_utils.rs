//! # Test Utilities
//!
//! A scripted [`Transport`] and fixtures for testing code that drives
//! [`VarnishAdmin`](crate::VarnishAdmin) without a running daemon.
//!
//! Enable this module outside the crate with the `test-utils` feature:
//!
//! ```toml
//! [dev-dependencies]
//! varnish-admin = { version = "0.1", features = ["test-utils"] }
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use varnish_admin::test_utils::{fixtures, MockTransport};
//! use varnish_admin::{AdminConfig, VarnishAdmin};
//!
//! let transport = MockTransport::new()
//!     .respond(fixtures::ready_greeting())
//!     .respond(fixtures::ok());
//! let mut admin = VarnishAdmin::with_transport(AdminConfig::default(), transport);
//! admin.purge("req.url ~ /").await?;
//! assert_eq!(admin.transport().commands(), ["ban req.url ~ /"]);
//! ```

use crate::error::{AdminError, Result};
use crate::protocol::Frame;
use crate::transport::Transport;
use std::collections::VecDeque;
use std::time::Duration;

/// One scripted reaction to a `read_frame` call.
#[derive(Debug)]
enum Scripted {
    Frame(Frame),
    Error(AdminError),
}

/// An in-memory [`Transport`] that replays scripted frames.
///
/// Every written line is recorded. Reads past the end of the script fail
/// with [`AdminError::BadResponse`], the same as a peer closing mid-frame.
#[derive(Debug)]
pub struct MockTransport {
    addr: String,
    script: VecDeque<Scripted>,
    written: Vec<String>,
    open: bool,
    open_count: usize,
    refuse_open: bool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a transport with an empty script, addressed as the default
    /// management socket.
    pub fn new() -> Self {
        Self::with_addr("127.0.0.1:6082")
    }

    /// Create a transport that reports `addr` as its peer.
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            script: VecDeque::new(),
            written: Vec::new(),
            open: false,
            open_count: 0,
            refuse_open: false,
        }
    }

    /// Queue a frame for the next read.
    pub fn respond(mut self, frame: Frame) -> Self {
        self.script.push_back(Scripted::Frame(frame));
        self
    }

    /// Queue an error for the next read.
    pub fn fail(mut self, error: AdminError) -> Self {
        self.script.push_back(Scripted::Error(error));
        self
    }

    /// Make every `open` fail as if the port were closed.
    pub fn refuse_connections(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    /// Every line written so far, in order, without terminators.
    pub fn commands(&self) -> &[String] {
        &self.written
    }

    /// Lines written so far, excluding `auth` handshake lines.
    pub fn user_commands(&self) -> Vec<&str> {
        self.written
            .iter()
            .map(String::as_str)
            .filter(|line| !line.starts_with("auth "))
            .collect()
    }

    /// How many times the connection was opened.
    pub fn open_count(&self) -> usize {
        self.open_count
    }

    /// Scripted reads not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Transport for MockTransport {
    async fn open(&mut self, _timeout: Duration) -> Result<()> {
        if self.refuse_open {
            return Err(AdminError::ConnectionFailed {
                addr: self.addr.clone(),
                reason: "connection refused".to_string(),
            });
        }
        self.open = true;
        self.open_count += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        if !self.open {
            return Err(AdminError::NotConnected);
        }
        self.written.push(line.to_string());
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(AdminError::NotConnected);
        }
        match self.script.pop_front() {
            Some(Scripted::Frame(frame)) => Ok(frame),
            Some(Scripted::Error(error)) => Err(error),
            None => Err(AdminError::BadResponse {
                addr: self.addr.clone(),
            }),
        }
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

/// Pre-built frames and payloads.
pub mod fixtures {
    use crate::protocol::Frame;

    /// Sample 32-byte challenge.
    pub const SAMPLE_CHALLENGE: &str = "abcdefghijklmnopqrstuvwxyz012345";

    /// Secret matching [`SAMPLE_RESPONSE`].
    pub const SAMPLE_SECRET: &str = "S3cr3t";

    /// `compute_response(SAMPLE_CHALLENGE, SAMPLE_SECRET)`.
    pub const SAMPLE_RESPONSE: &str =
        "af7fdd48701dfcda228bc334d6facc67f37769359bd9d1b992e69352da4ba1fb";

    /// Greeting from a daemon started without `-S`.
    pub fn ready_greeting() -> Frame {
        Frame::new(
            200,
            "-----------------------------\n\
             Varnish Cache CLI 1.0\n\
             -----------------------------\n\
             \n\
             Type 'help' for command list.\n\
             Type 'quit' to close CLI session.\n",
        )
    }

    /// Greeting from a daemon that demands authentication.
    pub fn auth_challenge() -> Frame {
        Frame::new(
            107,
            format!("{}\n\nAuthentication required.\n", SAMPLE_CHALLENGE),
        )
    }

    /// A bare success frame.
    pub fn ok() -> Frame {
        Frame::new(200, "")
    }

    /// Response to `status` from a running child.
    pub fn status_running() -> Frame {
        Frame::new(200, "Child in state running")
    }

    /// Response to `status` from a stopped child.
    pub fn status_stopped() -> Frame {
        Frame::new(200, "Child in state stopped")
    }

    /// Response to a rejected `auth` line.
    pub fn auth_rejected() -> Frame {
        Frame::new(
            107,
            format!("{}\n\nAuthentication required.\n", SAMPLE_CHALLENGE),
        )
    }

    /// Response to `quit`.
    pub fn closing() -> Frame {
        Frame::new(500, "Closing CLI connection")
    }

    /// Response to an unknown command.
    pub fn unknown_request() -> Frame {
        Frame::new(101, "Unknown request.\nType 'help' for more info.")
    }
}
