//! Error types for the Varnish administrative CLI client.
//!
//! Every fallible operation in this crate returns [`AdminError`]. The
//! variants map one-to-one onto the failure classes an operator cares about:
//! bad configuration, an unreachable socket, a garbled frame, a rejected
//! secret, or a command the daemon refused.

use std::io;
use thiserror::Error;

/// The main error type for all administrative socket operations.
#[derive(Error, Debug)]
pub enum AdminError {
    /// I/O error occurred during communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested protocol version is not one of the supported major lines.
    #[error("no supported version: {0}")]
    UnsupportedVersion(String),

    /// The management socket could not be reached.
    #[error("could not connect to varnish at {addr}: {reason}")]
    ConnectionFailed {
        /// The `host:port` that was dialed.
        addr: String,
        /// Why the connection attempt failed.
        reason: String,
    },

    /// The daemon sent a greeting or frame this client cannot interpret.
    #[error("bad response from {addr}")]
    BadResponse {
        /// The `host:port` of the misbehaving peer.
        addr: String,
    },

    /// The daemon demands authentication but no secret was configured.
    #[error("authentication required; secret must be set before connecting")]
    AuthenticationRequired,

    /// The daemon rejected the challenge response.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A command completed its round trip but the daemon refused it.
    #[error("{message}")]
    CommandRejected {
        /// The status code returned by the daemon.
        code: u16,
        /// The response payload.
        message: String,
    },

    /// An argument would break the one-line-per-command framing.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Timeout waiting for a response frame.
    #[error("operation timed out")]
    Timeout,

    /// A read or write was attempted without an open connection.
    #[error("not connected")]
    NotConnected,

    /// The secret file could not be used.
    #[error("unusable secret file '{path}': {reason}")]
    SecretFile {
        /// Path of the secret file.
        path: String,
        /// What went wrong.
        reason: String,
    },
}

impl AdminError {
    /// Whether the connection this error occurred on must be discarded.
    ///
    /// Framing is lost after any of these, so the next command has to
    /// reconnect and re-run the handshake.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            AdminError::Io(_)
                | AdminError::BadResponse { .. }
                | AdminError::Timeout
                | AdminError::NotConnected
        )
    }
}

/// Result type alias for administrative socket operations.
pub type Result<T> = std::result::Result<T, AdminError>;

/// CLI status codes as sent in the first field of every response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 100 - Syntax error
    Syntax = 100,
    /// 101 - Unknown command
    Unknown = 101,
    /// 102 - Unimplemented command
    Unimplemented = 102,
    /// 104 - Too few parameters
    TooFew = 104,
    /// 105 - Too many parameters
    TooMany = 105,
    /// 106 - Invalid parameter value
    Param = 106,
    /// 107 - Authentication required
    Auth = 107,
    /// 200 - OK
    Ok = 200,
    /// 201 - OK, but the payload was truncated
    Truncated = 201,
    /// 300 - Command could not be carried out
    Cant = 300,
    /// 400 - Communication error
    Comms = 400,
    /// 500 - Connection is being closed
    Close = 500,
    /// Any code not listed above
    Other = 0,
}

impl StatusCode {
    /// Parse a status code from a u16 value.
    pub fn from_u16(code: u16) -> Self {
        match code {
            100 => StatusCode::Syntax,
            101 => StatusCode::Unknown,
            102 => StatusCode::Unimplemented,
            104 => StatusCode::TooFew,
            105 => StatusCode::TooMany,
            106 => StatusCode::Param,
            107 => StatusCode::Auth,
            200 => StatusCode::Ok,
            201 => StatusCode::Truncated,
            300 => StatusCode::Cant,
            400 => StatusCode::Comms,
            500 => StatusCode::Close,
            _ => StatusCode::Other,
        }
    }

    /// Get the numeric value of this status code.
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode::from_u16(code)
    }
}
