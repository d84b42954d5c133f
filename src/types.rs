//! Core types shared by the configuration, protocol and client layers.

use crate::error::AdminError;
use std::fmt;
use std::str::FromStr;

/// Major revision of the CLI command set spoken by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    /// Varnish 3.x.
    #[default]
    V3,
    /// Varnish 4.x.
    V4,
}

impl ProtocolVersion {
    /// The numeric major version.
    pub fn major(&self) -> u32 {
        match self {
            ProtocolVersion::V3 => 3,
            ProtocolVersion::V4 => 4,
        }
    }

    /// Build the command line that bans every object cached under `url`.
    ///
    /// Varnish 3 has a dedicated literal-match command; Varnish 4 dropped it
    /// in favour of a regular ban expression on `req.url`.
    pub fn purge_url_command(&self, url: &str) -> String {
        match self {
            ProtocolVersion::V3 => format!("ban.url {}", url),
            ProtocolVersion::V4 => format!("ban req.url ~ {}", url),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major())
    }
}

impl TryFrom<u32> for ProtocolVersion {
    type Error = AdminError;

    fn try_from(major: u32) -> Result<Self, Self::Error> {
        match major {
            3 => Ok(ProtocolVersion::V3),
            4 => Ok(ProtocolVersion::V4),
            other => Err(AdminError::UnsupportedVersion(other.to_string())),
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = AdminError;

    /// Accepts a bare major (`"4"`) or a full release string (`"4.0.2"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || AdminError::UnsupportedVersion(s.to_string());
        let major = s
            .trim()
            .split('.')
            .next()
            .filter(|m| !m.is_empty() && m.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(unsupported)?;
        let major: u32 = major.parse().map_err(|_| unsupported())?;
        ProtocolVersion::try_from(major).map_err(|_| unsupported())
    }
}

/// State of the cache worker process as reported by `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildState {
    /// Serving requests.
    Running,
    /// Not started, or stopped.
    Stopped,
    /// Being started.
    Starting,
    /// Being stopped.
    Stopping,
    /// A state word this client does not know, or no state at all.
    Unknown(String),
}

impl ChildState {
    /// Extract the state from a `status` payload such as
    /// `"Child in state running"`.
    pub fn from_status(payload: &str) -> Self {
        let word = payload
            .split("Child in state ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or("");

        match word {
            "running" => ChildState::Running,
            "stopped" => ChildState::Stopped,
            "starting" => ChildState::Starting,
            "stopping" => ChildState::Stopping,
            other => ChildState::Unknown(other.to_string()),
        }
    }

    /// Whether the child is serving requests.
    pub fn is_running(&self) -> bool {
        *self == ChildState::Running
    }
}

impl fmt::Display for ChildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildState::Running => write!(f, "running"),
            ChildState::Stopped => write!(f, "stopped"),
            ChildState::Starting => write!(f, "starting"),
            ChildState::Stopping => write!(f, "stopping"),
            ChildState::Unknown(s) => write!(f, "unknown({})", s),
        }
    }
}

/// Whether a `status` payload reports a running child. Never fails.
pub fn is_running(payload: &str) -> bool {
    ChildState::from_status(payload).is_running()
}
