//! # varnish-admin
//!
//! An async client for the Varnish administrative CLI, the line-oriented
//! control protocol `varnishd` exposes on its management socket (`-T`).
//!
//! This crate lets you, without shelling out to `varnishadm`:
//!
//! - Authenticate with the shared secret (`-S`) challenge-response handshake
//! - Start and stop the cache child process and query its status
//! - Invalidate cached content by ban expression or by URL
//! - Send arbitrary CLI commands and read their framed responses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use varnish_admin::{Result, VarnishAdmin};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // 127.0.0.1:6082, Varnish 4 command set
//!     let mut admin = VarnishAdmin::new("127.0.0.1", 6082, "4")?;
//!     admin.set_secret("my-shared-secret");
//!
//!     if admin.status().await {
//!         admin.purge_url("^/articles/").await?;
//!     }
//!
//!     admin.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use varnish_admin::{AdminConfig, ProtocolVersion, VarnishAdmin};
//!
//! # async fn example() -> varnish_admin::Result<()> {
//! let config = AdminConfig::new()
//!     .host("cache-01.internal")
//!     .port(6082)
//!     .version(ProtocolVersion::V4)
//!     .secret_file("/etc/varnish/secret")?
//!     .connect_timeout(Duration::from_secs(2));
//!
//! let mut admin = VarnishAdmin::from_config(config);
//! admin.connect(Duration::from_secs(2)).await?;
//! admin.purge("obj.http.x-tag ~ product-42").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! The client talks to the socket only through the [`Transport`] trait. With
//! the `test-utils` feature, [`test_utils::MockTransport`] replays scripted
//! frames and records every command line written.
//!
//! ## Protocol Compatibility
//!
//! Major CLI versions 3 and 4 are supported. They differ in how a URL ban
//! is spelled: `ban.url <url>` versus `ban req.url ~ <url>`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all)]

pub mod auth;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main types for convenience
pub use error::{AdminError, Result, StatusCode};

pub use client::VarnishAdmin;
pub use config::{read_secret_file, AdminConfig};
pub use connection::TcpTransport;
pub use protocol::Frame;
pub use transport::Transport;
pub use types::{is_running, ChildState, ProtocolVersion};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
