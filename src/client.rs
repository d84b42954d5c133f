//! Varnish administrative client.
//!
//! This module provides the main client for controlling a cache daemon
//! through its management socket.

use crate::auth::{compute_response, format_auth_command, parse_challenge};
use crate::config::AdminConfig;
use crate::connection::TcpTransport;
use crate::error::{AdminError, Result, StatusCode};
use crate::protocol::{check_command_line, format_command, Frame};
use crate::transport::Transport;
use crate::types::{is_running, ChildState, ProtocolVersion};

use std::time::Duration;
use tracing::{debug, trace, warn};

/// A client for one management socket.
///
/// The connection is opened lazily by the first command, or explicitly with
/// [`connect`](Self::connect). Each connection runs the authentication
/// handshake exactly once before any command is sent on it.
pub struct VarnishAdmin<T: Transport = TcpTransport> {
    config: AdminConfig,
    transport: T,
    authenticated: bool,
}

impl VarnishAdmin<TcpTransport> {
    /// Create a client for `host:port` speaking the given major version.
    ///
    /// `version` is a bare major (`"4"`) or a release string (`"4.0.2"`);
    /// anything outside 3 and 4 fails with
    /// [`AdminError::UnsupportedVersion`].
    pub fn new(host: impl Into<String>, port: u16, version: &str) -> Result<Self> {
        let config = AdminConfig::new()
            .host(host)
            .port(port)
            .version(version.parse()?);
        Ok(Self::from_config(config))
    }

    /// Create a client from a full configuration.
    pub fn from_config(config: AdminConfig) -> Self {
        let transport = TcpTransport::new(config.addr(), config.read_timeout);
        Self::with_transport(config, transport)
    }
}

impl Default for VarnishAdmin<TcpTransport> {
    fn default() -> Self {
        Self::from_config(AdminConfig::default())
    }
}

impl<T: Transport> VarnishAdmin<T> {
    /// Create a client over a caller-supplied transport.
    pub fn with_transport(config: AdminConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            authenticated: false,
        }
    }

    /// The configured host.
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// The configured port.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// The configured protocol version.
    pub fn version(&self) -> ProtocolVersion {
        self.config.version
    }

    /// The shared secret, if one is set.
    pub fn secret(&self) -> Option<&str> {
        self.config.secret.as_deref()
    }

    /// Set the shared secret used by future handshakes.
    ///
    /// An already authenticated connection is left alone.
    pub fn set_secret(&mut self, secret: impl Into<String>) {
        self.config.secret = Some(secret.into());
    }

    /// Whether an authenticated connection is held.
    pub fn is_connected(&self) -> bool {
        self.authenticated && self.transport.is_open()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the connection and authenticate, bounding the connect by
    /// `timeout`. Does nothing if already connected.
    pub async fn connect(&mut self, timeout: Duration) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        self.authenticated = false;
        match self.handshake(timeout).await {
            Ok(()) => {
                self.authenticated = true;
                debug!("Connected to {}", self.transport.addr());
                Ok(())
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Drop the connection. Idempotent.
    pub fn close(&mut self) {
        self.transport.close();
        self.authenticated = false;
    }

    async fn handshake(&mut self, timeout: Duration) -> Result<()> {
        if !self.transport.is_open() {
            self.transport.open(timeout).await?;
        }

        let greeting = self.transport.read_frame().await?;
        match greeting.status_code() {
            StatusCode::Ok => {
                debug!("No authentication required");
                Ok(())
            }
            StatusCode::Auth => self.authenticate(&greeting).await,
            _ => {
                debug!("Unexpected greeting code {}", greeting.code);
                Err(self.bad_response())
            }
        }
    }

    async fn authenticate(&mut self, greeting: &Frame) -> Result<()> {
        let secret = self
            .config
            .secret
            .as_deref()
            .ok_or(AdminError::AuthenticationRequired)?;

        let payload = greeting.text();
        let challenge = parse_challenge(&payload).ok_or_else(|| self.bad_response())?;
        let response = compute_response(challenge, secret);

        debug!("Authenticating with challenge response");
        trace!("Sending command: auth <redacted>");
        self.transport
            .write_line(&format_auth_command(&response))
            .await?;

        let reply = self.transport.read_frame().await?;
        if reply.status_code() != StatusCode::Ok {
            return Err(AdminError::AuthenticationFailed);
        }

        debug!("Authentication successful");
        Ok(())
    }

    fn bad_response(&self) -> AdminError {
        AdminError::BadResponse {
            addr: self.config.addr(),
        }
    }

    /// Validate and write one command line, connecting first if needed.
    async fn send(&mut self, text: &str) -> Result<()> {
        check_command_line(text)?;
        self.connect(self.config.connect_timeout).await?;

        trace!("Sending command: {}", text);
        let result = self.transport.write_line(text).await;
        self.drop_if_fatal(result)
    }

    /// Send one command line and read its response frame. A
    /// connection-fatal failure drops the connection.
    async fn round_trip(&mut self, text: &str) -> Result<Frame> {
        self.send(text).await?;
        let result = self.transport.read_frame().await;
        self.drop_if_fatal(result)
    }

    fn drop_if_fatal<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(ref e) = result {
            if e.is_connection_fatal() {
                debug!("Dropping connection after error: {}", e);
                self.close();
            }
        }
        result
    }

    // ==================== Commands ====================

    /// Send a raw command and return its payload.
    ///
    /// Fails with [`AdminError::InvalidArgument`] without contacting the
    /// daemon if `text` contains a line break, and with
    /// [`AdminError::CommandRejected`] if the response code is not
    /// `expected`.
    pub async fn command(&mut self, text: &str, expected: StatusCode) -> Result<String> {
        let frame = self.round_trip(text).await?;
        if frame.code != expected.as_u16() {
            return Err(AdminError::CommandRejected {
                code: frame.code,
                message: frame.text(),
            });
        }
        Ok(frame.text())
    }

    /// Ban every object matching a raw ban expression.
    pub async fn purge(&mut self, expr: &str) -> Result<()> {
        self.command(&format_command("ban", &[expr]), StatusCode::Ok)
            .await?;
        Ok(())
    }

    /// Ban every object cached under `url`, using the syntax of the
    /// configured protocol version.
    pub async fn purge_url(&mut self, url: &str) -> Result<()> {
        let cmd = self.config.version.purge_url_command(url);
        self.command(&cmd, StatusCode::Ok).await?;
        Ok(())
    }

    /// List the active bans.
    pub async fn ban_list(&mut self) -> Result<String> {
        self.command("ban.list", StatusCode::Ok).await
    }

    /// Check the connection is alive.
    pub async fn ping(&mut self) -> Result<String> {
        self.command("ping", StatusCode::Ok).await
    }

    /// Query the state of the cache child process.
    pub async fn child_state(&mut self) -> Result<ChildState> {
        let payload = self.command("status", StatusCode::Ok).await?;
        Ok(ChildState::from_status(&payload))
    }

    /// Whether the cache child process is running.
    ///
    /// Never fails: an unreachable daemon, a refused secret or a garbled
    /// response are all reported as not running.
    pub async fn status(&mut self) -> bool {
        match self.command("status", StatusCode::Ok).await {
            Ok(payload) => is_running(&payload),
            Err(e) => {
                debug!("Status check failed, reporting not running: {}", e);
                false
            }
        }
    }

    /// Start the cache child process.
    ///
    /// If it is already running nothing is sent and a warning is logged.
    pub async fn start(&mut self) -> Result<()> {
        if self.status().await {
            warn!("Varnish is already running on {}", self.config.addr());
            return Ok(());
        }
        self.command("start", StatusCode::Ok).await?;
        Ok(())
    }

    /// Stop the cache child process.
    ///
    /// If it is already stopped nothing is sent and a warning is logged.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.status().await {
            warn!("Varnish is already stopped on {}", self.config.addr());
            return Ok(());
        }
        self.command("stop", StatusCode::Ok).await?;
        Ok(())
    }

    /// Close the CLI session.
    ///
    /// The connection is closed afterwards whatever the daemon answers; the
    /// daemon normally replies 500 and hangs up.
    ///
    /// Connect and write failures are returned. Once `quit` is written, any
    /// answer counts as success, including none at all.
    pub async fn quit(&mut self) -> Result<()> {
        let sent = self.send("quit").await;
        if sent.is_ok() {
            match self.transport.read_frame().await {
                Ok(frame) => trace!("Quit acknowledged with code {}", frame.code),
                Err(e) => trace!("No answer to quit: {}", e),
            }
        }
        self.close();
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixtures, MockTransport};

    fn admin(transport: MockTransport) -> VarnishAdmin<MockTransport> {
        VarnishAdmin::with_transport(AdminConfig::default(), transport)
    }

    fn ready() -> MockTransport {
        MockTransport::new().respond(fixtures::ready_greeting())
    }

    // ==================== Construction ====================

    #[test]
    fn test_construct_default_values() {
        let admin: VarnishAdmin = VarnishAdmin::default();
        assert_eq!(admin.host(), "127.0.0.1");
        assert_eq!(admin.port(), 6082);
        assert_eq!(admin.version(), ProtocolVersion::V3);
        assert!(admin.secret().is_none());
        assert!(!admin.is_connected());
    }

    #[test]
    fn test_construct_version_4() {
        let admin = VarnishAdmin::new("127.0.0.1", 6082, "4.0.2").unwrap();
        assert_eq!(admin.version(), ProtocolVersion::V4);
        assert_eq!(admin.transport().addr(), "127.0.0.1:6082");
    }

    #[test]
    fn test_construct_unsupported_version() {
        for version in ["5", "2", "1.0", "", "latest"] {
            let result = VarnishAdmin::new("1", 1, version);
            assert!(matches!(result, Err(AdminError::UnsupportedVersion(_))));
        }
    }

    #[test]
    fn test_set_secret() {
        let mut admin = admin(MockTransport::new());
        admin.set_secret("secret");
        assert_eq!(admin.secret(), Some("secret"));
    }

    #[test]
    fn test_close_twice() {
        let mut admin = admin(MockTransport::new());
        admin.close();
        assert!(!admin.transport().is_open());
        admin.close();
        assert!(!admin.transport().is_open());
    }

    // ==================== Handshake ====================

    #[tokio::test]
    async fn test_connect_ok() {
        let mut admin = admin(ready());
        admin.connect(Duration::from_secs(5)).await.unwrap();
        assert!(admin.is_connected());
        assert!(admin.transport().commands().is_empty());

        // a second connect is a no-op
        admin.connect(Duration::from_secs(5)).await.unwrap();
        assert_eq!(admin.transport().open_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_authentication_required_no_secret() {
        let mut admin = admin(MockTransport::new().respond(fixtures::auth_challenge()));
        let err = admin.connect(Duration::from_secs(5)).await.unwrap_err();

        assert!(matches!(err, AdminError::AuthenticationRequired));
        assert_eq!(
            err.to_string(),
            "authentication required; secret must be set before connecting"
        );
        assert!(!admin.transport().is_open());
        assert!(admin.transport().commands().is_empty());
    }

    #[tokio::test]
    async fn test_connect_authenticates_with_secret() {
        let transport = MockTransport::new()
            .respond(fixtures::auth_challenge())
            .respond(fixtures::ready_greeting());
        let mut admin = admin(transport);
        admin.set_secret(fixtures::SAMPLE_SECRET);

        admin.connect(Duration::from_secs(5)).await.unwrap();
        assert!(admin.is_connected());
        assert_eq!(
            admin.transport().commands(),
            [format!("auth {}", fixtures::SAMPLE_RESPONSE)]
        );
    }

    #[tokio::test]
    async fn test_connect_authentication_failed() {
        let transport = MockTransport::new()
            .respond(fixtures::auth_challenge())
            .respond(fixtures::auth_rejected());
        let mut admin = admin(transport);
        admin.set_secret("wrong");

        let err = admin.connect(Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, AdminError::AuthenticationFailed));
        assert_eq!(err.to_string(), "authentication failed");
        assert!(!admin.transport().is_open());
    }

    #[tokio::test]
    async fn test_connect_bad_response() {
        let mut admin = admin(MockTransport::new().respond(Frame::new(503, "nope")));
        admin.set_secret("secret");

        let err = admin.connect(Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.to_string(), "bad response from 127.0.0.1:6082");
        assert!(!admin.is_connected());
        assert!(!admin.transport().is_open());
    }

    #[tokio::test]
    async fn test_connect_bad_response_names_configured_peer() {
        let config = AdminConfig::new().host("cache-01").port(6083);
        let transport = MockTransport::with_addr("cache-01:6083").respond(Frame::new(300, ""));
        let mut admin = VarnishAdmin::with_transport(config, transport);

        let err = admin.connect(Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.to_string(), "bad response from cache-01:6083");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let mut admin = admin(MockTransport::new().refuse_connections());
        let err = admin.connect(Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, AdminError::ConnectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_connect_on_first_command() {
        let mut admin = admin(ready().respond(fixtures::ok()));
        admin.purge("req.url ~ /").await.unwrap();
        assert!(admin.is_connected());
        assert_eq!(admin.transport().open_count(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_after_dropped_connection() {
        let transport = ready()
            .fail(AdminError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionReset,
            )))
            .respond(fixtures::auth_challenge())
            .respond(fixtures::ok())
            .respond(fixtures::ok());
        let mut admin = admin(transport);
        admin.set_secret(fixtures::SAMPLE_SECRET);

        assert!(admin.purge("obj.status == 404").await.is_err());
        assert!(!admin.is_connected());

        admin.purge("obj.status == 404").await.unwrap();
        assert_eq!(admin.transport().open_count(), 2);
        assert_eq!(
            admin.transport().user_commands(),
            ["ban obj.status == 404", "ban obj.status == 404"]
        );
    }

    // ==================== Commands ====================

    #[tokio::test]
    async fn test_purge_command() {
        let mut admin = admin(ready().respond(fixtures::ok()));
        admin.purge("expr").await.unwrap();
        assert_eq!(admin.transport().commands(), ["ban expr"]);
    }

    #[tokio::test]
    async fn test_purge_url_command() {
        let mut admin = admin(ready().respond(fixtures::ok()));
        admin.purge_url("http://example.com").await.unwrap();
        assert_eq!(admin.transport().commands(), ["ban.url http://example.com"]);
    }

    #[tokio::test]
    async fn test_purge_url_version_4_command() {
        let config = AdminConfig::new().version(ProtocolVersion::V4);
        let mut admin = VarnishAdmin::with_transport(config, ready().respond(fixtures::ok()));
        admin.purge_url("http://example.com").await.unwrap();
        assert_eq!(
            admin.transport().commands(),
            ["ban req.url ~ http://example.com"]
        );
    }

    #[tokio::test]
    async fn test_purge_rejects_line_breaks() {
        let mut admin = admin(ready().respond(fixtures::ok()));
        let err = admin.purge("req.url ~ /\nstop").await.unwrap_err();
        assert!(matches!(err, AdminError::InvalidArgument(_)));
        assert!(admin.transport().commands().is_empty());
        assert_eq!(admin.transport().open_count(), 0);
    }

    #[tokio::test]
    async fn test_purge_url_rejects_line_breaks() {
        for version in [ProtocolVersion::V3, ProtocolVersion::V4] {
            for url in ["http://example.com/\nstop", "http://example.com/\r"] {
                let config = AdminConfig::new().version(version);
                let mut admin = VarnishAdmin::with_transport(config, ready());
                let err = admin.purge_url(url).await.unwrap_err();
                assert!(matches!(err, AdminError::InvalidArgument(_)), "{version} {url:?}");
                assert!(admin.transport().commands().is_empty());
                assert_eq!(admin.transport().open_count(), 0);
            }
        }
    }

    #[tokio::test]
    async fn test_command_rejected_carries_payload() {
        let mut admin = admin(ready().respond(fixtures::unknown_request()));
        let err = admin.purge("not an expression").await.unwrap_err();

        match err {
            AdminError::CommandRejected { code, message } => {
                assert_eq!(code, 101);
                assert!(message.starts_with("Unknown request."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // the round trip completed, so the connection survives
        assert!(admin.is_connected());
    }

    #[tokio::test]
    async fn test_command_custom_expected_code() {
        let mut admin = admin(ready().respond(Frame::new(201, "partial")));
        let payload = admin.command("vcl.show boot", StatusCode::Truncated).await.unwrap();
        assert_eq!(payload, "partial");
    }

    #[tokio::test]
    async fn test_ping_and_ban_list() {
        let transport = ready()
            .respond(Frame::new(200, "PONG 1700000000 1.0"))
            .respond(Frame::new(200, "Present bans:\n1700000000.0 0 req.url ~ /"));
        let mut admin = admin(transport);

        assert!(admin.ping().await.unwrap().starts_with("PONG"));
        assert!(admin.ban_list().await.unwrap().contains("req.url ~ /"));
        assert_eq!(admin.transport().commands(), ["ping", "ban.list"]);
    }

    #[tokio::test]
    async fn test_child_state() {
        let mut admin = admin(ready().respond(fixtures::status_stopped()));
        assert_eq!(admin.child_state().await.unwrap(), ChildState::Stopped);
    }

    #[tokio::test]
    async fn test_status_running() {
        let mut admin = admin(ready().respond(fixtures::status_running()));
        assert!(admin.status().await);
    }

    #[tokio::test]
    async fn test_status_not_running() {
        let mut admin = admin(ready().respond(fixtures::status_stopped()));
        assert!(!admin.status().await);
    }

    #[tokio::test]
    async fn test_status_swallows_errors() {
        let mut unreachable = admin(MockTransport::new().refuse_connections());
        assert!(!unreachable.status().await);

        let mut needs_secret = admin(MockTransport::new().respond(fixtures::auth_challenge()));
        assert!(!needs_secret.status().await);

        let mut rejected = admin(ready().respond(Frame::new(300, "Cannot")));
        assert!(!rejected.status().await);

        let mut timed_out = admin(ready().fail(AdminError::Timeout));
        assert!(!timed_out.status().await);
    }

    #[tokio::test]
    async fn test_start() {
        let transport = ready()
            .respond(fixtures::status_stopped())
            .respond(fixtures::ok());
        let mut admin = admin(transport);

        admin.start().await.unwrap();
        assert_eq!(admin.transport().commands(), ["status", "start"]);
    }

    #[tokio::test]
    async fn test_start_when_running() {
        let mut admin = admin(ready().respond(fixtures::status_running()));
        admin.start().await.unwrap();
        assert_eq!(admin.transport().commands(), ["status"]);
    }

    #[tokio::test]
    async fn test_start_rejected() {
        let transport = ready()
            .respond(fixtures::status_stopped())
            .respond(Frame::new(300, "Child start failed"));
        let mut admin = admin(transport);

        let err = admin.start().await.unwrap_err();
        assert_eq!(err.to_string(), "Child start failed");
    }

    #[tokio::test]
    async fn test_stop() {
        let transport = ready()
            .respond(fixtures::status_running())
            .respond(fixtures::ok());
        let mut admin = admin(transport);

        admin.stop().await.unwrap();
        assert_eq!(admin.transport().commands(), ["status", "stop"]);
    }

    #[tokio::test]
    async fn test_stop_when_not_running() {
        let mut admin = admin(ready().respond(fixtures::status_stopped()));
        admin.stop().await.unwrap();
        assert_eq!(admin.transport().commands(), ["status"]);
    }

    #[tokio::test]
    async fn test_quit() {
        let mut admin = admin(ready().respond(fixtures::closing()));
        admin.quit().await.unwrap();
        assert!(!admin.transport().is_open());
        assert!(!admin.is_connected());
        assert_eq!(admin.transport().commands(), ["quit"]);
    }

    #[tokio::test]
    async fn test_quit_when_server_hangs_up() {
        // no scripted answer: the peer closes instead of replying
        let mut admin = admin(ready());
        admin.quit().await.unwrap();
        assert!(!admin.transport().is_open());
        assert_eq!(admin.transport().commands(), ["quit"]);
    }

    #[tokio::test]
    async fn test_quit_read_errors_count_as_success() {
        let errors = [
            AdminError::Timeout,
            AdminError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
        ];
        for error in errors {
            let mut admin = admin(ready().fail(error));
            admin.quit().await.unwrap();
            assert!(!admin.transport().is_open());
            assert_eq!(admin.transport().commands(), ["quit"]);
        }
    }

    #[tokio::test]
    async fn test_quit_connect_failure_is_returned() {
        let mut admin = admin(MockTransport::new().refuse_connections());
        let err = admin.quit().await.unwrap_err();
        assert!(matches!(err, AdminError::ConnectionFailed { .. }));
        assert!(admin.transport().commands().is_empty());
    }

    #[tokio::test]
    async fn test_quit_any_status_closes() {
        let mut admin = admin(ready().respond(fixtures::ok()));
        admin.quit().await.unwrap();
        assert!(!admin.transport().is_open());
        assert!(admin.transport().commands().contains(&"quit".to_string()));
    }
}
