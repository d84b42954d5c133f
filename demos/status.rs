//! Example: Connect, report status, and start the child if it is stopped
//!
//! Run with: cargo run --example status -- [host] [port] [version]
//!
//! Set `VARNISH_SECRET_FILE` when the daemon was started with `-S`.

use std::time::Duration;
use varnish_admin::{AdminConfig, Result, VarnishAdmin};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (optional)
    tracing_subscriber::fmt()
        .with_env_filter("varnish_admin=debug")
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.next().and_then(|p| p.parse().ok()).unwrap_or(6082);
    let version = args.next().unwrap_or_else(|| "4".to_string());

    let mut config = AdminConfig::new()
        .host(host)
        .port(port)
        .version(version.parse()?);
    if let Ok(path) = std::env::var("VARNISH_SECRET_FILE") {
        config = config.secret_file(path)?;
    }

    let mut admin = VarnishAdmin::from_config(config);

    println!("Connecting to {}:{}...", admin.host(), admin.port());
    admin.connect(Duration::from_secs(5)).await?;
    println!("Connected!");

    let pong = admin.ping().await?;
    println!("Ping: {}", pong.trim());

    let state = admin.child_state().await?;
    println!("Child state: {}", state);

    if !state.is_running() {
        println!("\nStarting child...");
        admin.start().await?;
        println!("Running: {}", admin.status().await);
    }

    // Close the connection gracefully
    admin.quit().await?;
    println!("\nDisconnected.");

    Ok(())
}
