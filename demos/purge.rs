//! Example: Invalidate cached content
//!
//! Bans every URL given on the command line, then lists the active bans.
//!
//! Run with: cargo run --example purge -- /articles/42 '^/static/'
//!
//! Requires a running varnishd with its management socket on 127.0.0.1:6082.
//! Set `VARNISH_SECRET` when the daemon was started with `-S`.

use varnish_admin::{AdminConfig, ProtocolVersion, Result, VarnishAdmin};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut config = AdminConfig::new().version(ProtocolVersion::V4);
    if let Ok(secret) = std::env::var("VARNISH_SECRET") {
        config = config.secret(secret);
    }
    let mut admin = VarnishAdmin::from_config(config);

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        eprintln!("usage: purge <url-regex>...");
        return Ok(());
    }

    for url in &urls {
        admin.purge_url(url).await?;
        println!("Banned {}", url);
    }

    // Raw ban expressions work too
    admin.purge("obj.http.x-purge-all == yes").await?;

    println!("\n{}", admin.ban_list().await?);

    admin.quit().await?;
    Ok(())
}
