//! postroom: a minimal SMTP receive server
//!
//! Accepts TCP connections and speaks a reduced SMTP command set:
//! HELO, MAIL FROM, RCPT TO, DATA, HELP, QUIT.
//!
//! Features:
//! - Single-threaded, non-blocking event loop (epoll/kqueue via mio)
//! - Per-connection input framing and reply queueing
//! - Accepted messages written to a per-recipient directory tree
//! - Configuration via CLI arguments or TOML file

mod config;
mod protocol;
mod reactor;
mod session;
mod storage;

use config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        mail_dir = %config.mail_dir.display(),
        max_connections = config.max_connections,
        "Starting postroom server"
    );

    reactor::run(config)?;
    Ok(())
}
