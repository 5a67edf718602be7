//! drift-serve: TCP sync server for a drift repository.
//!
//! Binds a listener and serves protocol sessions one client at a time:
//! the next connection is accepted only after the current session ends.
//! Per-session failures are logged and do not stop the server.

use std::net::TcpListener;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use drift_core::{protocol, Repository};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "drift-serve")]
#[command(version = "0.1.0")]
#[command(about = "Serve a drift repository over TCP", long_about = None)]
struct Cli {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0")]
    addr: String,

    /// Listen port
    #[arg(short, long, default_value_t = protocol::DEFAULT_PORT)]
    port: u16,

    /// Repository root to serve
    #[arg(short, long, default_value = ".")]
    repo_root: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into())
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let repo = Repository::open(&cli.repo_root);
    if !repo.is_initialized() {
        return Err(anyhow!(
            "not a drift repository: {}",
            cli.repo_root.display()
        ));
    }
    let control_dir = repo.control_dir();

    let listener = TcpListener::bind((cli.addr.as_str(), cli.port))
        .with_context(|| format!("failed to bind {}:{}", cli.addr, cli.port))?;
    info!(addr = %cli.addr, port = cli.port, root = %cli.repo_root.display(), "listening");

    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(e) => {
                error!("accept failed: {e}");
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());
        match protocol::serve_session(&mut stream, &control_dir) {
            Ok(()) => info!(%peer, "session complete"),
            Err(e) => error!(%peer, "session failed: {e}"),
        }
    }
    Ok(())
}
