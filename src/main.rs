//! Tunnel proxy
//!
//! Forwards every request to one backend whose address is replaced at
//! runtime via `POST /update_tunnel`.
//!
//! ```text
//!     Client ──▶ http server ──▶ register snapshot ──▶ request translator
//!                                                          │
//!                                                          ▼
//!     Client ◀── response translator ◀── forwarder (timeout + retry) ◀──▶ Backend
//!
//!     Operator ──▶ /update_tunnel, /status ──▶ backend register ◀── state file watcher
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use tokio::net::TcpListener;

use tunnel_proxy::config::{resolve_config, ConfigOverrides};
use tunnel_proxy::lifecycle::{signals::spawn_signal_listener, Shutdown};
use tunnel_proxy::observability::{logging::init_logging, metrics::init_metrics};
use tunnel_proxy::register::{BackendRegister, StateFileWatcher};
use tunnel_proxy::transform::StreamMode;
use tunnel_proxy::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "tunnel-proxy", version, about = "Dynamically retargetable HTTP reverse proxy")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, env = "TUNNEL_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:5000.
    #[arg(long, env = "TUNNEL_PROXY_BIND")]
    bind: Option<String>,

    /// File holding the backend address across restarts.
    #[arg(long, env = "TUNNEL_PROXY_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Response body mode: raw, lines, words or json.
    #[arg(long, env = "TUNNEL_PROXY_STREAM_MODE")]
    stream_mode: Option<StreamMode>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TUNNEL_PROXY_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let overrides = ConfigOverrides {
        bind_address: args.bind,
        state_file: args.state_file,
        stream_mode: args.stream_mode,
        log_level: args.log_level,
    };
    let config = resolve_config(args.config.as_deref(), overrides)?;

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tunnel-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        stream_mode = %config.streaming.mode,
        retries_enabled = config.retries.enabled,
        max_attempts = config.retries.max_attempts,
        response_timeout_ms = config.timeouts.response_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let register = Arc::new(BackendRegister::from_config(&config.register));
    match register.get() {
        Some(backend) => tracing::info!(backend = %backend, "Backend restored"),
        None => tracing::info!("No backend set; proxy answers 503 until /update_tunnel is called"),
    }

    // Held for the lifetime of the process; dropping it stops the watch.
    let _watcher = match (&config.register.state_file, config.register.watch) {
        (Some(path), true) => Some(StateFileWatcher::new(path, register.clone()).run()?),
        _ => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config, register)?;
    server.run(listener, shutdown.signalled()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
