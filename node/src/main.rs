// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # EMBER Vault Node
//!
//! Entry point for the `ember-node` binary. Parses CLI arguments,
//! initializes logging and metrics, wires the vault engine, produces the
//! logical block clock, and serves the HTTP/WS API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the vault node
//! - `status`  — query a running node's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, RwLock};

use ember_ledger::adapter::{FixedApy, Strategy, YieldAdapter};
use ember_ledger::config::{DEFAULT_APY_BPS, DEPLOYER_PRINCIPAL};
use ember_ledger::{VaultConfig, VaultFactory};

use cli::{Commands, EmberNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

/// Broadcast channel capacity for live event streaming.
/// 256 is large enough to absorb short bursts without dropping events
/// for connected WebSocket clients.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Adapter id of the built-in fixed-APY strategy registered at startup.
const DEFAULT_ADAPTER_ID: &str = "ember.fixed-yield-adapter";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = EmberNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full vault node: API server, metrics endpoint, and the
/// block-clock producer.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "ember_node=info,ember_ledger=info,tower_http=debug",
        LogFormat::from_env(),
    );

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        block_time_ms = args.block_time_ms,
        network = %args.network,
        "starting ember-node"
    );

    // --- Vault engine ---
    let mut factory = VaultFactory::new(VaultConfig::default());
    let default_adapter = YieldAdapter::new(
        DEFAULT_ADAPTER_ID,
        DEPLOYER_PRINCIPAL,
        Strategy::FixedApy(FixedApy {
            apy_bps: DEFAULT_APY_BPS,
        }),
    );
    factory
        .register_adapter(DEPLOYER_PRINCIPAL, default_adapter)
        .context("failed to register the default yield adapter")?;
    factory
        .add_approved_adapter(DEPLOYER_PRINCIPAL, DEFAULT_ADAPTER_ID)
        .context("failed to approve the default yield adapter")?;
    let factory = Arc::new(RwLock::new(factory));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Block height ---
    let block_height = Arc::new(AtomicU64::new(1));
    node_metrics.block_height.set(1);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            ember_ledger::config::PROTOCOL_VERSION,
        ),
        network: args.network.clone(),
        block_height: Arc::clone(&block_height),
        factory,
        event_tx: event_tx.clone(),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state.clone());
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Block clock producer ---
    // The host chain supplies the logical clock in production; here a
    // simple interval loop advances the height so locks expire and yield
    // accrues in real time.
    let height_ref = Arc::clone(&block_height);
    let metrics_ref = Arc::clone(&node_metrics);
    let event_tx_ref = event_tx.clone();
    let block_time_ms = args.block_time_ms;
    let block_loop = tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(block_time_ms));
        // The first tick fires immediately; skip it so height 1 lasts a
        // full block time.
        interval.tick().await;
        loop {
            interval.tick().await;
            let h = height_ref.fetch_add(1, Ordering::Relaxed) + 1;
            metrics_ref.block_height.set(h as i64);

            let _ = event_tx_ref.send(api::NodeEvent::NewBlock {
                height: h,
                timestamp: chrono::Utc::now().timestamp_millis() as u64,
            });

            tracing::debug!(height = h, "block produced");
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    block_loop.abort();
    tracing::info!("ember-node stopped");
    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.rpc_url.trim_end_matches('/'));
    let body: String = http_get(&url).await?;
    println!("{}", body);
    Ok(())
}

/// Minimal HTTP GET without pulling in an HTTP client dependency.
/// Good enough for a localhost status probe.
async fn http_get(url: &str) -> Result<String> {
    let (host, port, path) = split_url(url)?;

    let addr = format!("{}:{}", host, port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Strip HTTP headers — everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("ember-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", ember_ledger::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Splits an `http://host[:port]/path` URL into its parts.
/// Just enough parsing for the status probe; no `url` crate needed.
fn split_url(url: &str) -> Result<(String, u16, String)> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| anyhow::anyhow!("only http:// URLs are supported: {}", url))?;

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .with_context(|| format!("bad port in URL: {}", url))?;
            (host, port)
        }
        None => (authority, 80),
    };
    if host.is_empty() {
        anyhow::bail!("missing host in URL: {}", url);
    }

    Ok((host.to_string(), port, path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_url_handles_port_and_path() {
        let (host, port, path) = split_url("http://127.0.0.1:8620/status").unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 8620);
        assert_eq!(path, "/status");
    }

    #[test]
    fn split_url_defaults_port_and_path() {
        let (host, port, path) = split_url("http://localhost").unwrap();
        assert_eq!(host, "localhost");
        assert_eq!(port, 80);
        assert_eq!(path, "/");
    }

    #[test]
    fn split_url_rejects_non_http_schemes() {
        assert!(split_url("https://example.com/status").is_err());
        assert!(split_url("ftp://example.com").is_err());
    }
}
