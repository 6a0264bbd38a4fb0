//! # CLI Interface
//!
//! Defines the command-line argument structure for `ember-node` using
//! `clap` derive. Supports three subcommands: `run`, `status`, and
//! `version`.

use clap::{Parser, Subcommand};

/// EMBER savings-vault node.
///
/// Runs the vault engine behind a REST/WebSocket API, produces the
/// logical block clock, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "ember-node",
    about = "EMBER savings-vault node",
    version,
    propagate_version = true
)]
pub struct EmberNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the EMBER node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the vault node.
    Run(RunArgs),
    /// Query the status of a running node via its RPC endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the REST/WebSocket API.
    #[arg(long, env = "EMBER_RPC_PORT", default_value_t = ember_ledger::config::DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "EMBER_METRICS_PORT", default_value_t = ember_ledger::config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Block time in milliseconds for the local clock producer.
    ///
    /// The default matches the settlement layer's ten-minute cadence;
    /// devnets shrink it to make lock expiry observable in minutes.
    #[arg(long, env = "EMBER_BLOCK_TIME_MS", default_value_t = ember_ledger::config::BLOCK_TIME_MS)]
    pub block_time_ms: u64,

    /// Network label reported by the status endpoint.
    #[arg(long, env = "EMBER_NETWORK", default_value = "devnet")]
    pub network: String,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// RPC endpoint of the running node.
    #[arg(long, default_value = "http://127.0.0.1:8620")]
    pub rpc_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        EmberNodeCli::command().debug_assert();
    }
}
