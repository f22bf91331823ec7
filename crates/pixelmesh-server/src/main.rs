//! PixelMesh server: entry point.
//!
//! Waits for the root node of an LED mesh to connect over TCP, commissions
//! the mesh (discovery, then calibration against the physical grid) and
//! streams color frames to it.  A reconnecting root node replaces the
//! previous session; commissioning only happens once per process run.
//!
//! # Usage
//!
//! ```text
//! pixelmesh-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>          TOML config file [default: platform config dir]
//!   --bind <IP>              Listen address
//!   --port <PORT>            Listen port
//!   --rows <N> --cols <N>    Grid size
//!   --operator <MODE>        console | auto [default: console]
//!   --expect-devices <N>     Node count for `--operator auto`
//!   --write-config           Write the effective config and exit
//! ```
//!
//! Command-line values (or their `PIXELMESH_*` environment variables) take
//! precedence over the config file.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pixelmesh_server::application::{DemoPattern, MeshState, Operator, SessionContext};
use pixelmesh_server::infrastructure::network::ConnectionListener;
use pixelmesh_server::infrastructure::operator::{AutoOperator, ConsoleOperator};
use pixelmesh_server::infrastructure::storage::config::{
    config_file_path, load_config, save_config, AppConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Who answers the commissioning questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OperatorMode {
    /// Prompt on the terminal.
    Console,
    /// Place nodes in row-major order without asking.
    Auto,
}

/// PixelMesh commissioning and color streaming server.
#[derive(Debug, Parser)]
#[command(name = "pixelmesh-server", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "PIXELMESH_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.
    #[arg(long, env = "PIXELMESH_BIND")]
    bind: Option<String>,

    /// TCP port the root node connects to.
    #[arg(long, env = "PIXELMESH_PORT")]
    port: Option<u16>,

    #[arg(long, env = "PIXELMESH_ROWS")]
    rows: Option<usize>,

    #[arg(long, env = "PIXELMESH_COLS")]
    cols: Option<usize>,

    #[arg(long, value_enum, default_value_t = OperatorMode::Console, env = "PIXELMESH_OPERATOR")]
    operator: OperatorMode,

    /// Number of nodes to wait for with `--operator auto`.
    /// Defaults to one per grid cell.
    #[arg(long, env = "PIXELMESH_EXPECT_DEVICES")]
    expect_devices: Option<usize>,

    /// Write the effective configuration to the config file and exit.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Layers command-line overrides on top of the file configuration.
    fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(bind) = &self.bind {
            config.network.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(rows) = self.rows {
            config.grid.rows = rows;
        }
        if let Some(cols) = self.cols {
            config.grid.cols = cols;
        }
        config
    }

    fn build_operator(&self, config: &AppConfig) -> Arc<dyn Operator> {
        let (rows, cols) = (config.grid.rows, config.grid.cols);
        match self.operator {
            OperatorMode::Console => Arc::new(ConsoleOperator::stdin()),
            OperatorMode::Auto => {
                let expected = self.expect_devices.unwrap_or(rows * cols);
                Arc::new(AutoOperator::new(expected, rows, cols))
            }
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    let config = cli.apply(file_config);

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    if cli.write_config {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => config_file_path()?,
        };
        save_config(&config, &path)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        info!("wrote configuration to {}", path.display());
        return Ok(());
    }

    let bind_addr = config.bind_addr()?;
    let (rows, cols) = (config.grid.rows, config.grid.cols);
    info!("PixelMesh server starting: grid {rows}x{cols}, operator {:?}", cli.operator);

    let context = SessionContext {
        state: Arc::new(MeshState::new(rows, cols)),
        operator: cli.build_operator(&config),
        source: Arc::new(DemoPattern::new(rows, cols)),
        timing: config.session_timing(),
    };

    let listener = ConnectionListener::bind(bind_addr, context, config.read_timeout())
        .await
        .context("failed to start listener")?;

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    listener.run(running).await;

    info!("PixelMesh server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        // Arrange
        let cli = Cli::parse_from(["pixelmesh-server"]);

        // Act
        let config = cli.apply(AppConfig::default());

        // Assert
        assert_eq!(config, AppConfig::default());
        assert_eq!(cli.operator, OperatorMode::Console);
    }

    #[test]
    fn test_cli_overrides_network_and_grid() {
        let cli = Cli::parse_from([
            "pixelmesh-server",
            "--bind",
            "127.0.0.1",
            "--port",
            "9000",
            "--rows",
            "2",
            "--cols",
            "8",
        ]);

        let config = cli.apply(AppConfig::default());

        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!((config.grid.rows, config.grid.cols), (2, 8));
    }

    #[test]
    fn test_cli_parses_auto_operator() {
        let cli = Cli::parse_from([
            "pixelmesh-server",
            "--operator",
            "auto",
            "--expect-devices",
            "12",
        ]);
        assert_eq!(cli.operator, OperatorMode::Auto);
        assert_eq!(cli.expect_devices, Some(12));
    }

    #[test]
    fn test_cli_rejects_unknown_operator() {
        let result = Cli::try_parse_from(["pixelmesh-server", "--operator", "telepathy"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_bind_override_is_reported() {
        let cli = Cli::parse_from(["pixelmesh-server", "--bind", "not.an.ip"]);
        let config = cli.apply(AppConfig::default());
        assert!(config.bind_addr().is_err());
    }
}
