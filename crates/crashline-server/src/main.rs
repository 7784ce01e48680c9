//! Crashline server daemon (crashlined)
//!
//! Startup order:
//! 1. Parse arguments and load the YAML configuration
//! 2. Initialize tracing
//! 3. Apply the diagnostics settings and set up the crash reporter
//! 4. Start the server inside a recovery point and serve until SIGTERM/SIGINT
//!
//! The crash reporter is set up before the runtime exists, so a panic
//! anywhere in the server's lifetime is reported before the process dies.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crashline_core::config::{Config, LoggingConfig};
use crashline_server::Server;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "crashlined", version, about = "Crashline server")]
struct Args {
    /// Use alternate config file
    #[arg(long, env = "CRASHLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Send panic reports to the crash-tracking endpoint
    #[arg(long, env = "CRASHLINE_DIAGNOSTICS_REPORTING_ENABLED")]
    diagnostics_reporting_enabled: Option<bool>,

    /// Credentialed crash-tracking endpoint URL
    #[arg(long, env = "CRASHLINE_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Address to listen on, e.g. 127.0.0.1:26257
    #[arg(long)]
    listen_addr: Option<String>,
}

impl Args {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::load_or_default(&Config::default_path()),
        };
        self.apply(&mut config);
        Ok(config)
    }

    /// Command-line and environment values win over the file.
    fn apply(&self, config: &mut Config) {
        if let Some(enabled) = self.diagnostics_reporting_enabled {
            config.diagnostics.reporting_enabled = enabled;
        }
        if let Some(url) = &self.endpoint_url {
            config.diagnostics.endpoint_url = Some(url.clone());
        }
        if let Some(addr) = &self.listen_addr {
            config.server.listen_addr = addr.clone();
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

/// Waits for SIGTERM or SIGINT and cancels `token`.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

async fn serve(config: Config) -> Result<()> {
    let server = Server::start(&config.server).await?;
    tokio::spawn(shutdown_signal(server.shutdown_token()));
    server.run().await
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.load_config()?;
    init_tracing(&config.logging);

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!(field = %e.field, "{}", e.message);
        }
        anyhow::bail!("Invalid configuration ({} error(s))", errors.len());
    }

    crashline_telemetry::apply_config(&config.diagnostics);
    let flush = crashline_telemetry::setup_reporter("server")?;

    info!(listen_addr = %config.server.listen_addr, "Crashline server starting (crashlined)");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("crashlined-worker")
        .build()
        .context("Failed to build tokio runtime")?;

    let result = crashline_telemetry::recover_and_report(|| runtime.block_on(serve(config)));
    drop(runtime);

    match &result {
        Ok(()) => info!("Crashline server shut down gracefully"),
        Err(e) => error!(error = %e, "Crashline server exiting with error"),
    }

    if !flush.flush() {
        warn!("Some crash reports were not delivered before exit");
    }

    result
}
