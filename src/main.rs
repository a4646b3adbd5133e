//! Tenant request pipeline server.
//!
//! Serves the demo operations behind the correlation, authorization and
//! logging pipeline. Configuration comes from an optional TOML file; the JWT
//! secret may also be supplied on the command line or through the
//! environment.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use tenant_pipeline::config::{read_config, validate_config, ConfigError, ConfigWatcher};
use tenant_pipeline::http::server::ctrl_c;
use tenant_pipeline::observability::{logging, metrics, TracingSink};
use tenant_pipeline::security::JwtVerifier;
use tenant_pipeline::{PipelineConfig, PipelineServer};

#[derive(Parser)]
#[command(name = "tenant-pipeline", version)]
#[command(about = "Request context, authorization and operation logging pipeline", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload group, operation and sanitize declarations when the file changes.
    #[arg(long, requires = "config")]
    watch: bool,

    /// HS256 secret, overriding `auth.jwt_secret`.
    #[arg(long, env = "TENANT_PIPELINE_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(secret) = &cli.jwt_secret {
        config.auth.jwt_secret = secret.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.logging)?;
    tracing::info!("tenant-pipeline v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        groups = config.groups.len(),
        operations = config.operations.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (_watcher, updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let watcher = match cli.jwt_secret.clone() {
                Some(secret) => watcher.with_override(move |config| {
                    config.auth.jwt_secret = secret.clone();
                }),
                None => watcher,
            };
            (Some(watcher.run()?), Some(updates))
        }
        _ => (None, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let verifier = Arc::new(JwtVerifier::from_config(&config.auth));
    let server = PipelineServer::new(config, verifier, Arc::new(TracingSink));
    server.run(listener, updates, ctrl_c()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
