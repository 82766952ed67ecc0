#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use fxqs::config::{Args, ServerConfig, Tables};
use fxqs::metrics::{start_metrics_server, HealthState};
use fxqs::run;
use fxqs::server::ServerState;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config: ServerConfig = args.clone().into();

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        anyhow::bail!("configuration error: {}", e);
    }

    let tables = if let Some(ref path) = args.tables {
        load_tables(path)?
    } else {
        warn!("no tables file given, using built-in credential and rate tables");
        Tables::default()
    };
    if let Err(e) = tables.validate() {
        anyhow::bail!("tables error: {}", e);
    }
    info!(
        "serving {} users and {} currencies",
        tables.users.len(),
        tables.rates.len()
    );

    let state = Arc::new(ServerState::new(config.clone(), tables));

    let listener = TcpListener::bind(config.listen).await?;
    info!("bound to {}", config.listen);

    let health_state = HealthState::new();

    tokio::spawn({
        let health_state = health_state.clone();
        async move {
            if let Err(e) = start_metrics_server(config.metrics_addr, health_state).await {
                warn!("metrics server error: {}", e);
            }
        }
    });

    tokio::select! {
        result = run(listener, state) => {
            if let Err(e) = result {
                tracing::error!("server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    Ok(())
}

fn load_tables(path: &Path) -> Result<Tables> {
    let data = std::fs::read_to_string(path)?;
    let tables: Tables = toml::from_str(&data)?;
    info!("loaded tables from {}", path.display());
    Ok(tables)
}
