//! bluosec - display link service
//!
//! Serves the BluOsec display protocol for a simulated motor controller over
//! a TCP serial bridge, persisting configuration to an EEPROM image.

use bluosec_server::{
    open_engine, run_metrics_server, Config, Metrics, Server, ServerConfig, SimulatedTelemetry,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if BLUOSEC_CONFIG is set, then env overrides)
    let config_path = std::env::var("BLUOSEC_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(path) = &config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // An explicitly named file must load
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::from_env()
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("Configuration error: {}", e);
        return Err(e.into());
    }

    tracing::info!("Starting bluosec link service");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    match &config.eeprom.path {
        Some(path) => tracing::info!(
            "  EEPROM image: {} ({} bytes)",
            path.display(),
            config.eeprom.size
        ),
        None => tracing::info!("  EEPROM image: volatile ({} bytes)", config.eeprom.size),
    }
    tracing::info!("  Telemetry tick: {}ms", config.telemetry.tick_ms);

    let (metrics_shutdown, _) = broadcast::channel(1);
    let metrics = if config.metrics.enabled {
        let metrics = Arc::new(Metrics::new()?);
        let addr = config.metrics.bind_addr;
        let handle = metrics.clone();
        let shutdown = metrics_shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(addr, handle, shutdown).await {
                tracing::error!("Metrics server failed: {}", e);
            }
        });
        tracing::info!("  Metrics: enabled ({})", addr);
        Some(metrics)
    } else {
        tracing::info!("  Metrics: disabled");
        None
    };

    let (engine, _) = open_engine(&config, metrics.clone())?;
    let telemetry = SimulatedTelemetry::new(
        config.telemetry.initial.clone(),
        config.telemetry.tick(),
    );

    let mut server_config = ServerConfig::from_config(&config);
    if let Some(metrics) = metrics {
        server_config = server_config.with_metrics(metrics);
    }
    let server = Arc::new(Server::new(server_config, engine, Arc::new(telemetry)));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    let shutdown_metrics = metrics_shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
        let _ = shutdown_metrics.send(());
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
