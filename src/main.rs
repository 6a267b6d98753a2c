use deposit_monitor::api::MetricsServer;
use deposit_monitor::app::{build_processor, connect_provider};
use deposit_monitor::blockchain::{deposit_filter, DepositMonitor, EthersChainClient, WsEventSource};
use deposit_monitor::config::AppConfig;
use deposit_monitor::database::SqliteDepositStore;
use deposit_monitor::error::MonitorError;
use deposit_monitor::logging::{init_logging, ErrorLogger, LogContext};
use log::{error, info, warn};
use prometheus::Registry;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(config).await {
        Ok(()) => {
            info!("Deposit monitor shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            ErrorLogger::log_error(&e, Some(LogContext::new("main", "run")));
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), MonitorError> {
    info!("Starting deposit monitor for contract {}", config.chain.contract_address);
    if config.processing.test_mode {
        warn!("Test mode enabled: deposits are not stored and no notifications are sent");
    }

    let store = Arc::new(SqliteDepositStore::new(&config.store.path)?);
    info!("Deposit store opened at {}", config.store.path);

    let filter = deposit_filter(&config.chain.contract_address, &config.chain.event_signature)?;
    let provider = connect_provider(&config.chain.ws_url).await?;

    let registry = Registry::new();
    let processor = build_processor(
        &config,
        Arc::new(EthersChainClient::new(provider.clone())),
        store.clone(),
        &config.store.collection,
        &registry,
    )?;
    let source = Arc::new(WsEventSource::new(provider, filter));

    let monitor = DepositMonitor::new(source, processor, store, config.processing.max_in_flight);
    let handle = monitor.handle();

    let metrics_task = if config.metrics.enabled {
        let server = MetricsServer::new(registry, config.metrics.host.clone(), config.metrics.port)
            .with_monitor(handle.clone());
        let shutdown = handle.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.start(async move { shutdown.wait_for_shutdown().await }).await {
                error!("Metrics server failed: {}", e);
            }
        }))
    } else {
        None
    };

    let signal_handle = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_handle.shutdown();
            }
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
            }
        }
    });

    let result = monitor.run().await;

    // also stops the metrics server when the subscription ended on its own
    handle.shutdown();
    if let Some(task) = metrics_task {
        if let Err(e) = task.await {
            error!("Metrics server task failed: {}", e);
        }
    }

    result
}
