use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use aquatrace_monitor::{
    alert::{AlertDispatcher, Notifier, TwilioNotifier},
    api::api_router,
    config::{ChannelConfig, Config, FarmConfig, SourceConfig, StorageConfig},
    monitor::Monitor,
    source::{
        LiveReadingSource, ReadingSource, SerialOpener, SyntheticReadingSource, TcpOpener,
    },
    storage::{FarmRegistry, MemoryStorage, ReadingRegistry, SqliteStorage},
};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "aquatrace-monitor")]
#[command(about = "AquaTrace water quality monitor")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "aquatrace.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };
    config.alerts = config.alerts.with_env_fallback();

    let source = build_source(&config.source).await;

    let notifier = TwilioNotifier::from_config(&config.alerts)?;
    if !notifier.is_configured() {
        warn!("SMS credentials missing, alerts will not be delivered");
    }
    let alerts = Arc::new(
        AlertDispatcher::new(Arc::new(notifier)).with_cooldown(config.alerts.cooldown()),
    );

    match config.storage {
        StorageConfig::Memory => {
            info!("Using in-memory storage");
            let storage = MemoryStorage::new();
            let monitor = Monitor::new(source, storage.clone(), storage, alerts);
            run_server(monitor, &config.farms, config.server.http_addr).await?;
        }
        StorageConfig::Sqlite { ref path } => {
            info!(path = ?path, "Using SQLite storage");
            let storage = SqliteStorage::new(path).await?;
            let monitor = Monitor::new(source, storage.clone(), storage, alerts);
            run_server(monitor, &config.farms, config.server.http_addr).await?;
        }
    }

    Ok(())
}

async fn build_source(config: &SourceConfig) -> Arc<dyn ReadingSource> {
    let SourceConfig::Hardware { channel, .. } = config else {
        info!("Using simulated sensor readings");
        return Arc::new(SyntheticReadingSource::new());
    };

    match channel {
        ChannelConfig::Serial { path, baud_rate } => {
            info!(path = ?path, baud_rate, "Using serial sensor channel");
            let opener = SerialOpener::new(path.to_string_lossy(), *baud_rate);
            let source = LiveReadingSource::new(opener)
                .with_read_timeout(config.read_timeout())
                .with_settle_delay(config.settle_delay());
            if let Err(e) = source.connect().await {
                warn!(error = %e, "Sensor channel unavailable at startup, will retry on poll");
            }
            Arc::new(source)
        }
        ChannelConfig::Tcp { addr } => {
            info!(%addr, "Using TCP sensor channel");
            let source = LiveReadingSource::new(TcpOpener::new(addr.clone()))
                .with_read_timeout(config.read_timeout())
                .with_settle_delay(config.settle_delay());
            if let Err(e) = source.connect().await {
                warn!(error = %e, "Sensor channel unavailable at startup, will retry on poll");
            }
            Arc::new(source)
        }
    }
}

async fn run_server<F, R>(
    monitor: Monitor<F, R>,
    farms: &[FarmConfig],
    http_addr: SocketAddr,
) -> color_eyre::Result<()>
where
    F: FarmRegistry,
    R: ReadingRegistry,
{
    for farm in farms {
        monitor.farms().register(farm.to_farm()).await?;
        info!(farm_id = %farm.id, name = %farm.name, "Farm registered");
    }

    let cancel = CancellationToken::new();

    let app = api_router(monitor);
    let listener = TcpListener::bind(http_addr).await?;
    info!(%http_addr, "HTTP server listening");

    let cancel_clone = cancel.clone();
    tokio::select! {
        result = axum::serve(listener, app).with_graceful_shutdown(async move {
            cancel_clone.cancelled().await;
        }) => {
            if let Err(e) = result {
                tracing::error!(error = ?e, "HTTP server error");
            }
            info!("HTTP server shut down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
        }
    }

    Ok(())
}
