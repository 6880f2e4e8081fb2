mod di;
mod settings;

use crate::di::create_app_module;
use crate::settings::Settings;
use clap::Parser;
use pricefeed_application::{
    ConsumerReport, EventConsumer, EventPublisher, JobOrchestrator, PollingRequest,
};
use shaku::HasComponent;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pricefeed")]
#[command(about = "Poll prices, publish them to Kafka and keep moving averages", long_about = None)]
struct Cli {
    /// Settings file (TOML), overlaid by PRICEFEED_* environment variables.
    #[arg(long)]
    config: Option<String>,

    #[arg(long, value_delimiter = ',', required = true)]
    symbols: Vec<String>,

    /// Seconds between polling cycles.
    #[arg(long, default_value_t = 60)]
    interval: u64,

    #[arg(long, default_value = "alpha_vantage")]
    provider: String,

    /// Only poll and publish; leave aggregation to a separate `price-consumer`.
    #[arg(long)]
    no_consumer: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    info!("Starting pricefeed");

    let module = create_app_module(&settings);
    let orchestrator: Arc<dyn JobOrchestrator> = module.resolve();
    let publisher: Arc<dyn EventPublisher> = module.resolve();

    let consumer_cancel = CancellationToken::new();
    let consumer_task = if cli.no_consumer {
        None
    } else {
        let consumer: Arc<dyn EventConsumer> = module.resolve();
        let cancel = consumer_cancel.clone();
        Some(tokio::spawn(async move { consumer.run(cancel).await }))
    };

    let request = PollingRequest::new(cli.symbols, cli.interval, cli.provider);
    let created = orchestrator.create(request).await;

    match &created {
        Ok(job_id) => {
            info!(job_id = job_id.as_str(), "Polling job started (Press Ctrl+C to stop)");
            wait_for_shutdown(orchestrator.as_ref()).await;
        }
        Err(e) => error!("Could not start polling job: {}", e),
    }

    teardown(
        orchestrator.as_ref(),
        consumer_cancel,
        consumer_task,
        publisher.as_ref(),
        &settings,
    )
    .await;

    created?;
    info!("Shutdown complete");
    Ok(())
}

/// Returns on Ctrl-C, or once no polling job is left running.
async fn wait_for_shutdown(orchestrator: &dyn JobOrchestrator) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut supervision = tokio::time::interval(Duration::from_secs(5));

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Received shutdown signal, stopping gracefully...");
                return;
            }
            _ = supervision.tick() => {
                if orchestrator.active_count().await == 0 {
                    warn!("No polling job is running anymore, shutting down");
                    return;
                }
            }
        }
    }
}

async fn teardown(
    orchestrator: &dyn JobOrchestrator,
    consumer_cancel: CancellationToken,
    consumer_task: Option<JoinHandle<ConsumerReport>>,
    publisher: &dyn EventPublisher,
    settings: &Settings,
) {
    orchestrator.shutdown().await;

    consumer_cancel.cancel();
    if let Some(task) = consumer_task {
        match task.await {
            Ok(report) => info!(
                "Consumer processed {} messages ({} stored, {} skipped, {} malformed, {} failed)",
                report.received, report.stored, report.skipped, report.malformed, report.failed
            ),
            Err(e) => error!("Consumer task ended abnormally: {}", e),
        }
    }

    let remaining = publisher.flush(settings.flush_timeout()).await;
    if remaining > 0 {
        warn!("{} price events were still in flight at shutdown", remaining);
    }

    match orchestrator.list().await {
        Ok(jobs) => {
            for job in jobs {
                info!(
                    job_id = job.id(),
                    "{:?} via {}: {}",
                    job.symbols(),
                    job.provider(),
                    job.status().as_str()
                );
            }
        }
        Err(e) => warn!("Could not list jobs: {}", e),
    }
}
