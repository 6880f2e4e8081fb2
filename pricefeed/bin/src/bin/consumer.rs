use clap::Parser;
use pricefeed_application::EventConsumer;
use shaku::HasComponent;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod settings {
    include!("../settings.rs");
}

mod di {
    include!("../di.rs");
}

#[derive(Parser)]
#[command(name = "price-consumer")]
#[command(about = "Consume price events and maintain 5-point moving averages", long_about = None)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = settings::Settings::load(cli.config.as_deref())?;

    info!(
        "Starting moving average consumer on {} (group {})",
        settings.kafka.topic, settings.kafka.group_id
    );

    let module = di::create_app_module(&settings);
    let consumer: Arc<dyn EventConsumer> = module.resolve();

    let cancel = CancellationToken::new();
    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { consumer.run(cancel).await })
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Received shutdown signal, stopping gracefully...");
    cancel.cancel();

    let report = task.await?;
    info!(
        "Consumer processed {} messages ({} stored, {} skipped, {} malformed, {} failed)",
        report.received, report.stored, report.skipped, report.malformed, report.failed
    );

    Ok(())
}
