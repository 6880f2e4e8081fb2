use clap::{Parser, Subcommand};
use pricefeed_application::{JobRepository, MovingAverageRepository, ObservationRepository};
use pricefeed_domain::DEFAULT_WINDOW_SIZE;
use shaku::HasComponent;
use std::sync::Arc;

mod settings {
    include!("../settings.rs");
}

mod di {
    include!("../di.rs");
}

#[derive(Parser)]
#[command(name = "pricefeed-inspect")]
#[command(about = "Inspect polling jobs, observations and moving averages", long_about = None)]
struct Cli {
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every recorded polling job.
    Jobs,
    /// Show one polling job.
    Job { id: String },
    /// Show the latest moving average and recent observations for a symbol.
    Symbol {
        symbol: String,

        #[arg(short, long, default_value_t = DEFAULT_WINDOW_SIZE)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = settings::Settings::load(cli.config.as_deref())?;
    let module = di::create_app_module(&settings);

    match cli.command {
        Command::Jobs => {
            let jobs: Arc<dyn JobRepository> = module.resolve();
            let mut all = jobs.list_jobs().await?;
            all.sort_by_key(|job| job.created_at());

            if all.is_empty() {
                println!("No polling jobs recorded");
            }
            for job in all {
                println!(
                    "{}  {:<9}  {:<13}  every {:>4}s  {}",
                    job.id(),
                    job.status().as_str(),
                    job.provider(),
                    job.interval_secs(),
                    job.symbols().join(",")
                );
            }
        }
        Command::Job { id } => {
            let jobs: Arc<dyn JobRepository> = module.resolve();
            match jobs.get_job(&id).await? {
                Some(job) => {
                    println!("Job {}", job.id());
                    println!("  Status: {}", job.status().as_str());
                    println!("  Provider: {}", job.provider());
                    println!("  Interval: {}s", job.interval_secs());
                    println!("  Symbols: {}", job.symbols().join(", "));
                    println!("  Created: {}", job.created_at());
                }
                None => println!("Job {} not found", id),
            }
        }
        Command::Symbol { symbol, limit } => {
            let averages: Arc<dyn MovingAverageRepository> = module.resolve();
            let observations: Arc<dyn ObservationRepository> = module.resolve();

            match averages.get_moving_average(&symbol).await? {
                Some(average) => {
                    println!(
                        "{}-point moving average for {}: {}",
                        average.window_size(),
                        average.symbol(),
                        average.value()
                    );
                    println!("  As of: {}", average.timestamp());
                    println!("  Trigger observation: {}", average.trigger_observation_id());
                    println!("  Calculated: {}", average.calculated_at());
                }
                None => println!("No moving average stored for {}", symbol),
            }

            let recent = observations.recent_observations(&symbol, limit).await?;
            println!("\n  Recent observations ({}):", recent.len());
            for observation in recent {
                println!(
                    "    {}  {:>12}  {}  {}",
                    observation.timestamp(),
                    observation.price(),
                    observation.provider(),
                    observation.id()
                );
            }
        }
    }

    Ok(())
}
