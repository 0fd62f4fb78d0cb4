use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use ingest_core::{telemetry, Config};
use ingestor::api::{DaySummaryApi, Query, TradesApi};
use ingestor::app::{self, App, Sink};
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[clap(name = "mb-ingestor")]
#[clap(about = "Mercado Bitcoin market data ingestor", version)]
struct Cli {
    /// Output destination
    #[clap(long, value_enum, default_value = "local", global = true, env = "INGEST_SINK")]
    sink: Sink,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one day summary per day in a date range
    DaySummary {
        /// Coin symbol, e.g. BTC
        #[clap(long)]
        coin: String,

        /// First day to fetch (YYYY-MM-DD)
        #[clap(long)]
        from: NaiveDate,

        /// Last day to fetch, inclusive (defaults to --from)
        #[clap(long)]
        to: Option<NaiveDate>,
    },

    /// Ingest executed trades, optionally bounded in time
    Trades {
        /// Coin symbol, e.g. BTC
        #[clap(long)]
        coin: String,

        /// Range start (RFC3339 format)
        #[clap(long)]
        from: Option<DateTime<Utc>>,

        /// Range end (RFC3339 format)
        #[clap(long)]
        to: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Fatal error");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded environment from {}", path.display());
    }

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    telemetry::init(&config.telemetry)?;

    let cli = Cli::parse();
    let app = App::new(config, cli.sink).await?;

    let summary = match cli.command {
        Commands::DaySummary { coin, from, to } => {
            let queries = app::day_queries(from, to.unwrap_or(from))?;
            info!(coin = %coin, days = queries.len(), sink = ?cli.sink, "Starting day summary ingestion");

            let api = app.day_summary(&coin);
            let mut writer = app.writer(cli.sink, &coin, DaySummaryApi::NAME)?;
            app.run(&api, &queries, writer.as_mut()).await?
        }

        Commands::Trades { coin, from, to } => {
            info!(coin = %coin, from = ?from, to = ?to, sink = ?cli.sink, "Starting trades ingestion");

            let api = app.trades(&coin);
            let mut writer = app.writer(cli.sink, &coin, TradesApi::NAME)?;
            app.run(&api, &[Query::Range { from, to }], writer.as_mut()).await?
        }
    };

    println!("{} records -> {}", summary.records, summary.destination);

    telemetry::shutdown();
    Ok(())
}
