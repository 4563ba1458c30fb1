use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod commands;

use queue_cell::SupabaseQueueStore;
use shared_config::AppConfig;
use shared_database::SupabaseClient;

#[derive(Parser)]
#[command(name = "clinic-queue")]
#[command(about = "Wait-time estimation and queue statistics for the clinic")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the wait for a slot
    Estimate {
        /// Appointment date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Appointment time (HH:MM or HH:MM:SS)
        #[arg(long, value_parser = parse_time)]
        time: NaiveTime,
        /// Service UUID
        #[arg(long)]
        service: Option<Uuid>,
    },
    /// Recompute queue statistics for a day
    Recompute {
        /// Day to aggregate, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Limit to one service
        #[arg(long)]
        service: Option<Uuid>,
    },
    /// Show the current queue per service
    Status {
        /// Day to inspect, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Recompute today's statistics on an interval until interrupted
    Daily {
        /// Minutes between runs
        #[arg(long, default_value_t = 60)]
        interval_minutes: u64,
    },
}

fn parse_time(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = AppConfig::from_env();
    config.queue.validate()?;

    let client = Arc::new(SupabaseClient::new(&config));
    let store = Arc::new(SupabaseQueueStore::new(
        client,
        config.supabase_service_token.clone(),
    ));

    info!("Clinic queue tooling started against {}", config.supabase_url);

    match cli.command {
        Commands::Estimate { date, time, service } => {
            commands::estimate(store, &config, date, time, service).await
        }
        Commands::Recompute { date, service } => {
            commands::recompute(store, &config, date, service).await
        }
        Commands::Status { date } => commands::status(store, date).await,
        Commands::Daily { interval_minutes } => {
            commands::daily(store, &config, interval_minutes).await
        }
    }
}
