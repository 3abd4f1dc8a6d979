//! services/tracker/src/bin/tracker.rs

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker_lib::{config::Config, error::TrackerError, state::AppState};
use uuid::Uuid;

/// tracker - daily reading plan progress
#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Reading plan progress, streaks and calendars", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Print today's reading for a user
    Today {
        user_id: Uuid,
        #[arg(long)]
        plan_id: Option<Uuid>,
        /// IANA timezone overriding the user's profile
        #[arg(long)]
        timezone: Option<String>,
    },
    /// Print completed-day count and current streak
    Stats {
        user_id: Uuid,
        #[arg(long)]
        plan_id: Option<Uuid>,
    },
    /// Print the completed-day calendar
    Calendar {
        user_id: Uuid,
        #[arg(long)]
        plan_id: Option<Uuid>,
        #[arg(long)]
        year: Option<i32>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), TrackerError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), TrackerError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded.");

    // --- 2. Connect to Database ---
    let state = AppState::connect(&config).await?;

    // --- 3. Run the Command ---
    match cli.command {
        Commands::Migrate => {
            info!("Running database migrations...");
            state.store.run_migrations().await?;
            info!("Database migrations complete.");
        }
        Commands::Today {
            user_id,
            plan_id,
            timezone,
        } => {
            let reading = state
                .reading_plans
                .get_today_reading(user_id, plan_id, timezone.as_deref())
                .await?;
            print_json(&reading)?;
        }
        Commands::Stats { user_id, plan_id } => {
            let stats = state.reading_plans.get_user_stats(user_id, plan_id).await?;
            print_json(&stats)?;
        }
        Commands::Calendar {
            user_id,
            plan_id,
            year,
        } => {
            let calendar = state
                .reading_plans
                .get_completed_days_for_calendar(user_id, plan_id, year)
                .await?;
            print_json(&calendar)?;
        }
    }

    Ok(())
}
