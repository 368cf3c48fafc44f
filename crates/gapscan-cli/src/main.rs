mod compute;
mod db;
mod report;
mod scrape;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use gapscan_core::{is_week_start, week_start_for, Platform};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gapscan")]
#[command(about = "Gap score command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database utilities
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Collect raw marketplace signals for one category
    Scrape {
        /// Platform to scrape (etsy, gumroad, whop, reddit)
        #[arg(long)]
        platform: String,

        /// Category to scrape, e.g. "digital planners"
        #[arg(long)]
        category: String,

        /// Week to record signals under (a Monday; defaults to the current week)
        #[arg(long)]
        week: Option<NaiveDate>,
    },
    /// Compute gap scores from stored signals
    Compute {
        /// Restrict scoring to a single platform
        #[arg(long)]
        platform: Option<String>,

        /// Week to score (a Monday; defaults to the current week)
        #[arg(long)]
        week: Option<NaiveDate>,
    },
    /// Print the week's ranked gap scores
    Report {
        /// Week to report on (a Monday; defaults to the current week)
        #[arg(long)]
        week: Option<NaiveDate>,

        /// Maximum rows to print
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("no command given; try `gapscan --help`");
        return Ok(());
    };

    let config = gapscan_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = gapscan_db::PoolConfig::from_app_config(&config);
    let pool = gapscan_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => db::run_ping(&pool).await,
            DbCommands::Migrate => db::run_migrate(&pool).await,
        },
        Commands::Scrape {
            platform,
            category,
            week,
        } => scrape::run_scrape(&pool, &config, &platform, &category, week).await,
        Commands::Compute { platform, week } => {
            let scoring = gapscan_core::ScoringConfig::load_or_embedded(&config.scoring_path)?;
            compute::run_compute(&pool, &config, &scoring, platform.as_deref(), week).await
        }
        Commands::Report { week, limit } => report::run_report(&pool, week, limit).await,
    }
}

/// Resolve an optional `--week` argument: a given date must be a Monday; an
/// absent one defaults to the current week.
pub(crate) fn resolve_week(week: Option<NaiveDate>) -> anyhow::Result<NaiveDate> {
    match week {
        Some(date) if is_week_start(date) => Ok(date),
        Some(date) => anyhow::bail!("--week {date} is not a Monday; weeks start on Mondays"),
        None => Ok(week_start_for(chrono::Utc::now().date_naive())),
    }
}

pub(crate) fn parse_platform(raw: &str) -> anyhow::Result<Platform> {
    raw.parse().map_err(|e: gapscan_core::SignalError| {
        anyhow::anyhow!("{e}; valid platforms are etsy, gumroad, whop, reddit")
    })
}

/// Attempt to mark a pipeline run as failed, logging any secondary error.
pub(crate) async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    context: &'static str,
    message: String,
) {
    if let Err(mark_err) = gapscan_db::fail_pipeline_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark {context} run as failed"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
