use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use tutor_risk_trajectory::filter::SnapshotFilter;
use tutor_risk_trajectory::models::{RiskLevel, RiskSnapshot};
use tutor_risk_trajectory::{db, input, logging, report, risk};

#[derive(Parser)]
#[command(name = "risk-trajectory")]
#[command(about = "Dropout-risk trajectory estimates for tutors", long_about = None)]
struct Cli {
    /// Postgres holding student risk snapshots
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Keep one risk tier, e.g. riesgo_alto
    #[arg(long)]
    level: Option<RiskLevel>,
    /// Keep students whose name or id contains this text
    #[arg(long)]
    search: Option<String>,
}

impl From<FilterArgs> for SnapshotFilter {
    fn from(args: FilterArgs) -> Self {
        SnapshotFilter {
            level: args.level,
            search: args.search,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small sample cohort
    Seed,
    /// Import student snapshots from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the trajectory prediction for one student as JSON
    Estimate {
        #[arg(long)]
        student_id: String,
        /// Read snapshots from a JSON file instead of the database
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// List students closest to critical risk
    Rank {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = risk::RANKING_HORIZON_DAYS)]
        horizon_days: u32,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Write a markdown survival-alerts report
    Report {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        scope: Option<String>,
        #[arg(long, default_value = "survival-report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 5)]
        max_display: usize,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url =
        database_url.context("DATABASE_URL (or --database-url) must point at the risk database")?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_snapshots(
    source: Option<&PathBuf>,
    database_url: Option<&str>,
    student_id: Option<&str>,
) -> anyhow::Result<Vec<RiskSnapshot>> {
    match source {
        Some(path) => {
            let snapshots = input::read_snapshots(path)?;
            Ok(match student_id {
                Some(id) => snapshots.into_iter().filter(|s| s.student_id == id).collect(),
                None => snapshots,
            })
        }
        None => {
            let pool = connect(database_url).await?;
            db::fetch_snapshots(&pool, student_id).await
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();
    let database_url = cli.database_url.as_deref();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(database_url).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(database_url).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(database_url).await?;
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} students from {}.", csv.display());
        }
        Commands::Estimate { student_id, input } => {
            let snapshots =
                load_snapshots(input.as_ref(), database_url, Some(&student_id)).await?;
            let snapshot = snapshots
                .first()
                .with_context(|| format!("no snapshot found for student {student_id}"))?;
            let prediction = risk::estimate(snapshot);
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Commands::Rank {
            input,
            limit,
            horizon_days,
            filter,
        } => {
            let snapshots = load_snapshots(input.as_ref(), database_url, None).await?;
            let snapshots = SnapshotFilter::from(filter).apply(snapshots);
            let ranked = risk::rank_within_horizon(&snapshots, horizon_days);
            info!(students = snapshots.len(), ranked = ranked.len(), "ranking complete");

            if ranked.is_empty() {
                println!("No hay estudiantes en riesgo inminente.");
                return Ok(());
            }

            println!("Students closest to critical risk:");
            for prediction in ranked.iter().take(limit) {
                println!("- {}", report::describe_prediction(prediction));
            }
        }
        Commands::Report {
            input,
            scope,
            out,
            max_display,
            filter,
        } => {
            let snapshots = load_snapshots(input.as_ref(), database_url, None).await?;
            let snapshots = SnapshotFilter::from(filter).apply(snapshots);
            let report = report::build_report(
                scope.as_deref(),
                Utc::now().date_naive(),
                &snapshots,
                max_display,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
