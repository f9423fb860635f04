use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use fundamento_ranking::config::EngineConfig;
use fundamento_ranking::dates::{cutoff_date, parse_record_date, parse_record_timestamp, DateWindow};
use fundamento_ranking::db::{self, PgStore};
use fundamento_ranking::engine::RankingEngine;
use fundamento_ranking::fundamento::Fundamento;
use fundamento_ranking::import;
use fundamento_ranking::models::{NewQualitativeEvent, Team};
use fundamento_ranking::queue::FileEventQueue;
use fundamento_ranking::ranking::{RankingQuery, RankingScope, SortMode};
use fundamento_ranking::repository::{EventSyncState, RosterSource};

#[derive(Parser)]
#[command(name = "fundamento-ranking")]
#[command(about = "Athlete performance ranking by fundamento", long_about = None)]
struct Cli {
    /// JSON engine configuration; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Offline queue for events that could not reach the database
    #[arg(long, global = true, default_value = "pending_events.jsonl")]
    queue: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import qualitative events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one qualitative event
    Record {
        #[arg(long)]
        athlete: Uuid,
        #[arg(long)]
        fundamento: String,
        #[arg(long)]
        event_type: String,
        #[arg(long)]
        training: Option<Uuid>,
        #[arg(long)]
        notes: Option<String>,
        /// Event time (ISO-8601 or DD/MM/YYYY); now when omitted
        #[arg(long, value_parser = parse_timestamp_arg)]
        at: Option<chrono::DateTime<Utc>>,
    },
    /// Push queued offline events to the database
    Sync,
    /// Delete an event by id (local_ ids are removed from the offline queue)
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Rank athletes overall or for one fundamento
    #[command(group(
        ArgGroup::new("start")
            .args(["since", "since_days"])
            .multiple(false)
    ))]
    Rank {
        #[arg(long, value_parser = parse_fundamento_arg)]
        fundamento: Option<Fundamento>,
        #[arg(long, default_value_t = SortMode::Composite)]
        mode: SortMode,
        #[arg(long, value_parser = parse_team_arg)]
        team: Option<Team>,
        #[arg(long, value_parser = parse_date_arg)]
        since: Option<NaiveDate>,
        #[arg(long)]
        since_days: Option<i64>,
        #[arg(long, value_parser = parse_date_arg)]
        until: Option<NaiveDate>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Include athletes below the minimum execution sample
        #[arg(long)]
        all: bool,
    },
    /// Per-fundamento aggregates for one athlete or the whole roster
    #[command(group(
        ArgGroup::new("start")
            .args(["since", "since_days"])
            .multiple(false)
    ))]
    Summary {
        #[arg(long)]
        athlete: Option<Uuid>,
        #[arg(long, value_parser = parse_date_arg)]
        since: Option<NaiveDate>,
        #[arg(long)]
        since_days: Option<i64>,
        #[arg(long, value_parser = parse_date_arg)]
        until: Option<NaiveDate>,
    },
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_record_date(raw).map_err(|err| err.to_string())
}

fn parse_timestamp_arg(raw: &str) -> Result<chrono::DateTime<Utc>, String> {
    parse_record_timestamp(raw).map_err(|err| err.to_string())
}

fn parse_fundamento_arg(raw: &str) -> Result<Fundamento, String> {
    Fundamento::parse(raw).map_err(|err| err.to_string())
}

fn parse_team_arg(raw: &str) -> Result<Team, String> {
    Team::parse(raw).map_err(|err| err.to_string())
}

fn window(since: Option<NaiveDate>, since_days: Option<i64>, until: Option<NaiveDate>) -> DateWindow {
    let start = since.or_else(|| since_days.map(cutoff_date));
    DateWindow::new(start, until)
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |pct| format!("{pct:.1}%"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => EngineConfig::builtin().context("built-in configuration is invalid")?,
    };
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    // Lazy so that offline recording works without a reachable database.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.request_timeout)
        .connect_lazy(&database_url)
        .context("invalid DATABASE_URL")?;

    let engine = RankingEngine::new(
        config,
        PgStore::new(pool.clone()),
        FileEventQueue::new(&cli.queue),
    );

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let summary = import::import_csv(engine.events(), &csv).await?;
            println!(
                "Recorded {} events, queued {} offline from {}.",
                summary.recorded,
                summary.queued,
                csv.display()
            );
            for (line, reason) in &summary.rejected {
                println!("- line {line} rejected: {reason}");
            }
        }
        Commands::Record {
            athlete,
            fundamento,
            event_type,
            training,
            notes,
            at,
        } => {
            let input = NewQualitativeEvent {
                athlete_id: athlete,
                training_id: training,
                fundamento,
                event_type,
                timestamp: at.unwrap_or_else(Utc::now),
                notes,
            };
            let outcome = engine.record_event(&input).await?;
            let id = outcome.event.id.as_deref().unwrap_or("-");
            match outcome.state {
                EventSyncState::PendingSync => println!(
                    "Database unreachable; event {id} queued in {}.",
                    cli.queue.display()
                ),
                _ => println!(
                    "Recorded {} {} (weight {:.1}) as {id}.",
                    outcome.event.fundamento, outcome.event.event_type, outcome.event.weight
                ),
            }
        }
        Commands::Sync => {
            let report = engine.sync_pending().await?;
            println!(
                "Synced {} queued events; {} still pending.",
                report.synced_count, report.failed_count
            );
            if report.permanently_local_count > 0 {
                println!(
                    "{} events have exhausted their sync attempts and remain local.",
                    report.permanently_local_count
                );
            }
        }
        Commands::Delete { id } => {
            if engine.delete_event(&id).await? {
                println!("Deleted {id}.");
            } else {
                println!("No event with id {id}.");
            }
        }
        Commands::Rank {
            fundamento,
            mode,
            team,
            since,
            since_days,
            until,
            limit,
            all,
        } => {
            let query = RankingQuery {
                scope: fundamento.map_or(RankingScope::Overall, RankingScope::Fundamento),
                sort_mode: mode,
                apply_min_sample: !all,
                top_n: Some(limit),
                team,
                window: window(since, since_days, until),
            };
            let result = engine.rank(&query).await?;

            if result.degraded {
                println!("Warning: database unreachable for events, using offline queue only.");
            }
            if result.entries.is_empty() {
                println!("No eligible athletes for this window.");
                return Ok(());
            }

            let title = fundamento.map_or_else(|| "overall".to_string(), |f| f.to_string());
            println!("Top athletes ({title}, by {mode}):");
            for entry in &result.entries {
                println!(
                    "{}. {} score {:.2} (quant {}, qual {}) across {} executions, {} events [{}]",
                    entry.rank_position + 1,
                    entry.athlete_name,
                    entry.composite_score,
                    fmt_pct(Some(entry.quantitative_pct)),
                    fmt_pct(entry.qualitative_pct),
                    entry.total_executions,
                    entry.total_qualitative_events,
                    entry.descriptive_label
                );
            }
        }
        Commands::Summary {
            athlete,
            since,
            since_days,
            until,
        } => {
            if let Some(athlete_id) = athlete {
                let found = engine
                    .events()
                    .store()
                    .athlete(athlete_id)
                    .await?
                    .with_context(|| format!("no athlete with id {athlete_id}"))?;
                println!("{} ({})", found.name, found.team);
            }
            let window = window(since, since_days, until);
            let aggregates = engine.aggregates(&window, athlete).await?;
            if aggregates.is_empty() {
                println!("No data for this window.");
                return Ok(());
            }
            for ((athlete_id, fundamento), aggregate) in &aggregates {
                println!(
                    "- {athlete_id} {fundamento}: accuracy {:.1}% over {} executions; \
                     {} events (+{} / -{}), mean {}, {} [{}]",
                    aggregate.accuracy_pct,
                    aggregate.sample_count,
                    aggregate.total_events,
                    aggregate.positive_count,
                    aggregate.negative_count,
                    aggregate
                        .mean_weight
                        .map_or_else(|| "-".to_string(), |mean| format!("{mean:.2}")),
                    fmt_pct(aggregate.qualitative_pct),
                    aggregate.label
                );
            }
            if let Some(athlete_id) = athlete {
                let mix = engine.event_breakdown(&window, athlete_id, None).await?;
                if !mix.is_empty() {
                    println!("Event mix:");
                }
                for item in &mix {
                    println!(
                        "- {}: {} ({:.1}%), weight {:.1}",
                        item.event_type, item.count, item.share_pct, item.weight
                    );
                }
            }
        }
    }

    Ok(())
}
