use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use finsentinel_metrics::config::Settings;
use finsentinel_metrics::feed::{self, HistoryOrder};
use finsentinel_metrics::{
    db, derive_metrics, fields, report, CurrentPrediction, DerivedMetrics, HistoryMatcher,
    PredictionRecord, TickerTable,
};

#[derive(Parser)]
#[command(name = "finsentinel-metrics")]
#[command(about = "Derived risk metrics over financial distress prediction history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EntityArgs {
    /// Company display name, e.g. "Apple Inc."
    #[arg(long)]
    company: String,
    /// Ticker for companies missing from the built-in table
    #[arg(long)]
    ticker: Option<String>,
}

impl EntityArgs {
    fn tickers(&self) -> TickerTable {
        let table = TickerTable::dashboard();
        match &self.ticker {
            Some(ticker) => table.with_entry(self.company.clone(), ticker.clone()),
            None => table,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a short prediction history for two tickers
    Seed,
    /// Append predictions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Derive dashboard metrics from the stored history
    Metrics {
        #[command(flatten)]
        entity: EntityArgs,
        /// Number of most recent predictions to consider
        #[arg(long)]
        limit: Option<i64>,
        /// A `/predict` response whose values override the latest stored prediction
        #[arg(long)]
        prediction: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Derive dashboard metrics from a `/history` JSON file
    Inspect {
        #[arg(long)]
        history: PathBuf,
        #[command(flatten)]
        entity: EntityArgs,
        /// The file lists the newest prediction first. By default entries are
        /// read oldest-first, which is how `/history` returns them
        #[arg(long)]
        newest_first: bool,
        #[arg(long)]
        prediction: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown report for one company
    Report {
        #[command(flatten)]
        entity: EntityArgs,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export one company's prediction history as CSV
    Export {
        #[command(flatten)]
        entity: EntityArgs,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value = "history.csv")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let (_, pool) = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let (_, pool) = connect().await?;
            let inserted = db::seed(&pool).await?;
            println!("Seeded {inserted} predictions.");
        }
        Commands::Import { csv } => {
            let (_, pool) = connect().await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} predictions from {}.", csv.display());
        }
        Commands::Metrics {
            entity,
            limit,
            prediction,
            json,
        } => {
            let (settings, pool) = connect().await?;
            let history = db::fetch_history(&pool, limit.unwrap_or(settings.history_limit)).await?;
            let current = prediction.as_deref().map(load_prediction).transpose()?;
            let metrics = derive(&history, &entity, current.as_ref());
            print_metrics(&metrics, json)?;
        }
        Commands::Inspect {
            history,
            entity,
            newest_first,
            prediction,
            json,
        } => {
            let order = if newest_first {
                HistoryOrder::NewestFirst
            } else {
                HistoryOrder::OldestFirst
            };
            let metrics = inspect(&history, order, &entity, prediction.as_deref())?;
            print_metrics(&metrics, json)?;
        }
        Commands::Report { entity, limit, out } => {
            let (settings, pool) = connect().await?;
            let history = db::fetch_history(&pool, limit.unwrap_or(settings.history_limit)).await?;
            let tickers = entity.tickers();
            let matcher = HistoryMatcher::new();
            let metrics = derive_metrics(&matcher, &history, &entity.company, &tickers, None);
            let matched = matcher.matches(&history, &entity.company, &tickers);
            let markdown = report::build_report(&metrics, &matched);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { entity, limit, out } => {
            let (settings, pool) = connect().await?;
            let history = db::fetch_history(&pool, limit.unwrap_or(settings.history_limit)).await?;
            let matched = HistoryMatcher::new().matches(&history, &entity.company, &entity.tickers());
            if matched.is_empty() {
                println!("No predictions recorded for {}.", entity.company);
                return Ok(());
            }
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let written = report::export_history_csv(file, &matched, &entity.company)?;
            println!("Exported {written} predictions to {}.", out.display());
        }
    }

    Ok(())
}

/// Settings are only read by commands that talk to the database.
async fn connect() -> anyhow::Result<(Settings, PgPool)> {
    let settings = Settings::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(settings.require_database_url()?)
        .await
        .context("failed to connect to Postgres")?;
    Ok((settings, pool))
}

fn derive(
    history: &[PredictionRecord],
    entity: &EntityArgs,
    current: Option<&CurrentPrediction>,
) -> DerivedMetrics {
    let metrics = derive_metrics(
        &HistoryMatcher::new(),
        history,
        &entity.company,
        &entity.tickers(),
        current,
    );
    tracing::info!(
        company = %entity.company,
        history = history.len(),
        matched = metrics.matched_count,
        fallback = metrics.used_fallback,
        "derived metrics"
    );
    metrics
}

/// Offline derivation from a saved feed; needs no settings.
fn inspect(
    path: &Path,
    order: HistoryOrder,
    entity: &EntityArgs,
    prediction: Option<&Path>,
) -> anyhow::Result<DerivedMetrics> {
    let history = feed::load_history(path, order)?;
    let current = prediction.map(load_prediction).transpose()?;
    Ok(derive(&history, entity, current.as_ref()))
}

fn load_prediction(path: &Path) -> anyhow::Result<CurrentPrediction> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read prediction file {}", path.display()))?;
    let body: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("prediction file {} is not valid JSON", path.display()))?;
    Ok(fields::prediction_from_value(&body))
}

fn print_metrics(metrics: &DerivedMetrics, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(metrics)?);
        return Ok(());
    }

    println!("{}", metrics.entity);
    if metrics.used_fallback {
        println!("  (no matching predictions; aggregates use the full history)");
    }
    println!(
        "- Financial Distress Index: {} {} [{}]",
        metrics
            .fdi_percent
            .map(|v| format!("{v}%"))
            .unwrap_or_else(|| "—".to_string()),
        metrics.fdi_trend.as_deref().unwrap_or(""),
        metrics.risk_status.map(|s| s.label()).unwrap_or("-")
    );
    println!(
        "- AI Sentiment Score: {}% {} [{}]",
        metrics.sentiment_score, metrics.sentiment_trend, metrics.sentiment_status
    );
    println!(
        "- Model Confidence: {} [{}]",
        metrics
            .confidence_percent
            .map(|v| format!("{v}%"))
            .unwrap_or_else(|| "—".to_string()),
        metrics.confidence_status
    );
    println!(
        "- Market Volatility: {:.1}% {} [{}]",
        metrics.volatility_score, metrics.volatility_trend, metrics.volatility_status
    );
    Ok(())
}
