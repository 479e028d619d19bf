use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::fields::parse_timestamp;
use crate::models::PredictionRecord;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply migrations")?;
    Ok(())
}

/// Appends one record. Returns false when `source_key` was already stored.
pub async fn record_prediction(
    pool: &PgPool,
    record: &PredictionRecord,
    source_key: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO finsentinel.predictions
        (id, source_key, ts, fdi, risk, confidence, company, ticker)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(source_key)
    .bind(record.timestamp)
    .bind(record.score)
    .bind(&record.risk_label)
    .bind(record.confidence)
    .bind(&record.entity_name)
    .bind(&record.entity_ticker)
    .execute(pool)
    .await
    .context("insert prediction failed")?;

    Ok(result.rows_affected() > 0)
}

/// The newest `limit` predictions, returned oldest-first.
pub async fn fetch_history(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<PredictionRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT ts, fdi, risk, confidence, company, ticker
        FROM finsentinel.predictions
        ORDER BY seq DESC
        LIMIT $1
        "#,
    )
    .bind(limit.max(1))
    .fetch_all(pool)
    .await
    .context("fetch prediction history failed")?;

    let mut history = Vec::with_capacity(rows.len());
    for row in rows.into_iter().rev() {
        history.push(PredictionRecord {
            timestamp: row.get("ts"),
            score: row.get("fdi"),
            risk_label: row.get("risk"),
            confidence: row.get("confidence"),
            entity_name: row.get("company"),
            entity_ticker: row.get("ticker"),
        });
    }

    tracing::debug!(records = history.len(), limit, "fetched prediction history");
    Ok(history)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let start = Utc::now() - Duration::days(6);
    let series = [
        ("Apple Inc.", "AAPL", [0.18, 0.22, 0.21, 0.30, 0.27, 0.33]),
        ("Tesla Inc.", "TSLA", [0.41, 0.55, 0.48, 0.62, 0.58, 0.71]),
    ];

    let mut inserted = 0usize;
    for (company, ticker, scores) in series {
        for (day, fdi) in scores.into_iter().enumerate() {
            let record = PredictionRecord {
                timestamp: Some(start + Duration::days(day as i64)),
                score: Some(fdi),
                risk_label: Some(label_for(fdi).to_string()),
                confidence: Some(fdi),
                entity_name: company.to_string(),
                entity_ticker: ticker.to_string(),
            };
            let source_key = format!("seed-{}-{day}", ticker.to_lowercase());
            if record_prediction(pool, &record, Some(&source_key)).await? {
                inserted += 1;
            }
        }
    }

    Ok(inserted)
}

/// Same cut-offs the prediction service uses when it labels a probability.
fn label_for(fdi: f64) -> &'static str {
    if fdi >= 0.7 {
        "Distressed"
    } else if fdi >= 0.4 {
        "Moderate"
    } else {
        "Healthy"
    }
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    ts: Option<String>,
    company: Option<String>,
    ticker: Option<String>,
    fdi: Option<f64>,
    risk: Option<String>,
    confidence: Option<f64>,
    source_key: Option<String>,
}

impl CsvRow {
    fn into_record(self) -> (PredictionRecord, String) {
        let timestamp: Option<DateTime<Utc>> = self.ts.as_deref().and_then(parse_timestamp);
        let source_key = self
            .source_key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let record = PredictionRecord {
            timestamp,
            score: self.fdi,
            risk_label: self.risk.filter(|r| !r.is_empty()),
            confidence: self.confidence,
            entity_name: self.company.unwrap_or_default(),
            entity_ticker: self.ticker.unwrap_or_default(),
        };
        (record, source_key)
    }
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;
        let (record, source_key) = row.into_record();
        if record_prediction(pool, &record, Some(&source_key)).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}
