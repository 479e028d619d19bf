use std::fmt::Write;

use crate::models::{DerivedMetrics, PredictionRecord};
use crate::status::StatusBucket;

fn status_cell(status: Option<StatusBucket>) -> &'static str {
    status.map(StatusBucket::label).unwrap_or("-")
}

fn percent_cell(value: Option<i64>) -> String {
    value.map(|v| format!("{v}%")).unwrap_or_else(|| "—".to_string())
}

/// Markdown rendering of the dashboard's headline cards plus recent matches.
pub fn build_report(metrics: &DerivedMetrics, matched: &[&PredictionRecord]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Financial Distress Report: {}", metrics.entity);
    if metrics.used_fallback {
        let _ = writeln!(
            output,
            "No predictions recorded for this company; aggregates use the full history."
        );
    } else {
        let _ = writeln!(
            output,
            "Derived from {} matching predictions.",
            metrics.matched_count
        );
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "| Metric | Value | Change | Status |");
    let _ = writeln!(output, "|---|---|---|---|");
    let _ = writeln!(
        output,
        "| Financial Distress Index | {} | {} | {} |",
        percent_cell(metrics.fdi_percent),
        metrics.fdi_trend.as_deref().unwrap_or("-"),
        status_cell(metrics.risk_status)
    );
    let _ = writeln!(
        output,
        "| AI Sentiment Score | {}% | {} | {} |",
        metrics.sentiment_score, metrics.sentiment_trend, metrics.sentiment_status
    );
    let _ = writeln!(
        output,
        "| Model Confidence | {} | - | {} |",
        percent_cell(metrics.confidence_percent),
        metrics.confidence_status
    );
    let _ = writeln!(
        output,
        "| Market Volatility | {:.1}% | {} | {} |",
        metrics.volatility_score, metrics.volatility_trend, metrics.volatility_status
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Predictions");

    if matched.is_empty() {
        let _ = writeln!(output, "No predictions recorded for this company.");
    } else {
        for record in matched.iter().rev().take(5) {
            let when = record
                .timestamp
                .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "unknown time".to_string());
            let fdi = record
                .score
                .map(|s| format!("{:.1}%", s * 100.0))
                .unwrap_or_else(|| "N/A".to_string());
            let _ = writeln!(
                output,
                "- {}: FDI {} ({})",
                when,
                fdi,
                record.risk_label.as_deref().unwrap_or("Unknown")
            );
        }
    }

    output
}

fn percent_or_na(value: Option<f64>) -> String {
    match value {
        Some(v) if v != 0.0 && v.is_finite() => format!("{:.2}", v * 100.0),
        _ => "N/A".to_string(),
    }
}

/// Writes history rows in the dashboard's CSV export layout. Records without
/// a company are attributed to `company`.
pub fn export_history_csv<W: std::io::Write>(
    writer: W,
    records: &[&PredictionRecord],
    company: &str,
) -> anyhow::Result<usize> {
    let mut csv = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);
    csv.write_record([
        "Timestamp",
        "Company",
        "Ticker",
        "FDI Score",
        "Risk Label",
        "Confidence",
    ])?;

    for record in records {
        let company = if record.entity_name.is_empty() {
            company
        } else {
            record.entity_name.as_str()
        };
        csv.write_record([
            record.timestamp.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
            company.to_string(),
            record.entity_ticker.clone(),
            percent_or_na(record.score),
            record
                .risk_label
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            percent_or_na(record.confidence),
        ])?;
    }

    csv.flush()?;
    Ok(records.len())
}
