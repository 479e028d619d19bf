use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::fields::record_from_value;
use crate::models::PredictionRecord;

/// Order in which a feed lists its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Decodes a `/history` document (`{"history": [...]}` or a bare array) into
/// oldest-first records. Entries that are not objects are skipped.
pub fn parse_history(document: &Value, order: HistoryOrder) -> anyhow::Result<Vec<PredictionRecord>> {
    let entries = match document {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("history")
            .and_then(Value::as_array)
            .context("history document has no `history` array")?,
        _ => anyhow::bail!("history document must be an object or an array"),
    };

    let mut records: Vec<PredictionRecord> = entries
        .iter()
        .filter(|entry| entry.is_object())
        .map(record_from_value)
        .collect();

    let skipped = entries.len() - records.len();
    if skipped > 0 {
        tracing::warn!(skipped, "ignored non-object history entries");
    }

    if order == HistoryOrder::NewestFirst {
        records.reverse();
    }

    Ok(records)
}

pub fn load_history(path: &Path, order: HistoryOrder) -> anyhow::Result<Vec<PredictionRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history file {}", path.display()))?;
    let document: Value = serde_json::from_str(&raw)
        .with_context(|| format!("history file {} is not valid JSON", path.display()))?;
    let records = parse_history(&document, order)?;
    tracing::info!(path = %path.display(), records = records.len(), "loaded history feed");
    Ok(records)
}
