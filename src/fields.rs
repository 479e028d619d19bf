//! Field lookup over prediction service JSON.
//!
//! The service names the same concept differently depending on the endpoint
//! and version, so every concept has a fixed alias list tried in order.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::models::{CurrentPrediction, PredictionRecord};

pub const FDI_ALIASES: &[&str] = &["fdi_score", "fdi", "score", "prediction", "value"];
pub const RISK_LABEL_ALIASES: &[&str] = &["risk_label", "label", "risk", "prediction_label"];
pub const CONFIDENCE_ALIASES: &[&str] = &["confidence", "model_confidence", "probability", "prob"];
pub const TIMESTAMP_ALIASES: &[&str] = &["ts", "timestamp", "created_at"];
pub const ENTITY_NAME_ALIASES: &[&str] = &["company", "company_name", "name"];
pub const ENTITY_TICKER_ALIASES: &[&str] = &["ticker", "symbol"];

/// First alias present on `obj` with a non-null value.
pub fn pick_first<'a>(obj: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    let map = obj.as_object()?;
    aliases
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

pub fn pick_f64(obj: &Value, aliases: &[&str]) -> Option<f64> {
    match pick_first(obj, aliases)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

pub fn pick_str(obj: &Value, aliases: &[&str]) -> Option<String> {
    match pick_first(obj, aliases)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn pick_timestamp(obj: &Value, aliases: &[&str]) -> Option<DateTime<Utc>> {
    parse_timestamp(pick_first(obj, aliases)?.as_str()?)
}

/// RFC 3339, or a naive ISO-8601 timestamp read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Decodes one `/history` entry. Entity identifiers are looked up in
/// `payload` first, then on the entry itself.
pub fn record_from_value(entry: &Value) -> PredictionRecord {
    let payload = entry.get("payload").filter(|p| p.is_object());
    let entity = |aliases: &[&str]| {
        payload
            .and_then(|p| pick_str(p, aliases))
            .or_else(|| pick_str(entry, aliases))
            .unwrap_or_default()
    };

    PredictionRecord {
        timestamp: pick_timestamp(entry, TIMESTAMP_ALIASES),
        score: pick_f64(entry, FDI_ALIASES),
        risk_label: pick_str(entry, RISK_LABEL_ALIASES),
        confidence: pick_f64(entry, CONFIDENCE_ALIASES),
        entity_name: entity(ENTITY_NAME_ALIASES),
        entity_ticker: entity(ENTITY_TICKER_ALIASES),
    }
}

/// Decodes a `/predict` response body.
pub fn prediction_from_value(body: &Value) -> CurrentPrediction {
    CurrentPrediction {
        fdi: pick_f64(body, FDI_ALIASES),
        risk_label: pick_str(body, RISK_LABEL_ALIASES),
        confidence: pick_f64(body, CONFIDENCE_ALIASES),
    }
}
