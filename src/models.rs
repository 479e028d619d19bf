use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::StatusBucket;

/// One entry of the prediction service's append-only history.
///
/// `entity_name` and `entity_ticker` are empty strings when the service did
/// not record them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub risk_label: Option<String>,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub entity_ticker: String,
}

impl PredictionRecord {
    /// Confidence when present, otherwise the FDI score.
    pub fn confidence_or_score(&self) -> Option<f64> {
        self.confidence.or(self.score)
    }
}

/// The values shown on the headline cards before any history is derived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentPrediction {
    pub fdi: Option<f64>,
    pub risk_label: Option<String>,
    pub confidence: Option<f64>,
}

impl CurrentPrediction {
    pub fn is_empty(&self) -> bool {
        self.fdi.is_none() && self.risk_label.is_none() && self.confidence.is_none()
    }
}

impl From<&PredictionRecord> for CurrentPrediction {
    fn from(record: &PredictionRecord) -> Self {
        Self {
            fdi: record.score,
            risk_label: record.risk_label.clone(),
            confidence: record.confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub entity: String,
    pub matched_count: usize,
    pub used_fallback: bool,

    pub fdi_percent: Option<i64>,
    pub fdi_trend: Option<String>,
    pub risk_label: Option<String>,
    pub risk_status: Option<StatusBucket>,

    pub sentiment_score: i64,
    pub sentiment_trend: String,
    pub sentiment_status: StatusBucket,

    pub confidence_percent: Option<i64>,
    pub confidence_status: StatusBucket,

    pub volatility_score: f64,
    pub volatility_trend: String,
    pub volatility_status: StatusBucket,
}
