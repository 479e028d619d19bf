use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatusBucket {
    Stable,
    ModerateRisk,
    HighRisk,
}

impl StatusBucket {
    pub fn label(self) -> &'static str {
        match self {
            StatusBucket::Stable => "Stable",
            StatusBucket::ModerateRisk => "Moderate Risk",
            StatusBucket::HighRisk => "High Risk",
        }
    }
}

impl fmt::Display for StatusBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which threshold table a score is judged against. Scores are on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Sentiment,
    Volatility,
    Confidence,
}

/// Buckets a score. Missing or non-finite scores land in `ModerateRisk`.
pub fn classify(kind: MetricKind, score: Option<f64>) -> StatusBucket {
    let score = match score {
        Some(value) if value.is_finite() => value,
        _ => return StatusBucket::ModerateRisk,
    };

    match kind {
        MetricKind::Sentiment => higher_is_better(score, 70.0, 50.0),
        MetricKind::Confidence => higher_is_better(score, 80.0, 60.0),
        MetricKind::Volatility => {
            if score < 12.0 {
                StatusBucket::Stable
            } else if score < 20.0 {
                StatusBucket::ModerateRisk
            } else {
                StatusBucket::HighRisk
            }
        }
    }
}

fn higher_is_better(score: f64, stable_from: f64, moderate_from: f64) -> StatusBucket {
    if score >= stable_from {
        StatusBucket::Stable
    } else if score >= moderate_from {
        StatusBucket::ModerateRisk
    } else {
        StatusBucket::HighRisk
    }
}

/// Maps a raw service label onto a bucket. Labels are compared verbatim.
pub fn classify_risk_label(label: Option<&str>) -> Option<StatusBucket> {
    match label? {
        "" => None,
        "Healthy" => Some(StatusBucket::Stable),
        "Distressed" => Some(StatusBucket::HighRisk),
        _ => Some(StatusBucket::ModerateRisk),
    }
}
