//! Derived risk metrics for the financial distress dashboard.
//!
//! The core (`matcher`, `metrics`, `status`) is a set of pure functions over
//! an oldest-first snapshot of prediction history. `feed` and `db` produce
//! such snapshots; `report` renders the results.

pub mod config;
pub mod db;
pub mod feed;
pub mod fields;
pub mod matcher;
pub mod metrics;
pub mod models;
pub mod report;
pub mod status;

pub use matcher::{HistoryMatcher, NamePredicate, SubstringContainment, TickerLookup, TickerTable};
pub use metrics::derive_metrics;
pub use models::{CurrentPrediction, DerivedMetrics, PredictionRecord};
pub use status::{classify, classify_risk_label, MetricKind, StatusBucket};
