//! Rolling sentiment, volatility and trend figures derived from prediction
//! history.
//!
//! Every function here expects its records oldest-first. Reversing a
//! newest-first feed is the caller's job (see `feed::HistoryOrder`).

use crate::matcher::{HistoryMatcher, NamePredicate, TickerLookup};
use crate::models::{CurrentPrediction, DerivedMetrics, PredictionRecord};
use crate::status::{classify, classify_risk_label, MetricKind};

pub const ROLLING_WINDOW: usize = 8;
pub const BASELINE_WINDOW: usize = 5;
pub const DEFAULT_SENTIMENT: i64 = 68;
pub const DEFAULT_VOLATILITY: f64 = 14.2;
pub const NEUTRAL_TREND: &str = "+0.0%";

const DEFAULT_SENTIMENT_RATIO: f64 = DEFAULT_SENTIMENT as f64 / 100.0;

fn rolling_window<'a, 'h>(source: &'a [&'h PredictionRecord]) -> &'a [&'h PredictionRecord] {
    &source[source.len().saturating_sub(ROLLING_WINDOW)..]
}

/// Average of confidence (or FDI) over the rolling window, as a percentage.
/// With no history the current prediction stands in, then the fixed default.
pub fn sentiment_score(source: &[&PredictionRecord], current: &CurrentPrediction) -> i64 {
    let window = rolling_window(source);
    if !window.is_empty() {
        let total: f64 = window
            .iter()
            .map(|record| record.confidence_or_score().unwrap_or(DEFAULT_SENTIMENT_RATIO))
            .sum();
        return round_percent(total / window.len() as f64);
    }

    percent_of(current).unwrap_or(DEFAULT_SENTIMENT)
}

/// Latest vs previous confidence (or FDI), in percentage points.
pub fn sentiment_trend(source: &[&PredictionRecord]) -> String {
    let [.., previous, latest] = source else {
        return NEUTRAL_TREND.to_string();
    };
    let value = |record: &PredictionRecord| record.confidence_or_score().unwrap_or(0.0) * 100.0;
    format_delta(value(*latest) - value(*previous), "%")
}

/// Population standard deviation of FDI over the rolling window, x100,
/// rounded to one decimal.
pub fn volatility_score(source: &[&PredictionRecord]) -> f64 {
    if source.len() < 2 {
        return DEFAULT_VOLATILITY;
    }

    let scores: Vec<f64> = rolling_window(source)
        .iter()
        .map(|record| record.score.unwrap_or(0.0))
        .collect();
    let count = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / count;
    let variance = scores.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count;

    round_one_decimal(variance.sqrt() * 100.0)
}

/// Latest FDI against the mean of up to five records before it.
pub fn volatility_trend(source: &[&PredictionRecord]) -> String {
    let Some((latest, earlier)) = source.split_last() else {
        return NEUTRAL_TREND.to_string();
    };
    if earlier.is_empty() {
        return NEUTRAL_TREND.to_string();
    }

    let value = |record: &PredictionRecord| record.score.unwrap_or(0.0) * 100.0;
    let latest = value(*latest);
    let baseline_window = &earlier[earlier.len().saturating_sub(BASELINE_WINDOW)..];
    let baseline = baseline_window.iter().map(|r| value(*r)).sum::<f64>()
        / baseline_window.len() as f64;

    format_delta(latest - baseline, "%")
}

/// FDI change between the two latest matched records, in points. Only
/// meaningful for the selected entity's own history, never the fallback.
pub fn fdi_trend(matched: &[&PredictionRecord]) -> Option<String> {
    let [.., previous, latest] = matched else {
        return None;
    };
    let delta = (latest.score? - previous.score?) * 100.0;
    Some(format_delta(delta, " pts"))
}

/// Signed one-decimal delta; zero and positive values carry an explicit `+`.
/// Non-finite deltas render as zero.
pub fn format_delta(delta: f64, suffix: &str) -> String {
    // -0.0 would otherwise print as "+-0.0"
    let delta = if delta.is_finite() && delta != 0.0 { delta } else { 0.0 };
    let prefix = if delta >= 0.0 { "+" } else { "" };
    format!("{prefix}{delta:.1}{suffix}")
}

/// Round half up, the way the dashboard rounds percentages.
fn round_percent(ratio: f64) -> i64 {
    (ratio * 100.0 + 0.5).floor() as i64
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// The headline prediction: latest matched record, else the latest record
/// overall.
pub fn current_from_history(
    matched: &[&PredictionRecord],
    history: &[PredictionRecord],
) -> CurrentPrediction {
    matched
        .last()
        .copied()
        .or(history.last())
        .map(CurrentPrediction::from)
        .unwrap_or_default()
}

/// Confidence as a percentage, else FDI. Each field is skipped when non-finite.
pub fn percent_of(current: &CurrentPrediction) -> Option<i64> {
    let finite = |value: Option<f64>| value.filter(|v| v.is_finite());
    finite(current.confidence)
        .or(finite(current.fdi))
        .map(round_percent)
}

/// Everything the dashboard cards show for `selected`.
///
/// `current` overrides the headline prediction picked from history, e.g. with
/// a fresh `/predict` response.
pub fn derive_metrics<P: NamePredicate>(
    matcher: &HistoryMatcher<P>,
    history: &[PredictionRecord],
    selected: &str,
    tickers: &impl TickerLookup,
    current: Option<&CurrentPrediction>,
) -> DerivedMetrics {
    let matched = matcher.matches(history, selected, tickers);
    let used_fallback = matched.is_empty();
    let source: Vec<&PredictionRecord> = if used_fallback {
        if !history.is_empty() {
            tracing::debug!(
                entity = selected,
                records = history.len(),
                "no matching history; falling back to full history"
            );
        }
        history.iter().collect()
    } else {
        matched.clone()
    };

    let current = match current {
        Some(explicit) if !explicit.is_empty() => explicit.clone(),
        _ => current_from_history(&matched, history),
    };

    let sentiment_score = sentiment_score(&source, &current);
    let volatility_score = volatility_score(&source);
    let confidence_percent = percent_of(&current);

    DerivedMetrics {
        entity: selected.to_string(),
        matched_count: matched.len(),
        used_fallback,
        fdi_percent: current.fdi.filter(|v| v.is_finite()).map(round_percent),
        fdi_trend: fdi_trend(&matched),
        risk_status: classify_risk_label(current.risk_label.as_deref()),
        risk_label: current.risk_label,
        sentiment_score,
        sentiment_trend: sentiment_trend(&source),
        sentiment_status: classify(MetricKind::Sentiment, Some(sentiment_score as f64)),
        confidence_percent,
        confidence_status: classify(MetricKind::Confidence, confidence_percent.map(|p| p as f64)),
        volatility_score,
        volatility_trend: volatility_trend(&source),
        volatility_status: classify(MetricKind::Volatility, Some(volatility_score)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{NoTickers, TickerTable};
    use crate::status::StatusBucket;

    fn scored(name: &str, ticker: &str, score: f64) -> PredictionRecord {
        PredictionRecord {
            score: Some(score),
            entity_name: name.to_string(),
            entity_ticker: ticker.to_string(),
            ..Default::default()
        }
    }

    fn refs(records: &[PredictionRecord]) -> Vec<&PredictionRecord> {
        records.iter().collect()
    }

    fn is_trend(value: &str, suffix: &str) -> bool {
        let Some(body) = value.strip_suffix(suffix) else {
            return false;
        };
        let Some(body) = body.strip_prefix('+').or_else(|| body.strip_prefix('-')) else {
            return false;
        };
        let Some((whole, frac)) = body.split_once('.') else {
            return false;
        };
        !whole.is_empty()
            && whole.chars().all(|c| c.is_ascii_digit())
            && frac.len() == 1
            && frac.chars().all(|c| c.is_ascii_digit())
    }

    #[test]
    fn empty_history_uses_defaults() {
        let metrics = derive_metrics(
            &HistoryMatcher::new(),
            &[],
            "Apple Inc.",
            &TickerTable::dashboard(),
            None,
        );
        assert_eq!(metrics.sentiment_score, 68);
        assert_eq!(metrics.volatility_score, 14.2);
        assert_eq!(metrics.sentiment_trend, "+0.0%");
        assert_eq!(metrics.volatility_trend, "+0.0%");
        assert_eq!(metrics.fdi_trend, None);
        assert_eq!(metrics.confidence_percent, None);
        assert_eq!(metrics.confidence_status, StatusBucket::ModerateRisk);
        assert_eq!(metrics.risk_status, None);
    }

    #[test]
    fn fdi_trend_for_ticker_matched_records() {
        let history = vec![scored("", "AAPL", 0.30), scored("", "AAPL", 0.50)];
        let metrics = derive_metrics(
            &HistoryMatcher::new(),
            &history,
            "Apple Inc.",
            &TickerTable::dashboard(),
            None,
        );
        assert_eq!(metrics.matched_count, 2);
        assert_eq!(metrics.fdi_trend.as_deref(), Some("+20.0 pts"));
    }

    #[test]
    fn volatility_is_population_stdev() {
        let history = vec![
            scored("Apple", "", 0.1),
            scored("Apple", "", 0.9),
            scored("Apple", "", 0.1),
        ];
        assert_eq!(volatility_score(&refs(&history)), 37.7);
    }

    #[test]
    fn volatility_uses_last_eight_scores() {
        let mut history: Vec<_> = (0..4).map(|_| scored("", "", 0.9)).collect();
        history.extend((0..8).map(|_| scored("", "", 0.5)));
        assert_eq!(volatility_score(&refs(&history)), 0.0);
    }

    #[test]
    fn single_record_keeps_default_volatility() {
        let history = vec![scored("", "", 0.9)];
        assert_eq!(volatility_score(&refs(&history)), DEFAULT_VOLATILITY);
        assert_eq!(volatility_trend(&refs(&history)), NEUTRAL_TREND);
        assert_eq!(sentiment_trend(&refs(&history)), NEUTRAL_TREND);
    }

    #[test]
    fn sentiment_prefers_confidence_over_score() {
        let history = vec![
            PredictionRecord {
                score: Some(0.2),
                confidence: Some(0.9),
                ..Default::default()
            },
            PredictionRecord {
                score: Some(0.6),
                ..Default::default()
            },
            PredictionRecord::default(),
        ];
        // (0.9 + 0.6 + 0.68) / 3 = 0.7267
        assert_eq!(sentiment_score(&refs(&history), &CurrentPrediction::default()), 73);
    }

    #[test]
    fn sentiment_without_history_uses_current_prediction() {
        let current = CurrentPrediction {
            fdi: Some(0.31),
            risk_label: None,
            confidence: None,
        };
        assert_eq!(sentiment_score(&[], &current), 31);
        let current = CurrentPrediction {
            confidence: Some(0.846),
            ..current
        };
        assert_eq!(sentiment_score(&[], &current), 85);
    }

    #[test]
    fn sentiment_uses_last_eight_records() {
        let mut history: Vec<_> = (0..4)
            .map(|_| PredictionRecord {
                confidence: Some(1.0),
                ..Default::default()
            })
            .collect();
        history.extend((0..8).map(|_| PredictionRecord {
            confidence: Some(0.5),
            ..Default::default()
        }));
        assert_eq!(sentiment_score(&refs(&history), &CurrentPrediction::default()), 50);
    }

    #[test]
    fn non_finite_confidence_falls_through_to_fdi() {
        let current = CurrentPrediction {
            fdi: Some(0.4),
            risk_label: None,
            confidence: Some(f64::NAN),
        };
        assert_eq!(percent_of(&current), Some(40));
        assert_eq!(sentiment_score(&[], &current), 40);

        let current = CurrentPrediction {
            fdi: Some(f64::INFINITY),
            ..current
        };
        assert_eq!(percent_of(&current), None);
        assert_eq!(sentiment_score(&[], &current), DEFAULT_SENTIMENT);
    }

    #[test]
    fn sentiment_trend_compares_last_two() {
        let history = vec![
            PredictionRecord {
                confidence: Some(0.75),
                ..Default::default()
            },
            PredictionRecord {
                score: Some(0.5),
                ..Default::default()
            },
        ];
        assert_eq!(sentiment_trend(&refs(&history)), "-25.0%");
    }

    #[test]
    fn volatility_trend_against_trailing_baseline() {
        let history: Vec<_> = [0.9, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6]
            .into_iter()
            .map(|s| scored("", "", s))
            .collect();
        // baseline = mean(10..50) = 30; latest = 60
        assert_eq!(volatility_trend(&refs(&history)), "+30.0%");
    }

    #[test]
    fn flat_history_trends_are_positive_zero() {
        let history = vec![scored("", "", 0.3), scored("", "", 0.3)];
        assert_eq!(volatility_trend(&refs(&history)), "+0.0%");
        assert_eq!(sentiment_trend(&refs(&history)), "+0.0%");
        assert_eq!(fdi_trend(&refs(&history)).as_deref(), Some("+0.0 pts"));
    }

    #[test]
    fn fdi_trend_needs_both_scores() {
        let history = vec![PredictionRecord::default(), scored("", "", 0.3)];
        assert_eq!(fdi_trend(&refs(&history)), None);
        assert_eq!(fdi_trend(&refs(&history[1..])), None);
    }

    #[test]
    fn unmatched_entity_falls_back_for_aggregates_only() {
        let history = vec![scored("Tesla Inc.", "TSLA", 0.2), scored("Tesla Inc.", "TSLA", 0.6)];
        let metrics = derive_metrics(&HistoryMatcher::new(), &history, "Netflix Inc.", &NoTickers, None);
        assert!(metrics.used_fallback);
        assert_eq!(metrics.matched_count, 0);
        assert_eq!(metrics.volatility_score, 20.0);
        assert_eq!(metrics.sentiment_trend, "+40.0%");
        assert_eq!(metrics.fdi_trend, None);
        assert_eq!(metrics.fdi_percent, Some(60));
    }

    #[test]
    fn explicit_current_prediction_drives_confidence_status() {
        let current = CurrentPrediction {
            fdi: Some(0.20),
            risk_label: Some("Healthy".to_string()),
            confidence: Some(0.85),
        };
        let metrics = derive_metrics(
            &HistoryMatcher::new(),
            &[],
            "Apple Inc.",
            &TickerTable::dashboard(),
            Some(&current),
        );
        assert_eq!(metrics.confidence_percent, Some(85));
        assert_eq!(metrics.confidence_status, StatusBucket::Stable);
        assert_eq!(metrics.risk_status, Some(StatusBucket::Stable));
        assert_eq!(metrics.fdi_percent, Some(20));
        assert_eq!(metrics.sentiment_score, 85);
    }

    #[test]
    fn headline_prediction_comes_from_latest_match() {
        let mut distressed = scored("Apple Inc.", "AAPL", 0.8);
        distressed.risk_label = Some("Distressed".to_string());
        let history = vec![distressed, scored("Tesla Inc.", "TSLA", 0.1)];
        let metrics = derive_metrics(
            &HistoryMatcher::new(),
            &history,
            "Apple Inc.",
            &TickerTable::dashboard(),
            None,
        );
        assert_eq!(metrics.risk_status, Some(StatusBucket::HighRisk));
        assert_eq!(metrics.fdi_percent, Some(80));
    }

    #[test]
    fn derivation_is_deterministic_and_well_formed() {
        let history: Vec<_> = [0.12, 0.57, 0.33, 0.91, 0.05, 0.44, 0.68, 0.29, 0.73, 0.5]
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let ticker = if i % 2 == 0 { "MSFT" } else { "NFLX" };
                scored("", ticker, s)
            })
            .collect();
        let tickers = TickerTable::dashboard();
        let matcher = HistoryMatcher::new();
        for entity in ["Microsoft Corp.", "Netflix Inc.", "Unknown"] {
            let first = derive_metrics(&matcher, &history, entity, &tickers, None);
            let second = derive_metrics(&matcher, &history, entity, &tickers, None);
            assert_eq!(first, second);
            assert!(first.volatility_score >= 0.0);
            assert!(is_trend(&first.sentiment_trend, "%"), "{}", first.sentiment_trend);
            assert!(is_trend(&first.volatility_trend, "%"), "{}", first.volatility_trend);
            if let Some(trend) = &first.fdi_trend {
                assert!(is_trend(trend, " pts"), "{trend}");
            }
        }
    }

    #[test]
    fn delta_formatting() {
        assert_eq!(format_delta(0.0, "%"), "+0.0%");
        assert_eq!(format_delta(-0.0, "%"), "+0.0%");
        assert_eq!(format_delta(-3.26, "%"), "-3.3%");
        assert_eq!(format_delta(f64::NAN, " pts"), "+0.0 pts");
        assert_eq!(format_delta(12.0, " pts"), "+12.0 pts");
    }
}
