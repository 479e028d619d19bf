use std::collections::BTreeMap;

use crate::models::PredictionRecord;

/// Resolves a display name to a ticker symbol.
pub trait TickerLookup {
    fn ticker_of(&self, name: &str) -> Option<&str>;
}

impl<L: TickerLookup + ?Sized> TickerLookup for &L {
    fn ticker_of(&self, name: &str) -> Option<&str> {
        (**self).ticker_of(name)
    }
}

/// No ticker for anything; matching falls back to names only.
pub struct NoTickers;

impl TickerLookup for NoTickers {
    fn ticker_of(&self, _name: &str) -> Option<&str> {
        None
    }
}

/// Immutable name to ticker table. Lookups are exact on the display name.
#[derive(Debug, Clone, Default)]
pub struct TickerTable {
    by_name: BTreeMap<String, String>,
}

impl TickerTable {
    pub fn new<I, N, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            by_name: entries
                .into_iter()
                .map(|(name, ticker)| (name.into(), ticker.into()))
                .collect(),
        }
    }

    /// The companies tracked by the dashboard.
    pub fn dashboard() -> Self {
        Self::new([
            ("Apple Inc.", "AAPL"),
            ("Microsoft Corp.", "MSFT"),
            ("NVIDIA Corp.", "NVDA"),
            ("Meta Platforms", "META"),
            ("Amazon.com Inc.", "AMZN"),
            ("Tesla Inc.", "TSLA"),
            ("Google (Alphabet)", "GOOGL"),
            ("Netflix Inc.", "NFLX"),
        ])
    }

    pub fn with_entry(mut self, name: impl Into<String>, ticker: impl Into<String>) -> Self {
        self.by_name.insert(name.into(), ticker.into());
        self
    }

    /// Reverse lookup, case-insensitive on the ticker.
    pub fn company_of(&self, ticker: &str) -> Option<&str> {
        self.by_name
            .iter()
            .find(|(_, t)| t.eq_ignore_ascii_case(ticker))
            .map(|(name, _)| name.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

impl TickerLookup for TickerTable {
    fn ticker_of(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }
}

/// Decides whether a record's entity name refers to the selected entity.
/// Both arguments arrive lower-cased and the record name is non-empty.
pub trait NamePredicate {
    fn names_match(&self, record_name: &str, selected: &str) -> bool;
}

/// Either name contained in the other. Tolerates truncated and expanded
/// display names, at the price of false positives such as "meta" inside
/// "metacompany".
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringContainment;

impl NamePredicate for SubstringContainment {
    fn names_match(&self, record_name: &str, selected: &str) -> bool {
        record_name.contains(selected) || selected.contains(record_name)
    }
}

impl<F> NamePredicate for F
where
    F: Fn(&str, &str) -> bool,
{
    fn names_match(&self, record_name: &str, selected: &str) -> bool {
        self(record_name, selected)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryMatcher<P = SubstringContainment> {
    predicate: P,
}

impl HistoryMatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: NamePredicate> HistoryMatcher<P> {
    pub fn with_predicate(predicate: P) -> Self {
        Self { predicate }
    }

    /// Records of `history` that belong to `selected`, in their original order.
    ///
    /// A record matches on a non-empty entity name accepted by the name
    /// predicate, or on an exact (case-insensitive) ticker equal to the
    /// selected entity's ticker. An empty `selected` only matches by ticker.
    pub fn matches<'h>(
        &self,
        history: &'h [PredictionRecord],
        selected: &str,
        tickers: &impl TickerLookup,
    ) -> Vec<&'h PredictionRecord> {
        let target_ticker = tickers
            .ticker_of(selected)
            .map(str::to_lowercase)
            .unwrap_or_default();
        let selected = selected.to_lowercase();

        history
            .iter()
            .filter(|record| self.is_match(record, &selected, &target_ticker))
            .collect()
    }

    fn is_match(&self, record: &PredictionRecord, selected: &str, target_ticker: &str) -> bool {
        let name = record.entity_name.to_lowercase();
        let name_match = !name.is_empty()
            && !selected.is_empty()
            && self.predicate.names_match(&name, selected);
        let ticker_match =
            !target_ticker.is_empty() && record.entity_ticker.to_lowercase() == target_ticker;
        name_match || ticker_match
    }
}

/// [`HistoryMatcher`] with the default name predicate.
pub fn match_history<'h>(
    history: &'h [PredictionRecord],
    selected: &str,
    tickers: &impl TickerLookup,
) -> Vec<&'h PredictionRecord> {
    HistoryMatcher::new().matches(history, selected, tickers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, ticker: &str, score: f64) -> PredictionRecord {
        PredictionRecord {
            score: Some(score),
            entity_name: name.to_string(),
            entity_ticker: ticker.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn matches_truncated_and_expanded_names() {
        let history = vec![
            record("Apple", "", 0.1),
            record("Apple Inc. (Cupertino)", "", 0.2),
            record("Microsoft", "", 0.3),
        ];
        let matched = match_history(&history, "Apple Inc.", &NoTickers);
        let scores: Vec<_> = matched.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![Some(0.1), Some(0.2)]);
    }

    #[test]
    fn ticker_match_wins_over_name_mismatch() {
        let history = vec![record("Something Else", "aapl", 0.3), record("", "MSFT", 0.4)];
        let matched = match_history(&history, "Apple Inc.", &TickerTable::dashboard());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].score, Some(0.3));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let history = vec![record("APPLE INC.", "", 0.5)];
        assert_eq!(match_history(&history, "apple inc.", &NoTickers).len(), 1);
    }

    #[test]
    fn empty_names_only_match_by_ticker() {
        let history = vec![record("", "", 0.1), record("", "NVDA", 0.2)];
        let matched = match_history(&history, "NVIDIA Corp.", &TickerTable::dashboard());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].entity_ticker, "NVDA");

        assert!(match_history(&history, "", &TickerTable::dashboard()).is_empty());
    }

    #[test]
    fn empty_selection_still_matches_by_ticker() {
        let history = vec![record("Apple Inc.", "", 0.1), record("", "AAPL", 0.2)];
        let tickers = TickerTable::new([("", "AAPL")]);
        let matched = match_history(&history, "", &tickers);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].score, Some(0.2));
    }

    #[test]
    fn missing_ticker_does_not_match_empty_record_tickers() {
        let history = vec![record("", "", 0.1)];
        assert!(match_history(&history, "Unknown Co", &TickerTable::dashboard()).is_empty());
    }

    #[test]
    fn result_is_an_ordered_subsequence() {
        let history = vec![
            record("Tesla", "TSLA", 0.1),
            record("Meta", "META", 0.2),
            record("Tesla Inc.", "", 0.3),
            record("", "tsla", 0.4),
        ];
        let matched = match_history(&history, "Tesla Inc.", &TickerTable::dashboard());
        let positions: Vec<_> = matched
            .iter()
            .map(|m| history.iter().position(|h| std::ptr::eq(h, *m)).unwrap())
            .collect();
        assert_eq!(positions, vec![0, 2, 3]);
    }

    #[test]
    fn stricter_predicate_can_be_substituted() {
        let history = vec![record("Metacompany", "", 0.1), record("Meta Platforms", "", 0.2)];
        assert_eq!(match_history(&history, "Meta Platforms", &NoTickers).len(), 1);
        assert_eq!(match_history(&history, "meta", &NoTickers).len(), 2);

        let exact = HistoryMatcher::with_predicate(|name: &str, selected: &str| name == selected);
        let matched = exact.matches(&history, "meta", &NoTickers);
        assert!(matched.is_empty());
    }

    #[test]
    fn ticker_table_reverse_lookup() {
        let table = TickerTable::dashboard().with_entry("Intel Corp.", "INTC");
        assert_eq!(table.company_of("googl"), Some("Google (Alphabet)"));
        assert_eq!(table.ticker_of("Intel Corp."), Some("INTC"));
        assert_eq!(table.company_of("IBM"), None);
        assert_eq!(table.names().count(), 9);
    }
}
