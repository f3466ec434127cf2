use serde::{Deserialize, Serialize};

/// A recorded point-in-time portfolio total.
///
/// Snapshots are append-only. `change_from_previous` is computed once, at
/// save time, against the snapshot that was last in the history then; it is
/// never recalculated afterwards, not even when earlier snapshots are deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Epoch milliseconds
    pub timestamp: i64,

    /// RFC 3339 rendering of `timestamp`
    #[serde(default)]
    pub date: String,

    /// Combined value of all priced assets
    pub total_value: f64,

    pub change_from_previous: f64,

    /// Percent change vs the previous snapshot, 0 when there is no positive baseline
    pub change_percent_from_previous: f64,

    #[serde(default)]
    pub assets_up: usize,

    #[serde(default)]
    pub assets_down: usize,

    #[serde(default)]
    pub assets_unchanged: usize,

    #[serde(default)]
    pub total_assets: usize,
}

/// Non-fatal condition raised while preparing a snapshot: some assets have no
/// price and would be left out of the total. The caller decides whether to continue.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingPriceWarning {
    /// Number of assets without a usable price
    pub assets_missing_price: usize,

    /// Total that would be recorded without them
    pub total_value: f64,
}

impl std::fmt::Display for MissingPriceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} asset(s) don't have price data and will be excluded (combined total: {:.2})",
            self.assets_missing_price, self.total_value
        )
    }
}

/// Stats derived from the whole snapshot history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub snapshot_count: usize,

    /// The most recent snapshot
    pub current: Snapshot,

    /// The oldest snapshot
    pub first: Snapshot,

    /// `current.total_value - first.total_value`
    pub total_change: f64,

    /// Percent of `first.total_value`, 0 when the first total is not positive
    pub total_change_percent: f64,

    /// Largest `change_percent_from_previous`, excluding the first snapshot
    pub best_day: Option<Snapshot>,

    /// Smallest `change_percent_from_previous`, excluding the first snapshot
    pub worst_day: Option<Snapshot>,
}

/// A single point of the portfolio value series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub timestamp: i64,
    pub value: f64,
}
