use chrono::{DateTime, SecondsFormat};
use log::{debug, info};

use crate::errors::CoreError;
use crate::models::asset::Asset;
use crate::models::price::PriceCache;
use crate::models::snapshot::{HistoryPoint, HistorySummary, MissingPriceWarning, Snapshot};
use crate::models::valuation::{percent_of, Direction};
use crate::services::valuation_service::ValuationService;

/// A snapshot computed from the current state but not yet appended to the history.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSnapshot {
    pub snapshot: Snapshot,

    /// Assets left out of `total_value` because no price is known for them
    pub assets_missing_price: usize,
}

impl PendingSnapshot {
    /// The confirmation the caller needs before committing, if any.
    pub fn warning(&self) -> Option<MissingPriceWarning> {
        (self.assets_missing_price > 0).then(|| MissingPriceWarning {
            assets_missing_price: self.assets_missing_price,
            total_value: self.snapshot.total_value,
        })
    }

    /// Append to the end of `history` and return the stored snapshot.
    pub fn commit(self, history: &mut Vec<Snapshot>) -> Snapshot {
        info!(
            "Snapshot saved: total {:.2}, change {:+.2} ({:+.2}%)",
            self.snapshot.total_value,
            self.snapshot.change_from_previous,
            self.snapshot.change_percent_from_previous
        );
        history.push(self.snapshot.clone());
        self.snapshot
    }
}

/// Records and summarizes the append-only snapshot history.
///
/// Each snapshot's delta is fixed at save time against the snapshot that was
/// last in the history then. Deleting snapshots never recomputes the deltas
/// of the remaining ones.
pub struct SnapshotService {
    valuation: ValuationService,
}

impl SnapshotService {
    pub fn new() -> Self {
        Self {
            valuation: ValuationService::new(),
        }
    }

    /// Compute the next snapshot without touching the history.
    ///
    /// Fails with `ValidationError` for an empty ledger and with `NoPriceData`
    /// when the price cache is empty. Assets without a price are excluded from
    /// the total and counted in `assets_missing_price`.
    pub fn prepare(
        &self,
        assets: &[Asset],
        cache: &PriceCache,
        history: &[Snapshot],
        now_ms: i64,
    ) -> Result<PendingSnapshot, CoreError> {
        if assets.is_empty() {
            return Err(CoreError::ValidationError(
                "No assets to snapshot. Add some assets first".into(),
            ));
        }
        if cache.is_empty() {
            return Err(CoreError::NoPriceData);
        }

        let mut total_value = 0.0;
        let mut assets_missing_price = 0;
        let (mut assets_up, mut assets_down, mut assets_unchanged) = (0, 0, 0);

        for asset in assets {
            let valuation = self.valuation.value_of(asset, cache);
            if valuation.price > 0.0 {
                total_value += valuation.combined;
            } else {
                assets_missing_price += 1;
            }

            match self.valuation.change_of(cache, &asset.price_key()).direction {
                Direction::Up => assets_up += 1,
                Direction::Down => assets_down += 1,
                Direction::Flat => assets_unchanged += 1,
            }
        }

        let previous_value = history.last().map_or(total_value, |s| s.total_value);
        let change_from_previous = total_value - previous_value;
        let change_percent_from_previous = if previous_value > 0.0 {
            change_from_previous / previous_value * 100.0
        } else {
            0.0
        };

        if assets_missing_price > 0 {
            debug!("{assets_missing_price} asset(s) without price excluded from snapshot");
        }

        Ok(PendingSnapshot {
            snapshot: Snapshot {
                timestamp: now_ms,
                date: format_timestamp(now_ms),
                total_value,
                change_from_previous,
                change_percent_from_previous,
                assets_up,
                assets_down,
                assets_unchanged,
                total_assets: assets.len(),
            },
            assets_missing_price,
        })
    }

    /// Prepare and append a snapshot.
    ///
    /// When some assets lack a price, `confirm` is asked whether to proceed
    /// without them; declining returns `Ok(None)` and leaves `history` unchanged.
    pub fn save<F>(
        &self,
        assets: &[Asset],
        cache: &PriceCache,
        history: &mut Vec<Snapshot>,
        now_ms: i64,
        confirm: F,
    ) -> Result<Option<Snapshot>, CoreError>
    where
        F: FnOnce(&MissingPriceWarning) -> bool,
    {
        let pending = self.prepare(assets, cache, history, now_ms)?;
        if let Some(warning) = pending.warning() {
            if !confirm(&warning) {
                debug!("Snapshot cancelled: {warning}");
                return Ok(None);
            }
        }
        Ok(Some(pending.commit(history)))
    }

    /// Stats over the full history, `None` when there are no snapshots.
    pub fn summarize(&self, history: &[Snapshot]) -> Option<HistorySummary> {
        let first = history.first()?;
        let current = history.last()?;

        let total_change = current.total_value - first.total_value;
        let total_change_percent = if first.total_value > 0.0 {
            percent_of(total_change, first.total_value)
        } else {
            0.0
        };

        // The first snapshot has no predecessor and is not a candidate.
        // Strict comparisons keep the first occurrence on ties.
        let mut best_day: Option<&Snapshot> = None;
        let mut worst_day: Option<&Snapshot> = None;
        for snapshot in history.iter().skip(1) {
            let change = snapshot.change_percent_from_previous;
            if best_day.map_or(true, |b| change > b.change_percent_from_previous) {
                best_day = Some(snapshot);
            }
            if worst_day.map_or(true, |w| change < w.change_percent_from_previous) {
                worst_day = Some(snapshot);
            }
        }

        Some(HistorySummary {
            snapshot_count: history.len(),
            current: current.clone(),
            first: first.clone(),
            total_change,
            total_change_percent,
            best_day: best_day.cloned(),
            worst_day: worst_day.cloned(),
        })
    }

    /// Remove the snapshot at `index`. Other snapshots keep their order and deltas.
    pub fn delete_at(
        &self,
        history: &mut Vec<Snapshot>,
        index: usize,
    ) -> Result<Snapshot, CoreError> {
        if index >= history.len() {
            return Err(CoreError::SnapshotNotFound(index));
        }
        Ok(history.remove(index))
    }

    /// Remove every snapshot. Returns how many were removed.
    pub fn clear(&self, history: &mut Vec<Snapshot>) -> usize {
        let removed = history.len();
        history.clear();
        removed
    }

    /// The value series for charting, oldest first.
    pub fn series(&self, history: &[Snapshot]) -> Vec<HistoryPoint> {
        history
            .iter()
            .map(|s| HistoryPoint {
                timestamp: s.timestamp,
                value: s.total_value,
            })
            .collect()
    }

    /// Snapshots newest first, each paired with its index in `history` (for deletion).
    pub fn newest_first<'a>(&self, history: &'a [Snapshot]) -> Vec<(usize, &'a Snapshot)> {
        history.iter().enumerate().rev().collect()
    }
}

impl Default for SnapshotService {
    fn default() -> Self {
        Self::new()
    }
}

fn format_timestamp(now_ms: i64) -> String {
    DateTime::from_timestamp_millis(now_ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}
