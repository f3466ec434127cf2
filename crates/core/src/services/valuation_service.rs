use std::cmp::Ordering;

use crate::errors::CoreError;
use crate::models::asset::{Asset, AssetType};
use crate::models::price::{PriceCache, PriceKey};
use crate::models::valuation::{
    percent_of, AssetComparison, AssetFilter, AssetValuation, DayChange, PersonValue, Performer,
    SortColumn, SortState, TotalsReport,
};

/// Savings are valued 1:1, the quantity is the money amount.
pub const SAVINGS_PRICE: f64 = 1.0;

/// Minimum and maximum number of assets in a side-by-side comparison.
pub const COMPARE_MIN: usize = 2;
pub const COMPARE_MAX: usize = 3;

/// Computes values, totals and rankings from the ledger and the price cache.
///
/// Pure business logic. No I/O and nothing cached between calls.
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Price used to value `asset`: 1.0 for savings, the cached price otherwise, 0 when unknown.
    pub fn price_of(&self, asset: &Asset, cache: &PriceCache) -> f64 {
        if asset.asset_type == AssetType::Savings {
            return SAVINGS_PRICE;
        }
        cache.price(&asset.price_key()).unwrap_or(0.0)
    }

    /// Value one asset for both people at the current cached price.
    pub fn value_of(&self, asset: &Asset, cache: &PriceCache) -> AssetValuation {
        let price = self.price_of(asset, cache);
        let person_a = PersonValue {
            qty: asset.holdings.person_a.qty,
            value: asset.holdings.person_a.qty * price,
        };
        let person_b = PersonValue {
            qty: asset.holdings.person_b.qty,
            value: asset.holdings.person_b.qty * price,
        };
        AssetValuation {
            price,
            person_a,
            person_b,
            combined: person_a.value + person_b.value,
        }
    }

    /// Aggregate per-person, per-type and combined totals over the whole ledger.
    ///
    /// Assets of an unknown type still count towards the per-person totals but
    /// are left out of every type bucket.
    pub fn totals(&self, assets: &[Asset], cache: &PriceCache) -> TotalsReport {
        let mut totals = TotalsReport::default();

        for asset in assets {
            let valuation = self.value_of(asset, cache);

            totals.person_a.value += valuation.person_a.value;
            totals.person_b.value += valuation.person_b.value;
            totals.person_a.dividend += asset.holdings.person_a.dividend;
            totals.person_b.dividend += asset.holdings.person_b.dividend;

            totals.by_type.add(&asset.asset_type, valuation.combined);
            totals.person_a_by_type.add(&asset.asset_type, valuation.person_a.value);
            totals.person_b_by_type.add(&asset.asset_type, valuation.person_b.value);
        }

        totals.combined.value = totals.person_a.value + totals.person_b.value;
        totals.combined.dividend = totals.person_a.dividend + totals.person_b.dividend;
        totals
    }

    /// Day-change classification from the provider-reported change percent.
    pub fn change_of(&self, cache: &PriceCache, key: &PriceKey) -> DayChange {
        DayChange::from_percent(cache.change_percent(key))
    }

    /// Apply a type filter and a case-insensitive name/symbol search.
    pub fn filter<'a>(&self, assets: &'a [Asset], filter: &AssetFilter) -> Vec<&'a Asset> {
        let query = filter.search.trim().to_lowercase();
        assets
            .iter()
            .filter(|a| filter.asset_type.as_ref().map_or(true, |t| &a.asset_type == t))
            .filter(|a| {
                query.is_empty()
                    || a.name.to_lowercase().contains(&query)
                    || a.symbol.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Sort assets for display. Stable: equal keys keep their ledger order.
    ///
    /// `SortColumn::Price` ranks by day change percent rather than by price,
    /// so holdings can be ordered by today's performance.
    pub fn sort(&self, assets: &mut [&Asset], sort: &SortState, cache: &PriceCache) {
        let Some(column) = sort.column else {
            return;
        };

        assets.sort_by(|a, b| {
            let ordering = match column {
                SortColumn::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortColumn::Type => a.asset_type.as_str().cmp(b.asset_type.as_str()),
                SortColumn::Price => {
                    let change = |asset: &Asset| {
                        cache.change_percent(&asset.price_key()).unwrap_or(0.0)
                    };
                    cmp_f64(change(a), change(b))
                }
                SortColumn::Combined => cmp_f64(
                    self.value_of(a, cache).combined,
                    self.value_of(b, cache).combined,
                ),
            };
            if sort.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }

    /// Assets with a cached price and change percent, best day change first.
    pub fn performers(&self, assets: &[Asset], cache: &PriceCache) -> Vec<Performer> {
        let mut performers: Vec<Performer> = assets
            .iter()
            .filter_map(|asset| {
                let key = asset.price_key();
                let price = cache.price(&key).filter(|p| *p > 0.0)?;
                let change_percent = cache.change_percent(&key)?;
                let quantity = asset.holdings.total_qty();
                Some(Performer {
                    asset_id: asset.id.clone(),
                    name: asset.name.clone(),
                    symbol: asset.symbol.clone(),
                    asset_type: asset.asset_type.clone(),
                    price,
                    change_percent,
                    quantity,
                    value: quantity * price,
                })
            })
            .collect();

        performers.sort_by(|a, b| cmp_f64(b.change_percent, a.change_percent));
        performers
    }

    /// Up to `n` best performers, best first.
    pub fn top_performers(&self, assets: &[Asset], cache: &PriceCache, n: usize) -> Vec<Performer> {
        self.performers(assets, cache).into_iter().take(n).collect()
    }

    /// Up to `n` worst performers, worst first.
    pub fn bottom_performers(
        &self,
        assets: &[Asset],
        cache: &PriceCache,
        n: usize,
    ) -> Vec<Performer> {
        self.performers(assets, cache).into_iter().rev().take(n).collect()
    }

    /// The asset with the highest day change. First in ledger order wins ties.
    pub fn best_performer(&self, assets: &[Asset], cache: &PriceCache) -> Option<Performer> {
        self.extreme_performer(assets, cache, Ordering::Greater)
    }

    /// The asset with the lowest day change. First in ledger order wins ties.
    pub fn worst_performer(&self, assets: &[Asset], cache: &PriceCache) -> Option<Performer> {
        self.extreme_performer(assets, cache, Ordering::Less)
    }

    /// Side-by-side metrics for 2 to 3 assets, in the order the ids were given.
    pub fn compare(
        &self,
        assets: &[Asset],
        cache: &PriceCache,
        asset_ids: &[&str],
    ) -> Result<Vec<AssetComparison>, CoreError> {
        if !(COMPARE_MIN..=COMPARE_MAX).contains(&asset_ids.len()) {
            return Err(CoreError::ValidationError(format!(
                "Select between {COMPARE_MIN} and {COMPARE_MAX} assets to compare (got {})",
                asset_ids.len()
            )));
        }

        let total = self.totals(assets, cache).combined.value;

        asset_ids
            .iter()
            .map(|id| {
                let asset = assets
                    .iter()
                    .find(|a| a.id == *id)
                    .ok_or_else(|| CoreError::AssetNotFound((*id).to_string()))?;
                let key = asset.price_key();
                let price = self.price_of(asset, cache);
                let price_change_percent = cache
                    .previous_price(&key)
                    .filter(|previous| *previous > 0.0 && *previous != price)
                    .map(|previous| (price - previous) / previous * 100.0);
                let total_qty = asset.holdings.total_qty();
                let total_value = total_qty * price;

                Ok(AssetComparison {
                    asset_id: asset.id.clone(),
                    name: asset.name.clone(),
                    symbol: asset.symbol.clone(),
                    asset_type: asset.asset_type.clone(),
                    price,
                    price_change_percent,
                    total_qty,
                    person_a_qty: asset.holdings.person_a.qty,
                    person_b_qty: asset.holdings.person_b.qty,
                    total_value,
                    portfolio_percent: percent_of(total_value, total),
                })
            })
            .collect()
    }

    fn extreme_performer(
        &self,
        assets: &[Asset],
        cache: &PriceCache,
        wanted: Ordering,
    ) -> Option<Performer> {
        // Scan in ledger order; only a strictly better value replaces the current pick.
        let mut pick: Option<Performer> = None;
        for asset in assets {
            let key = asset.price_key();
            let Some(change_percent) = cache.change_percent(&key) else {
                continue;
            };
            let replace = pick
                .as_ref()
                .map_or(true, |p| cmp_f64(change_percent, p.change_percent) == wanted);
            if replace {
                let price = cache.price(&key).unwrap_or(0.0);
                let quantity = asset.holdings.total_qty();
                pick = Some(Performer {
                    asset_id: asset.id.clone(),
                    name: asset.name.clone(),
                    symbol: asset.symbol.clone(),
                    asset_type: asset.asset_type.clone(),
                    price,
                    change_percent,
                    quantity,
                    value: quantity * price,
                });
            }
        }
        pick
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
