use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::asset::AssetType;
use crate::errors::CoreError;

/// Cache key: `"{type}:{symbol}"`, e.g. `stock:AAPL`, `crypto:BINANCE:BTCUSDT`.
///
/// The symbol may itself contain `:`; only the first separator splits type from symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub asset_type: AssetType,
    pub symbol: String,
}

impl PriceKey {
    pub fn new(asset_type: AssetType, symbol: impl Into<String>) -> Self {
        Self {
            asset_type,
            symbol: symbol.into(),
        }
    }
}

impl std::fmt::Display for PriceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.asset_type, self.symbol)
    }
}

impl std::str::FromStr for PriceKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((asset_type, symbol)) if !asset_type.is_empty() && !symbol.is_empty() => {
                Ok(Self::new(AssetType::from(asset_type), symbol))
            }
            _ => Err(CoreError::ValidationError(format!(
                "Invalid price key '{s}': expected '<type>:<symbol>'"
            ))),
        }
    }
}

/// Normalized price record for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Last known price (always > 0 once cached)
    pub price: f64,

    /// Day change in percent units (2.5 means +2.5%)
    #[serde(default)]
    pub change_percent: Option<f64>,

    #[serde(default)]
    pub previous_price: Option<f64>,
}

impl PriceQuote {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            change_percent: None,
            previous_price: None,
        }
    }

    pub fn with_change(price: f64, change_percent: f64) -> Self {
        Self {
            price,
            change_percent: Some(change_percent),
            previous_price: None,
        }
    }

    /// A price is usable when it is a finite, strictly positive number.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Price data as it arrives from a provider: either a bare number or a
/// structured record. Convert with [`PriceData::normalize`] right at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceData {
    Bare(f64),
    Quote(PriceQuote),
}

impl PriceData {
    /// Bare numbers become a quote with a 0% day change.
    pub fn normalize(self) -> PriceQuote {
        match self {
            PriceData::Bare(price) => PriceQuote::with_change(price, 0.0),
            PriceData::Quote(quote) => quote,
        }
    }
}

impl From<f64> for PriceData {
    fn from(price: f64) -> Self {
        PriceData::Bare(price)
    }
}

impl From<PriceQuote> for PriceData {
    fn from(quote: PriceQuote) -> Self {
        PriceData::Quote(quote)
    }
}

/// Last-known prices keyed by [`PriceKey`].
///
/// Entries are replaced wholesale on refresh, never merged field by field.
/// A missing key means "no price known", which is distinct from a zero price.
///
/// Persisted in the state blob's historical layout: parallel `prices`,
/// `previousPrices` and `changePercents` maps plus `lastUpdated` (epoch ms).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PriceCacheRepr", into = "PriceCacheRepr")]
pub struct PriceCache {
    entries: BTreeMap<String, PriceQuote>,

    /// Epoch milliseconds of the last completed refresh, 0 if never refreshed.
    pub last_updated: i64,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PriceKey) -> Option<&PriceQuote> {
        self.entries.get(&key.to_string())
    }

    /// Cached price for `key`, or `None` when no price is known.
    pub fn price(&self, key: &PriceKey) -> Option<f64> {
        self.get(key).map(|q| q.price)
    }

    pub fn change_percent(&self, key: &PriceKey) -> Option<f64> {
        self.get(key).and_then(|q| q.change_percent)
    }

    pub fn previous_price(&self, key: &PriceKey) -> Option<f64> {
        self.get(key).and_then(|q| q.previous_price)
    }

    /// Store a quote exactly as given, replacing any existing entry.
    pub fn insert(&mut self, key: &PriceKey, quote: PriceQuote) {
        self.entries.insert(key.to_string(), quote);
    }

    /// Replace the entry for `key` with a freshly fetched quote.
    ///
    /// The price cached before this call (if any) becomes the new entry's
    /// `previous_price`; otherwise the provider-supplied previous price is kept.
    pub fn apply_refresh(&mut self, key: &PriceKey, fresh: PriceQuote) {
        let previous_price = self.price(key).or(fresh.previous_price);
        self.insert(
            key,
            PriceQuote {
                previous_price,
                ..fresh
            },
        );
    }

    pub fn remove(&mut self, key: &PriceKey) -> Option<PriceQuote> {
        self.entries.remove(&key.to_string())
    }

    pub fn contains(&self, key: &PriceKey) -> bool {
        self.entries.contains_key(&key.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All cached keys in their string form, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Record the completion time of a refresh pass.
    pub fn mark_updated(&mut self, now_ms: i64) {
        self.last_updated = now_ms;
    }

    /// True when the cache was never refreshed or the last refresh is at least `ttl` old.
    pub fn is_stale(&self, now_ms: i64, ttl: Duration) -> bool {
        if self.last_updated <= 0 {
            return true;
        }
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.last_updated) >= ttl_ms
    }

    /// Remove every entry and reset `last_updated`.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_updated = 0;
    }
}

// ── Persisted layout ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceCacheRepr {
    #[serde(default)]
    last_updated: i64,

    #[serde(default)]
    prices: BTreeMap<String, f64>,

    #[serde(default)]
    previous_prices: BTreeMap<String, f64>,

    #[serde(default)]
    change_percents: BTreeMap<String, Option<f64>>,
}

impl From<PriceCacheRepr> for PriceCache {
    fn from(repr: PriceCacheRepr) -> Self {
        let entries = repr
            .prices
            .into_iter()
            .map(|(key, price)| {
                let quote = PriceQuote {
                    price,
                    change_percent: repr.change_percents.get(&key).copied().flatten(),
                    previous_price: repr.previous_prices.get(&key).copied(),
                };
                (key, quote)
            })
            .collect();
        Self {
            entries,
            last_updated: repr.last_updated,
        }
    }
}

impl From<PriceCache> for PriceCacheRepr {
    fn from(cache: PriceCache) -> Self {
        let mut repr = PriceCacheRepr {
            last_updated: cache.last_updated,
            ..Default::default()
        };
        for (key, quote) in cache.entries {
            if let Some(previous) = quote.previous_price {
                repr.previous_prices.insert(key.clone(), previous);
            }
            if let Some(change) = quote.change_percent {
                repr.change_percents.insert(key.clone(), Some(change));
            }
            repr.prices.insert(key, quote.price);
        }
        repr
    }
}
