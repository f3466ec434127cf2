use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::asset::AssetType;
use crate::models::price::PriceData;

/// Fixed gap between two sequential calls to the same provider (~60 calls/min).
pub const DEFAULT_PACING: Duration = Duration::from_millis(1100);

/// Trait abstraction for all price data providers.
///
/// Each API provider (Finnhub, metals.dev) implements this trait. If an API
/// stops working or changes, only that one implementation is replaced.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Which asset types this provider can handle.
    fn supported_asset_types(&self) -> Vec<AssetType>;

    /// Delay inserted between two sequential fetches to this provider.
    fn pacing(&self) -> Duration {
        DEFAULT_PACING
    }

    /// Fetch the latest quote for `symbol`, priced in `currency` where the API supports it.
    ///
    /// Rate-limit responses must be reported as [`CoreError::RateLimited`].
    async fn fetch_quote(&self, symbol: &str, currency: &str) -> Result<PriceData, CoreError>;
}

/// One entry of a symbol lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMatch {
    /// Symbol usable for price lookups (AAPL, BINANCE:BTCUSDT)
    pub symbol: String,
    /// Human readable description, used as the default asset name
    pub description: String,
}

/// Free-text symbol lookup used for autocomplete.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait SymbolSearch: Send + Sync {
    fn name(&self) -> &str;

    /// Raw, unfiltered matches for `query`.
    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, CoreError>;
}
