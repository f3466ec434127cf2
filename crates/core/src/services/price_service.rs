use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RefreshConfig;
use crate::errors::CoreError;
use crate::models::asset::{Asset, AssetType};
use crate::models::price::{PriceCache, PriceKey, PriceQuote};
use crate::providers::registry::PriceProviderRegistry;
use crate::providers::traits::PriceProvider;
use crate::services::valuation_service::SAVINGS_PRICE;

/// Outcome of one refresh pass, counted per asset in the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub updated: usize,
    pub errors: usize,
    pub total: usize,
}

impl RefreshReport {
    /// Status line shown after a refresh, e.g. `Updated 9/10 prices, Errors: 1`.
    pub fn status_text(&self) -> String {
        let mut text = format!("Updated {}/{} prices", self.updated, self.total);
        if self.errors > 0 {
            text.push_str(&format!(", Errors: {}", self.errors));
        }
        text
    }
}

/// Waits between two sequential provider calls.
///
/// The refresh loop never sleeps on its own, so hosts running on an executor
/// other than tokio plug in their own timer here.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Sleeps on the tokio timer. Must be driven from inside a tokio runtime.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[cfg(not(target_arch = "wasm32"))]
#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately. Default on wasm, where the host supplies its own timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacer;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Pacer for NoPacer {
    async fn pause(&self, duration: Duration) {
        debug!("Skipping {duration:?} pause, no timer configured");
    }
}

fn default_pacer() -> Arc<dyn Pacer> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        Arc::new(TokioPacer)
    }
    #[cfg(target_arch = "wasm32")]
    {
        Arc::new(NoPacer)
    }
}

/// Fetches fresh quotes for every priced asset and folds them into the cache.
///
/// Symbols are grouped by asset type and deduplicated, then fetched one at a
/// time per provider with the provider's pacing delay in between. One failing
/// symbol never aborts the pass: it is logged and counted as an error.
///
/// Only one refresh may run at a time per service. A second call while one is
/// in flight fails with [`CoreError::RefreshInProgress`].
pub struct PriceService {
    registry: PriceProviderRegistry,
    config: RefreshConfig,
    pacer: Arc<dyn Pacer>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the refresh future completes or is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PriceService {
    pub fn new(registry: PriceProviderRegistry, config: RefreshConfig) -> Self {
        Self {
            registry,
            config,
            pacer: default_pacer(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Use `pacer` for the pacing and rate-limit waits.
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn set_pacer(&mut self, pacer: Arc<dyn Pacer>) {
        self.pacer = pacer;
    }

    pub fn registry(&self) -> &PriceProviderRegistry {
        &self.registry
    }

    /// Swap the provider set, e.g. after the API keys changed.
    pub fn set_registry(&mut self, registry: PriceProviderRegistry) {
        self.registry = registry;
    }

    /// Whether at least one provider can price the given asset type.
    pub fn has_provider_for(&self, asset_type: &AssetType) -> bool {
        *asset_type == AssetType::Savings || self.registry.get_provider_for(asset_type).is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Refresh the quote of every asset in `assets` and stamp the cache with `now_ms`.
    ///
    /// Savings are set to 1.0 with a 0 % change without any provider call.
    /// `total` in the report is the number of assets, and each asset counts
    /// either as updated or as an error.
    pub async fn refresh(
        &self,
        assets: &[Asset],
        cache: &mut PriceCache,
        currency: &str,
        now_ms: i64,
    ) -> Result<RefreshReport, CoreError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CoreError::RefreshInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);

        // Unique symbols per type, in first-seen ledger order
        let mut groups: Vec<(AssetType, Vec<String>)> = Vec::new();
        for asset in assets {
            if asset.asset_type == AssetType::Savings {
                continue;
            }
            let index = match groups.iter().position(|(t, _)| *t == asset.asset_type) {
                Some(index) => index,
                None => {
                    groups.push((asset.asset_type.clone(), Vec::new()));
                    groups.len() - 1
                }
            };
            let symbols = &mut groups[index].1;
            if !symbols.contains(&asset.symbol) {
                symbols.push(asset.symbol.clone());
            }
        }

        info!(
            "Refreshing prices for {} asset(s) across {} type group(s)",
            assets.len(),
            groups.len()
        );

        let mut fetched: HashMap<PriceKey, PriceQuote> = HashMap::new();
        for (asset_type, symbols) in &groups {
            let Some(provider) = self.registry.get_provider_for(asset_type) else {
                warn!(
                    "No price provider for asset type '{asset_type}', skipping {} symbol(s)",
                    symbols.len()
                );
                continue;
            };
            self.fetch_group(provider, asset_type, symbols, currency, &mut fetched)
                .await;
        }

        let mut report = RefreshReport {
            total: assets.len(),
            ..RefreshReport::default()
        };

        for asset in assets {
            let key = asset.price_key();
            if asset.asset_type == AssetType::Savings {
                cache.apply_refresh(&key, PriceQuote::with_change(SAVINGS_PRICE, 0.0));
                report.updated += 1;
            } else if fetched.contains_key(&key) {
                report.updated += 1;
            } else {
                report.errors += 1;
            }
        }

        // Shared keys are applied once so the previous price stays the pre-refresh value
        for (key, quote) in fetched {
            cache.apply_refresh(&key, quote);
        }
        cache.mark_updated(now_ms);

        info!("{}", report.status_text());
        Ok(report)
    }

    async fn fetch_group(
        &self,
        provider: Arc<dyn PriceProvider>,
        asset_type: &AssetType,
        symbols: &[String],
        currency: &str,
        fetched: &mut HashMap<PriceKey, PriceQuote>,
    ) {
        let pacing = self.config.pacing_override.unwrap_or_else(|| provider.pacing());

        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 {
                self.pause(pacing).await;
            }

            match provider.fetch_quote(symbol, currency).await {
                Ok(data) => {
                    let quote = data.normalize();
                    if quote.is_valid() {
                        debug!(
                            "Updated {asset_type}:{symbol} = {} ({:+.2}%)",
                            quote.price,
                            quote.change_percent.unwrap_or(0.0)
                        );
                        fetched.insert(PriceKey::new(asset_type.clone(), symbol), quote);
                    } else {
                        warn!(
                            "{} returned an invalid price for {symbol}: {}",
                            provider.name(),
                            quote.price
                        );
                    }
                }
                Err(CoreError::RateLimited { provider: name }) => {
                    warn!(
                        "Rate limit hit at {name} for {symbol}, pausing {:?}",
                        self.config.rate_limit_pause
                    );
                    self.pause(self.config.rate_limit_pause).await;
                }
                Err(e) => {
                    warn!("Failed to fetch {asset_type}:{symbol}: {e}");
                }
            }
        }
    }

    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            self.pacer.pause(duration).await;
        }
    }
}
