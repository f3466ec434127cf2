pub mod config;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use log::info;
use std::sync::Arc;

use config::TrackerConfig;
use errors::CoreError;
use models::{
    asset::{Asset, AssetType, Person},
    portfolio::PortfolioState,
    price::{PriceCache, PriceData, PriceKey},
    settings::{normalize_currency, ApiKeys, Participants, Settings},
    snapshot::{HistoryPoint, HistorySummary, MissingPriceWarning, Snapshot},
    valuation::{
        AssetComparison, AssetFilter, AssetValuation, DayChange, Performer, SortState, TotalsReport,
    },
};
use providers::{
    registry::PriceProviderRegistry,
    traits::{PriceProvider, SymbolMatch, SymbolSearch},
};
use services::{
    ledger_service::{LedgerService, QuantityAdjustment},
    price_service::{Pacer, PriceService, RefreshReport},
    search_service::SearchService,
    snapshot_service::{PendingSnapshot, SnapshotService},
    valuation_service::ValuationService,
};
use storage::{
    format,
    manager::{StorageManager, StoredState},
    store::KeyValueStore,
};

/// Main entry point for the portfolio tracker core library.
///
/// Holds the portfolio state, the store it is persisted to and all services
/// needed to operate on it. Every mutating operation writes the full state
/// back to the store before returning.
#[must_use]
pub struct PortfolioTracker {
    state: PortfolioState,
    storage: StorageManager,
    config: TrackerConfig,
    ledger_service: LedgerService,
    valuation_service: ValuationService,
    snapshot_service: SnapshotService,
    price_service: PriceService,
    search_service: SearchService,
}

impl std::fmt::Debug for PortfolioTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioTracker")
            .field("assets", &self.state.assets.len())
            .field("snapshots", &self.state.snapshots.len())
            .field("cached_prices", &self.state.price_cache.len())
            .field("storage_key", &self.storage.key())
            .field("providers", &self.price_service.registry().provider_names())
            .finish()
    }
}

impl PortfolioTracker {
    /// Open the tracker on `store`.
    ///
    /// Loads the state stored under `config.storage_key`. When nothing is
    /// stored yet, the demo portfolio is seeded and persisted. An unreadable
    /// blob is logged and replaced by the defaults.
    pub fn open(store: Arc<dyn KeyValueStore>, config: TrackerConfig) -> Result<Self, CoreError> {
        let storage = StorageManager::new(store, config.storage_key.clone());
        match storage.load()? {
            StoredState::Loaded(state) => Ok(Self::build(state, storage, config)),
            StoredState::Missing => {
                info!("No stored portfolio, seeding demo data");
                let tracker = Self::build(PortfolioState::demo(now_ms()), storage, config);
                tracker.persist()?;
                Ok(tracker)
            }
            StoredState::Unreadable => Ok(Self::build(PortfolioState::default(), storage, config)),
        }
    }

    /// Open on an explicit initial state, replacing whatever is stored.
    pub fn with_state(
        state: PortfolioState,
        store: Arc<dyn KeyValueStore>,
        config: TrackerConfig,
    ) -> Result<Self, CoreError> {
        let storage = StorageManager::new(store, config.storage_key.clone());
        let tracker = Self::build(state, storage, config);
        tracker.persist()?;
        Ok(tracker)
    }

    #[must_use]
    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // ── Assets ──────────────────────────────────────────────────────

    /// Add a new asset to the ledger. Returns its id.
    pub fn add_asset(&mut self, asset: Asset) -> Result<String, CoreError> {
        let id = self.ledger_service.add_asset(&mut self.state, asset)?;
        self.persist()?;
        Ok(id)
    }

    /// Replace an existing asset (matched by id).
    pub fn update_asset(&mut self, asset: Asset) -> Result<(), CoreError> {
        self.ledger_service.update_asset(&mut self.state, asset)?;
        self.persist()
    }

    /// Delete an asset. Its cached price goes too unless another asset shares it.
    pub fn delete_asset(&mut self, asset_id: &str) -> Result<Asset, CoreError> {
        let removed = self.ledger_service.delete_asset(&mut self.state, asset_id)?;
        self.persist()?;
        Ok(removed)
    }

    /// Delete every asset and clear the price cache. Snapshots and settings stay.
    pub fn delete_all_assets(&mut self) -> Result<usize, CoreError> {
        let removed = self.ledger_service.delete_all(&mut self.state);
        self.persist()?;
        Ok(removed)
    }

    /// Quick add/remove on one person's quantity. Returns the new quantity.
    pub fn adjust_holding(
        &mut self,
        asset_id: &str,
        person: Person,
        amount: f64,
        adjustment: QuantityAdjustment,
    ) -> Result<f64, CoreError> {
        let qty = self
            .ledger_service
            .adjust_holding(&mut self.state, asset_id, person, amount, adjustment)?;
        self.persist()?;
        Ok(qty)
    }

    #[must_use]
    pub fn get_asset(&self, asset_id: &str) -> Option<&Asset> {
        self.state.find_asset(asset_id)
    }

    /// All assets in ledger order.
    #[must_use]
    pub fn assets(&self) -> &[Asset] {
        &self.state.assets
    }

    /// Assets matching `filter`, ordered by `sort` (ledger order when no column is set).
    #[must_use]
    pub fn list_assets(&self, filter: &AssetFilter, sort: &SortState) -> Vec<&Asset> {
        let mut assets = self.valuation_service.filter(&self.state.assets, filter);
        self.valuation_service
            .sort(&mut assets, sort, &self.state.price_cache);
        assets
    }

    // ── Valuation ───────────────────────────────────────────────────

    pub fn value_of(&self, asset_id: &str) -> Result<AssetValuation, CoreError> {
        let asset = self.require_asset(asset_id)?;
        Ok(self
            .valuation_service
            .value_of(asset, &self.state.price_cache))
    }

    #[must_use]
    pub fn totals(&self) -> TotalsReport {
        self.valuation_service
            .totals(&self.state.assets, &self.state.price_cache)
    }

    pub fn change_of(&self, asset_id: &str) -> Result<DayChange, CoreError> {
        let asset = self.require_asset(asset_id)?;
        Ok(self
            .valuation_service
            .change_of(&self.state.price_cache, &asset.price_key()))
    }

    #[must_use]
    pub fn top_performers(&self, n: usize) -> Vec<Performer> {
        self.valuation_service
            .top_performers(&self.state.assets, &self.state.price_cache, n)
    }

    #[must_use]
    pub fn bottom_performers(&self, n: usize) -> Vec<Performer> {
        self.valuation_service
            .bottom_performers(&self.state.assets, &self.state.price_cache, n)
    }

    #[must_use]
    pub fn best_performer(&self) -> Option<Performer> {
        self.valuation_service
            .best_performer(&self.state.assets, &self.state.price_cache)
    }

    #[must_use]
    pub fn worst_performer(&self) -> Option<Performer> {
        self.valuation_service
            .worst_performer(&self.state.assets, &self.state.price_cache)
    }

    /// Side-by-side metrics for 2 to 3 assets.
    pub fn compare(&self, asset_ids: &[&str]) -> Result<Vec<AssetComparison>, CoreError> {
        self.valuation_service
            .compare(&self.state.assets, &self.state.price_cache, asset_ids)
    }

    // ── Snapshots ───────────────────────────────────────────────────

    /// Compute the next snapshot without saving it, e.g. to show the missing-price warning.
    pub fn prepare_snapshot(&self) -> Result<PendingSnapshot, CoreError> {
        self.snapshot_service.prepare(
            &self.state.assets,
            &self.state.price_cache,
            &self.state.snapshots,
            now_ms(),
        )
    }

    /// Record a snapshot of the current total.
    ///
    /// `confirm` is only called when some assets have no price; returning
    /// `false` cancels and yields `Ok(None)`.
    pub fn save_snapshot<F>(&mut self, confirm: F) -> Result<Option<Snapshot>, CoreError>
    where
        F: FnOnce(&MissingPriceWarning) -> bool,
    {
        let saved = self.snapshot_service.save(
            &self.state.assets,
            &self.state.price_cache,
            &mut self.state.snapshots,
            now_ms(),
            confirm,
        )?;
        if saved.is_some() {
            self.persist()?;
        }
        Ok(saved)
    }

    pub fn delete_snapshot(&mut self, index: usize) -> Result<Snapshot, CoreError> {
        let removed = self
            .snapshot_service
            .delete_at(&mut self.state.snapshots, index)?;
        self.persist()?;
        Ok(removed)
    }

    pub fn clear_snapshots(&mut self) -> Result<usize, CoreError> {
        let removed = self.snapshot_service.clear(&mut self.state.snapshots);
        self.persist()?;
        Ok(removed)
    }

    #[must_use]
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.state.snapshots
    }

    /// Snapshots newest first with their history index (for deletion).
    #[must_use]
    pub fn snapshots_newest_first(&self) -> Vec<(usize, &Snapshot)> {
        self.snapshot_service.newest_first(&self.state.snapshots)
    }

    #[must_use]
    pub fn history_summary(&self) -> Option<HistorySummary> {
        self.snapshot_service.summarize(&self.state.snapshots)
    }

    #[must_use]
    pub fn history_series(&self) -> Vec<HistoryPoint> {
        self.snapshot_service.series(&self.state.snapshots)
    }

    // ── Settings ────────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    /// Display name of one of the two people.
    #[must_use]
    pub fn person_name(&self, person: Person) -> &str {
        self.state.settings.people.name(person)
    }

    /// Rename both people. Both names must be non-empty after trimming.
    pub fn set_people(&mut self, person_a: &str, person_b: &str) -> Result<(), CoreError> {
        self.state.settings.people = Participants::new(person_a, person_b)?;
        self.persist()
    }

    /// Set the base currency (3-letter code, e.g. "USD").
    pub fn set_base_currency(&mut self, currency: &str) -> Result<(), CoreError> {
        self.state.settings.base_currency = normalize_currency(currency)?;
        self.persist()
    }

    /// Replace the API keys and rebuild the provider registry so they take effect immediately.
    pub fn set_api_keys(&mut self, api_keys: ApiKeys) -> Result<(), CoreError> {
        self.state.settings.api_keys = api_keys;
        self.rebuild_registry();
        self.persist()
    }

    // ── Prices ──────────────────────────────────────────────────────

    #[must_use]
    pub fn price_cache(&self) -> &PriceCache {
        &self.state.price_cache
    }

    /// Fetch fresh quotes for every asset and persist the updated cache.
    pub async fn refresh_prices(&mut self) -> Result<RefreshReport, CoreError> {
        let currency = self.state.settings.base_currency.clone();
        let report = self
            .price_service
            .refresh(
                &self.state.assets,
                &mut self.state.price_cache,
                &currency,
                now_ms(),
            )
            .await?;
        self.persist()?;
        Ok(report)
    }

    /// Replace the timer used between provider calls, for hosts not running on tokio.
    pub fn set_pacer(&mut self, pacer: Arc<dyn Pacer>) {
        self.price_service.set_pacer(pacer);
    }

    /// Refresh only when the cache is older than `config.price_cache_ttl`.
    /// Returns `None` when the cached prices are still fresh.
    pub async fn refresh_if_stale(&mut self) -> Result<Option<RefreshReport>, CoreError> {
        if !self
            .state
            .price_cache
            .is_stale(now_ms(), self.config.price_cache_ttl)
        {
            return Ok(None);
        }
        self.refresh_prices().await.map(Some)
    }

    /// Manually store a quote, e.g. for offline use or assets without a provider.
    pub fn set_cached_quote(
        &mut self,
        key: &PriceKey,
        data: impl Into<PriceData>,
    ) -> Result<(), CoreError> {
        let quote = data.into().normalize();
        if !quote.is_valid() {
            return Err(CoreError::ValidationError(format!(
                "Invalid price for {key}: {} (must be a finite number above 0)",
                quote.price
            )));
        }
        self.state.price_cache.apply_refresh(key, quote);
        self.persist()
    }

    /// Add an extra price provider, e.g. one without an API key.
    /// Providers registered this way are dropped again when the API keys change.
    pub fn register_provider(&mut self, provider: Arc<dyn PriceProvider>) {
        let mut registry = PriceProviderRegistry::new();
        registry.register(provider);
        for existing in self.price_service.registry().providers() {
            registry.register(existing);
        }
        if let Some(searcher) = self.price_service.registry().searcher() {
            registry.register_search(searcher);
        }
        self.price_service.set_registry(registry);
    }

    /// Replace the symbol search backend.
    pub fn register_search(&mut self, searcher: Arc<dyn SymbolSearch>) {
        let mut registry = PriceProviderRegistry::new();
        registry.register_search(searcher);
        for existing in self.price_service.registry().providers() {
            registry.register(existing);
        }
        self.price_service.set_registry(registry);
    }

    /// Names of the active price providers, in lookup order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.price_service.registry().provider_names()
    }

    // ── Symbol Search ───────────────────────────────────────────────

    /// Autocomplete suggestions for the given asset type.
    pub async fn search_symbols(
        &self,
        query: &str,
        asset_type: &AssetType,
    ) -> Result<Vec<SymbolMatch>, CoreError> {
        self.search_service
            .search(self.price_service.registry(), query, asset_type)
            .await
    }

    // ── Export / Import ─────────────────────────────────────────────

    /// The full state as pretty-printed JSON, suitable for a backup file.
    pub fn export_json(&self) -> Result<String, CoreError> {
        format::export(&self.state)
    }

    /// Replace the whole state with a backup document.
    /// On any error the current state is left untouched.
    pub fn import_json(&mut self, raw: &str) -> Result<(), CoreError> {
        let state = format::import(raw)?;
        info!(
            "Imported portfolio with {} asset(s) and {} snapshot(s)",
            state.assets.len(),
            state.snapshots.len()
        );
        self.state = state;
        self.rebuild_registry();
        self.persist()
    }

    // ── Internal ────────────────────────────────────────────────────

    fn require_asset(&self, asset_id: &str) -> Result<&Asset, CoreError> {
        self.state
            .find_asset(asset_id)
            .ok_or_else(|| CoreError::AssetNotFound(asset_id.to_string()))
    }

    fn persist(&self) -> Result<(), CoreError> {
        self.storage.save(&self.state)
    }

    fn rebuild_registry(&mut self) {
        let registry = PriceProviderRegistry::new_with_defaults(&self.state.settings.api_keys);
        self.price_service.set_registry(registry);
    }

    fn build(state: PortfolioState, storage: StorageManager, config: TrackerConfig) -> Self {
        let registry = PriceProviderRegistry::new_with_defaults(&state.settings.api_keys);
        let price_service = PriceService::new(registry, config.refresh.clone());

        Self {
            state,
            storage,
            config,
            ledger_service: LedgerService::new(),
            valuation_service: ValuationService::new(),
            snapshot_service: SnapshotService::new(),
            price_service,
            search_service: SearchService::new(),
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
