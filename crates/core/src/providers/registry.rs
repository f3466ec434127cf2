use log::debug;
use std::sync::Arc;

use crate::models::asset::AssetType;
use crate::models::settings::ApiKeys;

use super::finnhub::FinnhubProvider;
use super::metals_dev::MetalsDevProvider;
use super::traits::{PriceProvider, SymbolSearch};

/// Registry of all available price providers and symbol searchers.
///
/// Routes requests to the correct provider based on `AssetType`.
/// New providers can be added without modifying existing code.
pub struct PriceProviderRegistry {
    providers: Vec<Arc<dyn PriceProvider>>,
    searchers: Vec<Arc<dyn SymbolSearch>>,
}

impl PriceProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            searchers: Vec::new(),
        }
    }

    /// Create a registry with every default provider whose API key is configured.
    pub fn new_with_defaults(api_keys: &ApiKeys) -> Self {
        let mut registry = Self::new();

        // Finnhub: stocks and crypto pairs, plus symbol search
        if let Some(key) = api_keys.finnhub() {
            let finnhub = Arc::new(FinnhubProvider::new(key.to_string()));
            registry.register(finnhub.clone());
            registry.register_search(finnhub);
        } else {
            debug!("Finnhub API key not configured; stock and crypto prices will not update");
        }

        // metals.dev: precious metals
        if let Some(key) = api_keys.metals_dev() {
            registry.register(Arc::new(MetalsDevProvider::new(key.to_string())));
        } else {
            debug!("metals.dev API key not configured; metal prices will not update");
        }

        registry
    }

    /// Register a new price provider.
    pub fn register(&mut self, provider: Arc<dyn PriceProvider>) {
        self.providers.push(provider);
    }

    /// Register a new symbol search backend.
    pub fn register_search(&mut self, searcher: Arc<dyn SymbolSearch>) {
        self.searchers.push(searcher);
    }

    /// Find the first provider that supports the given asset type.
    pub fn get_provider_for(&self, asset_type: &AssetType) -> Option<Arc<dyn PriceProvider>> {
        self.providers
            .iter()
            .find(|p| p.supported_asset_types().contains(asset_type))
            .cloned()
    }

    /// All registered price providers, in lookup order.
    pub fn providers(&self) -> Vec<Arc<dyn PriceProvider>> {
        self.providers.clone()
    }

    /// The first registered symbol search backend, if any.
    pub fn searcher(&self) -> Option<Arc<dyn SymbolSearch>> {
        self.searchers.first().cloned()
    }

    /// Names of all registered price providers, in registration order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

impl Default for PriceProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
