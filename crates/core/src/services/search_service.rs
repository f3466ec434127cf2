use log::debug;

use crate::errors::CoreError;
use crate::models::asset::AssetType;
use crate::providers::registry::PriceProviderRegistry;
use crate::providers::traits::SymbolMatch;

/// Maximum number of suggestions returned for one query.
pub const MAX_SUGGESTIONS: usize = 10;

/// Exchange prefix of the crypto pairs the price refresh can quote.
const CRYPTO_PREFIX: &str = "BINANCE:";

/// Narrow raw search results to symbols usable for `asset_type`.
///
/// Stocks drop exchange-qualified symbols (anything containing `:`), crypto
/// keeps only `BINANCE:` pairs. Other types have no searchable symbols.
pub fn filter_matches(results: Vec<SymbolMatch>, asset_type: &AssetType) -> Vec<SymbolMatch> {
    let keep: fn(&SymbolMatch) -> bool = match asset_type {
        AssetType::Stock => |m: &SymbolMatch| !m.symbol.contains(':'),
        AssetType::Crypto => |m: &SymbolMatch| m.symbol.starts_with(CRYPTO_PREFIX),
        _ => return Vec::new(),
    };
    results
        .into_iter()
        .filter(keep)
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Whether symbol autocomplete is offered for `asset_type`.
pub fn is_searchable(asset_type: &AssetType) -> bool {
    matches!(asset_type, AssetType::Stock | AssetType::Crypto)
}

/// Symbol autocomplete backed by the registry's search provider.
pub struct SearchService;

impl SearchService {
    pub fn new() -> Self {
        Self
    }

    /// Suggestions for `query`, already filtered for `asset_type`.
    ///
    /// A blank query or a type without symbol search yields no suggestions and
    /// no request. Fails with `NoProvider` when no search backend is configured.
    pub async fn search(
        &self,
        registry: &PriceProviderRegistry,
        query: &str,
        asset_type: &AssetType,
    ) -> Result<Vec<SymbolMatch>, CoreError> {
        let query = query.trim();
        if query.is_empty() || !is_searchable(asset_type) {
            return Ok(Vec::new());
        }

        let searcher = registry
            .searcher()
            .ok_or_else(|| CoreError::NoProvider("symbol search".into()))?;

        let results = searcher.search(query).await?;
        debug!(
            "{} returned {} match(es) for '{query}'",
            searcher.name(),
            results.len()
        );
        Ok(filter_matches(results, asset_type))
    }
}

impl Default for SearchService {
    fn default() -> Self {
        Self::new()
    }
}
