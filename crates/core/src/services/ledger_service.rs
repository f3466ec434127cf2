use log::{debug, info};
use std::collections::HashSet;

use crate::errors::CoreError;
use crate::models::asset::{Asset, AssetType, Holding, Person};
use crate::models::portfolio::PortfolioState;

/// Direction of a quick quantity adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityAdjustment {
    Add,
    Remove,
}

/// Apply a quick add/remove to `qty`. Removing more than held floors at zero.
pub fn adjust_quantity(
    qty: f64,
    amount: f64,
    adjustment: QuantityAdjustment,
) -> Result<f64, CoreError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(CoreError::ValidationError(
            "Please enter a valid amount to add or remove".into(),
        ));
    }
    Ok(match adjustment {
        QuantityAdjustment::Add => qty + amount,
        QuantityAdjustment::Remove => (qty - amount).max(0.0),
    })
}

/// Manages the asset ledger: add, edit and delete holdings.
///
/// Pure business logic, no I/O. Price cache entries are removed together
/// with the last asset that uses them.
pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        Self
    }

    /// Validate and append a new asset. Returns its id.
    pub fn add_asset(&self, state: &mut PortfolioState, asset: Asset) -> Result<String, CoreError> {
        let asset = self.normalize(asset)?;
        if state.find_asset(&asset.id).is_some() {
            return Err(CoreError::ValidationError(format!(
                "An asset with id '{}' already exists",
                asset.id
            )));
        }
        info!("Adding {} {} ({})", asset.asset_type, asset.symbol, asset.id);
        let id = asset.id.clone();
        state.assets.push(asset);
        Ok(id)
    }

    /// Replace the asset with the same id, keeping its position in the ledger.
    pub fn update_asset(&self, state: &mut PortfolioState, asset: Asset) -> Result<(), CoreError> {
        let asset = self.normalize(asset)?;
        let slot = state
            .assets
            .iter_mut()
            .find(|a| a.id == asset.id)
            .ok_or_else(|| CoreError::AssetNotFound(asset.id.clone()))?;
        debug!("Updating asset {}", asset.id);
        *slot = asset;
        Ok(())
    }

    /// Remove an asset and, unless another asset shares it, its cached price.
    pub fn delete_asset(
        &self,
        state: &mut PortfolioState,
        asset_id: &str,
    ) -> Result<Asset, CoreError> {
        let index = state
            .assets
            .iter()
            .position(|a| a.id == asset_id)
            .ok_or_else(|| CoreError::AssetNotFound(asset_id.to_string()))?;
        let removed = state.assets.remove(index);

        let key = removed.price_key();
        if !state.assets.iter().any(|a| a.price_key() == key) {
            state.price_cache.remove(&key);
            debug!("Dropped cached price for {key}");
        }

        info!("Deleted {} {} ({})", removed.asset_type, removed.symbol, removed.id);
        Ok(removed)
    }

    /// Remove every asset and all cached prices. Snapshots and settings are kept.
    /// Returns the number of removed assets.
    pub fn delete_all(&self, state: &mut PortfolioState) -> usize {
        let removed = state.assets.len();
        state.assets.clear();
        state.price_cache.clear();
        info!("Deleted all {removed} asset(s)");
        removed
    }

    /// Quick adjust one person's quantity of an existing asset. Returns the new quantity.
    pub fn adjust_holding(
        &self,
        state: &mut PortfolioState,
        asset_id: &str,
        person: Person,
        amount: f64,
        adjustment: QuantityAdjustment,
    ) -> Result<f64, CoreError> {
        let asset = state
            .assets
            .iter_mut()
            .find(|a| a.id == asset_id)
            .ok_or_else(|| CoreError::AssetNotFound(asset_id.to_string()))?;
        let holding = asset.holdings.get_mut(person);
        holding.qty = adjust_quantity(holding.qty, amount, adjustment)?;
        Ok(holding.qty)
    }

    fn normalize(&self, mut asset: Asset) -> Result<Asset, CoreError> {
        asset.id = asset.id.trim().to_string();
        asset.symbol = asset.symbol.trim().to_string();
        asset.name = asset.name.trim().to_string();

        if asset.id.is_empty() {
            return Err(CoreError::ValidationError("Asset id must not be empty".into()));
        }
        if asset.symbol.is_empty() {
            return Err(CoreError::ValidationError("Symbol must not be empty".into()));
        }
        if asset.name.is_empty() {
            return Err(CoreError::ValidationError("Name must not be empty".into()));
        }

        for person in Person::BOTH {
            let holding = asset.holdings.get_mut(person);
            validate_holding(holding, &asset.symbol)?;
            if asset.asset_type != AssetType::Stock {
                holding.dividend = 0.0;
            }
        }

        // Units only apply to metals (oz, g, kg)
        if asset.asset_type == AssetType::Metal {
            asset.unit = asset
                .unit
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty());
        } else {
            asset.unit = None;
        }

        Ok(asset)
    }
}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new()
    }
}

/// Check a whole ledger read from outside: ids are unique and every holding
/// has finite, non-negative numbers.
pub fn validate_ledger(assets: &[Asset]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for asset in assets {
        if !seen.insert(asset.id.as_str()) {
            return Err(CoreError::ValidationError(format!(
                "Duplicate asset id '{}'",
                asset.id
            )));
        }
        for person in Person::BOTH {
            validate_holding(asset.holdings.get(person), &asset.symbol)?;
        }
    }
    Ok(())
}

fn validate_holding(holding: &Holding, symbol: &str) -> Result<(), CoreError> {
    let fields = [
        ("Quantity", holding.qty),
        ("Average cost", holding.avg_cost),
        ("Dividend", holding.dividend),
    ];
    for (label, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "{label} for {symbol} must be a non-negative number, got {value}"
            )));
        }
    }
    Ok(())
}
