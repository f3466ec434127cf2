use log::{debug, warn};
use serde_json::{Map, Value};

use crate::errors::CoreError;
use crate::models::portfolio::PortfolioState;
use crate::models::settings::{DEFAULT_BASE_CURRENCY, DEFAULT_PEOPLE};
use crate::services::ledger_service::validate_ledger;

/// Suggested file name for a JSON backup.
pub const BACKUP_FILE_NAME: &str = "portfolio_backup.json";

/// Serialize the full state as pretty-printed JSON (backup file contents).
pub fn export(state: &PortfolioState) -> Result<String, CoreError> {
    serde_json::to_string_pretty(state)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize portfolio: {e}")))
}

/// Parse a backup document into a state.
///
/// The document must be a JSON object with an `assets` array and a `settings`
/// object. Older layouts are upgraded on the way in:
/// - a root-level `apiKeys` object moves into `settings.apiKeys` (unless that
///   already exists) and is removed from the root
/// - a missing `settings.apiKeys`, `snapshots` or `priceCache` is filled with
///   an empty value
/// - `people` that are not exactly two strings fall back to the defaults
///
/// Duplicate asset ids and negative quantities, costs or dividends are
/// rejected.
pub fn import(raw: &str) -> Result<PortfolioState, CoreError> {
    let state = parse(raw)?;
    validate_ledger(&state.assets)?;
    Ok(state)
}

/// Read the blob persisted in the key-value store.
///
/// Unlike [`import`], a blob that cannot be read is not an error for the
/// caller: it is logged and `None` is returned so the tracker can start from
/// defaults instead of failing to open. A parsed ledger that breaks the
/// holding rules is kept and logged, so no stored data is dropped.
pub fn load(raw: &str) -> Option<PortfolioState> {
    match parse(raw) {
        Ok(state) => {
            if let Err(e) = validate_ledger(&state.assets) {
                warn!("Stored ledger is inconsistent: {e}");
            }
            Some(state)
        }
        Err(e) => {
            warn!("Failed to parse stored data, starting from defaults: {e}");
            None
        }
    }
}

fn parse(raw: &str) -> Result<PortfolioState, CoreError> {
    let mut doc: Value = serde_json::from_str(raw)
        .map_err(|e| CoreError::Deserialization(format!("Invalid JSON file: {e}")))?;

    let root = doc.as_object_mut().ok_or_else(|| {
        CoreError::ValidationError("Invalid backup file: missing assets array".into())
    })?;

    if !root.get("assets").is_some_and(Value::is_array) {
        return Err(CoreError::ValidationError(
            "Invalid backup file: missing assets array".into(),
        ));
    }
    if !root.get("settings").is_some_and(Value::is_object) {
        return Err(CoreError::ValidationError(
            "Invalid backup file: missing settings".into(),
        ));
    }

    migrate(root);

    serde_json::from_value(doc)
        .map_err(|e| CoreError::Deserialization(format!("Failed to read portfolio: {e}")))
}

fn migrate(root: &mut Map<String, Value>) {
    let legacy_keys = root.remove("apiKeys");

    let Some(settings) = root.get_mut("settings").and_then(Value::as_object_mut) else {
        return;
    };

    if !settings.get("apiKeys").is_some_and(Value::is_object) {
        let keys = match legacy_keys {
            Some(Value::Object(keys)) => {
                debug!("Migrating root-level apiKeys into settings");
                string_entries(keys)
            }
            _ => Map::new(),
        };
        settings.insert("apiKeys".into(), Value::Object(keys));
    } else if let Some(Value::Object(keys)) = settings.remove("apiKeys") {
        settings.insert("apiKeys".into(), Value::Object(string_entries(keys)));
    }

    let people_ok = settings
        .get("people")
        .and_then(Value::as_array)
        .is_some_and(|people| people.len() == 2 && people.iter().all(Value::is_string));
    if !people_ok {
        debug!("Resetting invalid people list to defaults");
        settings.insert(
            "people".into(),
            Value::Array(DEFAULT_PEOPLE.iter().map(|p| Value::from(*p)).collect()),
        );
    }

    if !settings.get("baseCurrency").is_some_and(Value::is_string) {
        settings.insert("baseCurrency".into(), Value::from(DEFAULT_BASE_CURRENCY));
    }

    if !root.get("snapshots").is_some_and(Value::is_array) {
        root.insert("snapshots".into(), Value::Array(Vec::new()));
    }
    if !root.get("priceCache").is_some_and(Value::is_object) {
        root.remove("priceCache");
    }
}

/// Keep only string-valued entries; anything else cannot be a credential.
fn string_entries(keys: Map<String, Value>) -> Map<String, Value> {
    keys.into_iter().filter(|(_, v)| v.is_string()).collect()
}
