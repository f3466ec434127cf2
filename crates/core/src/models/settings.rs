use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::asset::Person;
use crate::errors::CoreError;

pub const DEFAULT_BASE_CURRENCY: &str = "USD";
pub const DEFAULT_PEOPLE: [&str; 2] = ["Dean", "Sam"];

/// Values shipped in sample configs that must never be sent to a provider.
const PLACEHOLDER_KEYS: [&str; 3] = [
    "PASTE_KEY_HERE",
    "YOUR_FINNHUB_API_KEY_HERE",
    "YOUR_METALS_DEV_API_KEY_HERE",
];

/// User-configurable settings, stored inside the state blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Currency used for display and for metal spot quotes (e.g. "USD").
    pub base_currency: String,

    /// Display names of the two tracked people.
    pub people: Participants,

    #[serde(default)]
    pub api_keys: ApiKeys,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            people: Participants::default(),
            api_keys: ApiKeys::default(),
        }
    }
}

/// Exactly two display names. Serialized as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participants(pub [String; 2]);

impl Participants {
    /// Build from two names, trimming whitespace. Both must be non-empty.
    pub fn new(person_a: &str, person_b: &str) -> Result<Self, CoreError> {
        let a = person_a.trim();
        let b = person_b.trim();
        if a.is_empty() || b.is_empty() {
            return Err(CoreError::ValidationError(
                "Please enter names for both people".into(),
            ));
        }
        Ok(Self([a.to_string(), b.to_string()]))
    }

    pub fn name(&self, person: Person) -> &str {
        &self.0[person.index()]
    }
}

impl Default for Participants {
    fn default() -> Self {
        Self(DEFAULT_PEOPLE.map(String::from))
    }
}

/// Provider credentials.
///
/// The two known providers have dedicated fields; any other entries found in
/// an imported document are kept in `other` so nothing is silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeys {
    #[serde(rename = "FINNHUB_KEY", default)]
    pub finnhub_key: String,

    #[serde(rename = "METALS_DEV_KEY", default)]
    pub metals_dev_key: String,

    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

impl ApiKeys {
    pub fn new(finnhub_key: impl Into<String>, metals_dev_key: impl Into<String>) -> Self {
        Self {
            finnhub_key: finnhub_key.into().trim().to_string(),
            metals_dev_key: metals_dev_key.into().trim().to_string(),
            other: BTreeMap::new(),
        }
    }

    /// The Finnhub key, if one is configured and is not a sample placeholder.
    pub fn finnhub(&self) -> Option<&str> {
        usable(&self.finnhub_key)
    }

    /// The metals.dev key, if one is configured and is not a sample placeholder.
    pub fn metals_dev(&self) -> Option<&str> {
        usable(&self.metals_dev_key)
    }
}

fn usable(key: &str) -> Option<&str> {
    let key = key.trim();
    if key.is_empty() || PLACEHOLDER_KEYS.contains(&key) {
        None
    } else {
        Some(key)
    }
}

/// Normalize and validate a 3-letter currency code.
pub fn normalize_currency(currency: &str) -> Result<String, CoreError> {
    let trimmed = currency.trim().to_uppercase();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::ValidationError(format!(
            "Invalid currency code '{currency}': must be exactly 3 ASCII letters \
             (e.g., USD, EUR, PLN)"
        )));
    }
    Ok(trimmed)
}
