use std::time::Duration;

/// Key under which the whole state blob is stored.
pub const DEFAULT_STORAGE_KEY: &str = "portfolio_v1";

/// Cached prices younger than this are considered fresh.
pub const DEFAULT_PRICE_CACHE_TTL: Duration = Duration::from_secs(60);

/// How long to back off after a provider answers with a rate-limit response.
pub const DEFAULT_RATE_LIMIT_PAUSE: Duration = Duration::from_secs(5);

/// Runtime configuration for a [`crate::PortfolioTracker`].
///
/// User-editable preferences (names, currency, API keys) live in
/// [`crate::models::settings::Settings`] inside the persisted state instead.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Key of the state blob inside the key-value store.
    pub storage_key: String,
    /// Age after which `refresh_if_stale` re-fetches prices.
    pub price_cache_ttl: Duration,
    pub refresh: RefreshConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            price_cache_ttl: DEFAULT_PRICE_CACHE_TTL,
            refresh: RefreshConfig::default(),
        }
    }
}

/// Tuning for a price refresh pass.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Pause applied after a rate-limited response before moving to the next symbol.
    pub rate_limit_pause: Duration,
    /// When set, overrides every provider's own pacing delay (tests use `Duration::ZERO`).
    pub pacing_override: Option<Duration>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            rate_limit_pause: DEFAULT_RATE_LIMIT_PAUSE,
            pacing_override: None,
        }
    }
}

impl RefreshConfig {
    /// A configuration without any waiting, for tests and offline tooling.
    pub fn immediate() -> Self {
        Self {
            rate_limit_pause: Duration::ZERO,
            pacing_override: Some(Duration::ZERO),
        }
    }
}
