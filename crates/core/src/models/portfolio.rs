use serde::{Deserialize, Serialize};

use super::asset::{Asset, AssetType, Holding, Holdings};
use super::price::{PriceCache, PriceKey, PriceQuote};
use super::settings::Settings;
use super::snapshot::Snapshot;

/// The main data container. Everything in here is serialized as one JSON
/// document under a single storage key, and doubles as the backup file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioState {
    /// User settings (names, base currency, API keys)
    pub settings: Settings,

    /// The asset ledger, in insertion order
    pub assets: Vec<Asset>,

    /// Last-known prices for the ledger's symbols
    #[serde(default)]
    pub price_cache: PriceCache,

    /// Snapshot history, oldest first
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

impl PortfolioState {
    pub fn find_asset(&self, asset_id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == asset_id)
    }

    /// A diversified sample portfolio shown to first-time users.
    pub fn demo(now_ms: i64) -> Self {
        // (qty, avg cost, dividend) for person A, then person B
        let assets = vec![
            demo_asset(
                "demo_1",
                AssetType::Stock,
                "AAPL",
                "Apple Inc.",
                (25.0, 145.0, 24.0),
                (15.0, 160.0, 15.0),
            ),
            demo_asset(
                "demo_2",
                AssetType::Stock,
                "MSFT",
                "Microsoft Corporation",
                (20.0, 280.0, 68.0),
                (18.0, 295.0, 60.0),
            ),
            demo_asset(
                "demo_3",
                AssetType::Stock,
                "GOOGL",
                "Alphabet Inc.",
                (30.0, 125.0, 0.0),
                (25.0, 135.0, 0.0),
            ),
            demo_asset(
                "demo_4",
                AssetType::Stock,
                "JNJ",
                "Johnson & Johnson",
                (40.0, 155.0, 120.0),
                (35.0, 160.0, 105.0),
            ),
            demo_asset(
                "demo_5",
                AssetType::Crypto,
                "BINANCE:BTCUSDT",
                "Bitcoin",
                (0.15, 42000.0, 0.0),
                (0.10, 45000.0, 0.0),
            ),
            demo_asset(
                "demo_6",
                AssetType::Crypto,
                "BINANCE:ETHUSDT",
                "Ethereum",
                (2.5, 2800.0, 0.0),
                (1.8, 3000.0, 0.0),
            ),
            demo_asset(
                "demo_7",
                AssetType::Metal,
                "gold",
                "Gold",
                (10.0, 1800.0, 0.0),
                (8.0, 1850.0, 0.0),
            )
            .with_unit("oz"),
            demo_asset(
                "demo_8",
                AssetType::Metal,
                "silver",
                "Silver",
                (100.0, 22.0, 0.0),
                (50.0, 24.0, 0.0),
            )
            .with_unit("oz"),
            demo_asset(
                "demo_9",
                AssetType::Savings,
                "SAVINGS-USD",
                "High-Yield Savings Account",
                (15000.0, 1.0, 0.0),
                (12000.0, 1.0, 0.0),
            ),
            demo_asset(
                "demo_10",
                AssetType::Savings,
                "USD",
                "US Dollar Savings",
                (5000.0, 1.0, 0.0),
                (7500.0, 1.0, 0.0),
            ),
        ];

        // (type, symbol, price, previous, change %)
        let quotes = [
            (AssetType::Stock, "AAPL", 178.50, 176.20, 1.31),
            (AssetType::Stock, "MSFT", 415.20, 410.50, 1.15),
            (AssetType::Crypto, "BINANCE:BTCUSDT", 52500.00, 51000.00, 2.94),
            (AssetType::Crypto, "BINANCE:ETHUSDT", 3100.00, 3050.00, 1.64),
            (AssetType::Metal, "gold", 2050.00, 2040.00, 0.49),
            (AssetType::Metal, "silver", 25.50, 25.20, 1.19),
            (AssetType::Savings, "USD", 1.00, 1.00, 0.00),
        ];

        let mut price_cache = PriceCache::new();
        for (asset_type, symbol, price, previous, change) in quotes {
            price_cache.insert(
                &PriceKey::new(asset_type, symbol),
                PriceQuote {
                    price,
                    change_percent: Some(change),
                    previous_price: Some(previous),
                },
            );
        }
        price_cache.mark_updated(now_ms);

        Self {
            settings: Settings::default(),
            assets,
            price_cache,
            snapshots: Vec::new(),
        }
    }
}

fn demo_asset(
    id: &str,
    asset_type: AssetType,
    symbol: &str,
    name: &str,
    person_a: (f64, f64, f64),
    person_b: (f64, f64, f64),
) -> Asset {
    let holding = |(qty, avg_cost, dividend): (f64, f64, f64)| Holding {
        qty,
        avg_cost,
        dividend,
    };
    Asset::new(asset_type, symbol, name)
        .with_id(id)
        .with_holdings(Holdings::new(holding(person_a), holding(person_b)))
}
