use serde::{Deserialize, Serialize};

use super::price::PriceKey;

/// The type/category of a tracked asset.
/// Determines which price provider is asked for market data.
///
/// Serialized as its lowercase name (`"stock"`, `"crypto"`, ...). Names this
/// version does not know are kept verbatim in [`AssetType::Other`] so that
/// they survive an import/export round trip; such assets are never priced
/// and never bucketed by type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetType {
    /// Stocks / equities (AAPL, MSFT, ...), priced by Finnhub
    Stock,
    /// Crypto pairs in `EXCHANGE:PAIR` form (BINANCE:BTCUSDT), priced by Finnhub
    Crypto,
    /// Precious metals by metals.dev name (gold, silver, ...)
    Metal,
    /// Cash savings; the quantity is the money amount, price is always 1.0
    Savings,
    /// Any type name not recognised by this version
    Other(String),
}

impl AssetType {
    /// The four types every breakdown is computed for, in display order.
    pub const KNOWN: [AssetType; 4] = [
        AssetType::Stock,
        AssetType::Crypto,
        AssetType::Metal,
        AssetType::Savings,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            AssetType::Stock => "stock",
            AssetType::Crypto => "crypto",
            AssetType::Metal => "metal",
            AssetType::Savings => "savings",
            AssetType::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AssetType::Other(_))
    }
}

impl From<String> for AssetType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stock" => AssetType::Stock,
            "crypto" => AssetType::Crypto,
            "metal" => AssetType::Metal,
            "savings" => AssetType::Savings,
            _ => AssetType::Other(value),
        }
    }
}

impl From<&str> for AssetType {
    fn from(value: &str) -> Self {
        AssetType::from(value.to_string())
    }
}

impl From<AssetType> for String {
    fn from(value: AssetType) -> Self {
        match value {
            AssetType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two tracked people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Person {
    A,
    B,
}

impl Person {
    pub const BOTH: [Person; 2] = [Person::A, Person::B];

    /// Position of this person in [`crate::models::settings::Participants`].
    pub fn index(self) -> usize {
        match self {
            Person::A => 0,
            Person::B => 1,
        }
    }
}

/// A single person's position in an asset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    /// Units held (money amount for savings)
    #[serde(default)]
    pub qty: f64,

    /// Average cost per unit
    #[serde(default)]
    pub avg_cost: f64,

    /// Yearly dividend received (stocks only)
    #[serde(default)]
    pub dividend: f64,
}

impl Holding {
    pub fn new(qty: f64) -> Self {
        Self {
            qty,
            ..Self::default()
        }
    }
}

/// Both people's holdings of one asset. Stored as `p1` / `p2` in the state blob.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Holdings {
    #[serde(rename = "p1", default)]
    pub person_a: Holding,

    #[serde(rename = "p2", default)]
    pub person_b: Holding,
}

impl Holdings {
    pub fn new(person_a: Holding, person_b: Holding) -> Self {
        Self { person_a, person_b }
    }

    pub fn get(&self, person: Person) -> &Holding {
        match person {
            Person::A => &self.person_a,
            Person::B => &self.person_b,
        }
    }

    pub fn get_mut(&mut self, person: Person) -> &mut Holding {
        match person {
            Person::A => &mut self.person_a,
            Person::B => &mut self.person_b,
        }
    }

    /// Combined quantity across both people.
    pub fn total_qty(&self) -> f64 {
        self.person_a.qty + self.person_b.qty
    }
}

/// A tracked holding (stock, crypto pair, metal or savings account).
///
/// The price cache is keyed by `(asset_type, symbol)`, so two assets with the
/// same type and symbol share one cached price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Unique identifier within the ledger
    pub id: String,

    #[serde(rename = "type")]
    pub asset_type: AssetType,

    /// Provider symbol as entered (AAPL, BINANCE:BTCUSDT, gold, USD)
    pub symbol: String,

    /// Display name (Apple Inc., Bitcoin, Gold, ...)
    pub name: String,

    /// Unit label for metals (oz, g)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default)]
    pub holdings: Holdings,
}

impl Asset {
    /// Create an asset with a freshly generated id and empty holdings.
    pub fn new(asset_type: AssetType, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: generate_asset_id(),
            asset_type,
            symbol: symbol.into().trim().to_string(),
            name: name.into().trim().to_string(),
            unit: None,
            holdings: Holdings::default(),
        }
    }

    /// Convenience constructors for the known asset types
    pub fn stock(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(AssetType::Stock, symbol, name)
    }

    pub fn crypto(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(AssetType::Crypto, symbol, name)
    }

    pub fn metal(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(AssetType::Metal, symbol, name)
    }

    pub fn savings(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(AssetType::Savings, symbol, name)
    }

    /// Replace the generated id (used for imported or demo data).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set both people's quantities, leaving cost and dividends untouched.
    pub fn with_quantities(mut self, person_a: f64, person_b: f64) -> Self {
        self.holdings.person_a.qty = person_a;
        self.holdings.person_b.qty = person_b;
        self
    }

    pub fn with_holdings(mut self, holdings: Holdings) -> Self {
        self.holdings = holdings;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// The key this asset's price is cached under.
    pub fn price_key(&self) -> PriceKey {
        PriceKey::new(self.asset_type.clone(), self.symbol.clone())
    }
}

/// Generate a new unique asset id (`asset_<uuid>`).
pub fn generate_asset_id() -> String {
    format!("asset_{}", uuid::Uuid::new_v4().simple())
}
