use serde::{Deserialize, Serialize};

use super::asset::{AssetType, Person};

/// One person's slice of an asset's value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonValue {
    pub qty: f64,
    pub value: f64,
}

/// Value of a single asset at the current cached price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetValuation {
    /// Price used (0 when no price is cached, 1.0 for savings)
    pub price: f64,
    pub person_a: PersonValue,
    pub person_b: PersonValue,
    /// `person_a.value + person_b.value`
    pub combined: f64,
}

impl AssetValuation {
    pub fn person(&self, person: Person) -> &PersonValue {
        match person {
            Person::A => &self.person_a,
            Person::B => &self.person_b,
        }
    }
}

/// Value bucketed by the four known asset types.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TypeBreakdown {
    pub stock: f64,
    pub crypto: f64,
    pub metal: f64,
    pub savings: f64,
}

impl TypeBreakdown {
    /// Bucket value for `asset_type`; unknown types always read 0.
    pub fn get(&self, asset_type: &AssetType) -> f64 {
        match asset_type {
            AssetType::Stock => self.stock,
            AssetType::Crypto => self.crypto,
            AssetType::Metal => self.metal,
            AssetType::Savings => self.savings,
            AssetType::Other(_) => 0.0,
        }
    }

    /// Add `value` to the bucket of `asset_type`. Unknown types are ignored.
    pub fn add(&mut self, asset_type: &AssetType, value: f64) {
        let bucket = match asset_type {
            AssetType::Stock => &mut self.stock,
            AssetType::Crypto => &mut self.crypto,
            AssetType::Metal => &mut self.metal,
            AssetType::Savings => &mut self.savings,
            AssetType::Other(_) => return,
        };
        *bucket += value;
    }

    pub fn sum(&self) -> f64 {
        self.stock + self.crypto + self.metal + self.savings
    }
}

/// A value total with the dividends attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueTotal {
    pub value: f64,
    pub dividend: f64,
}

/// Aggregate totals over the whole ledger. Always computed fresh.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsReport {
    pub person_a: ValueTotal,
    pub person_b: ValueTotal,
    /// `person_a + person_b`
    pub combined: ValueTotal,
    pub by_type: TypeBreakdown,
    pub person_a_by_type: TypeBreakdown,
    pub person_b_by_type: TypeBreakdown,
}

impl TotalsReport {
    pub fn person(&self, person: Person) -> &ValueTotal {
        match person {
            Person::A => &self.person_a,
            Person::B => &self.person_b,
        }
    }

    pub fn person_by_type(&self, person: Person) -> &TypeBreakdown {
        match person {
            Person::A => &self.person_a_by_type,
            Person::B => &self.person_b_by_type,
        }
    }

    /// Share of the combined value held in `asset_type`, in percent.
    pub fn type_percent(&self, asset_type: &AssetType) -> f64 {
        percent_of(self.by_type.get(asset_type), self.combined.value)
    }

    /// Share of the combined value held by `person`, in percent.
    pub fn person_percent(&self, person: Person) -> f64 {
        percent_of(self.person(person).value, self.combined.value)
    }

    /// Share of the combined value represented by an arbitrary slice, in percent.
    pub fn percent_of_portfolio(&self, slice: f64) -> f64 {
        percent_of(slice, self.combined.value)
    }
}

/// `slice / total * 100`, or 0 when `total` is zero (never NaN or infinite).
pub fn percent_of(slice: f64, total: f64) -> f64 {
    if total == 0.0 || !total.is_finite() {
        0.0
    } else {
        slice / total * 100.0
    }
}

/// Direction of a day change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

/// Day-change classification of one cached price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayChange {
    pub direction: Direction,
    /// Provider-reported change in percent, 0 when unknown
    pub percent: f64,
}

impl DayChange {
    pub fn flat() -> Self {
        Self {
            direction: Direction::Flat,
            percent: 0.0,
        }
    }

    /// Classify a provider change percent; missing, zero and NaN are all flat.
    pub fn from_percent(percent: Option<f64>) -> Self {
        match percent {
            Some(p) if p > 0.0 => Self {
                direction: Direction::Up,
                percent: p,
            },
            Some(p) if p < 0.0 => Self {
                direction: Direction::Down,
                percent: p,
            },
            _ => Self::flat(),
        }
    }
}

/// Columns the holdings table can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    /// Case-insensitive display name
    Name,
    /// Type name, lexicographic
    Type,
    /// Day change percent of the cached price (not the price itself)
    Price,
    /// Combined value of both people
    Combined,
}

/// Current sort selection. Selecting the active column again flips the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: Option<SortColumn>,
    pub ascending: bool,
}

impl SortState {
    pub fn new(column: SortColumn, ascending: bool) -> Self {
        Self {
            column: Some(column),
            ascending,
        }
    }

    pub fn select(&mut self, column: SortColumn) {
        if self.column == Some(column) {
            self.ascending = !self.ascending;
        } else {
            self.column = Some(column);
            self.ascending = true;
        }
    }
}

/// Table filter: optional type plus a case-insensitive search on name or symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    pub asset_type: Option<AssetType>,
    pub search: String,
}

impl AssetFilter {
    pub fn by_type(asset_type: AssetType) -> Self {
        Self {
            asset_type: Some(asset_type),
            search: String::new(),
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self {
            asset_type: None,
            search: query.into(),
        }
    }
}

/// An asset ranked by its day change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performer {
    pub asset_id: String,
    pub name: String,
    pub symbol: String,
    pub asset_type: AssetType,
    pub price: f64,
    pub change_percent: f64,
    pub quantity: f64,
    pub value: f64,
}

/// Side-by-side metrics for one asset in a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetComparison {
    pub asset_id: String,
    pub name: String,
    pub symbol: String,
    pub asset_type: AssetType,
    pub price: f64,
    /// Change vs the previously cached price; `None` when unknown or unchanged
    pub price_change_percent: Option<f64>,
    pub total_qty: f64,
    pub person_a_qty: f64,
    pub person_b_qty: f64,
    pub total_value: f64,
    pub portfolio_percent: f64,
}
