pub mod asset;
pub mod portfolio;
pub mod price;
pub mod settings;
pub mod snapshot;
pub mod valuation;
