pub mod ledger_service;
pub mod price_service;
pub mod search_service;
pub mod snapshot_service;
pub mod valuation_service;
