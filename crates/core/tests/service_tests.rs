// ═══════════════════════════════════════════════════════════════════
// Service Tests: ValuationService, SnapshotService, LedgerService,
// PriceService, SearchService
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use portfolio_tracker_core::config::RefreshConfig;
use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::asset::{Asset, AssetType, Holding, Holdings, Person};
use portfolio_tracker_core::models::portfolio::PortfolioState;
use portfolio_tracker_core::models::price::{PriceCache, PriceData, PriceKey, PriceQuote};
use portfolio_tracker_core::models::snapshot::Snapshot;
use portfolio_tracker_core::models::valuation::{AssetFilter, Direction, SortColumn, SortState};
use portfolio_tracker_core::providers::registry::PriceProviderRegistry;
use portfolio_tracker_core::providers::traits::{PriceProvider, SymbolMatch, SymbolSearch};
use portfolio_tracker_core::services::ledger_service::{
    adjust_quantity, LedgerService, QuantityAdjustment,
};
use portfolio_tracker_core::services::price_service::{
    NoPacer, Pacer, PriceService, RefreshReport,
};
use portfolio_tracker_core::services::search_service::{
    filter_matches, SearchService, MAX_SUGGESTIONS,
};
use portfolio_tracker_core::services::snapshot_service::SnapshotService;
use portfolio_tracker_core::services::valuation_service::ValuationService;

// ═══════════════════════════════════════════════════════════════════
// Mock Providers
// ═══════════════════════════════════════════════════════════════════

/// Scripted answer for one symbol.
#[derive(Clone)]
enum Reply {
    Quote(PriceData),
    RateLimited,
    Fail,
}

/// A provider answering from a fixed script and counting its calls.
struct ScriptedProvider {
    types: Vec<AssetType>,
    replies: HashMap<String, Reply>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(types: Vec<AssetType>) -> Self {
        Self {
            types,
            replies: HashMap::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn reply(mut self, symbol: &str, reply: Reply) -> Self {
        self.replies.insert(symbol.to_string(), reply);
        self
    }

    fn quote(self, symbol: &str, price: f64, change: f64) -> Self {
        self.reply(
            symbol,
            Reply::Quote(PriceData::Quote(PriceQuote {
                price,
                change_percent: Some(change),
                previous_price: Some(price),
            })),
        )
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        self.types.clone()
    }

    async fn fetch_quote(&self, symbol: &str, _currency: &str) -> Result<PriceData, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.replies.get(symbol) {
            Some(Reply::Quote(data)) => Ok(*data),
            Some(Reply::RateLimited) => Err(CoreError::RateLimited {
                provider: "Scripted".into(),
            }),
            Some(Reply::Fail) | None => Err(CoreError::Api {
                provider: "Scripted".into(),
                message: format!("No quote data for symbol {symbol}"),
            }),
        }
    }
}

/// Records every requested pause instead of sleeping.
#[derive(Default)]
struct RecordingPacer {
    pauses: std::sync::Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

/// Drives a future to completion on the current thread without any runtime.
fn block_on<F: std::future::Future>(future: F) -> F::Output {
    use std::task::{Context, Poll, Wake, Waker};

    struct ThreadWaker(std::thread::Thread);

    impl Wake for ThreadWaker {
        fn wake(self: Arc<Self>) {
            self.0.unpark();
        }
    }

    let waker = Waker::from(Arc::new(ThreadWaker(std::thread::current())));
    let mut cx = Context::from_waker(&waker);
    let mut future = std::pin::pin!(future);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => std::thread::park(),
        }
    }
}

struct FixedSearch {
    results: Vec<SymbolMatch>,
    calls: AtomicUsize,
}

impl FixedSearch {
    fn new(symbols: &[&str]) -> Self {
        Self {
            results: symbols
                .iter()
                .map(|s| SymbolMatch {
                    symbol: s.to_string(),
                    description: format!("{s} description"),
                })
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SymbolSearch for FixedSearch {
    fn name(&self) -> &str {
        "FixedSearch"
    }

    async fn search(&self, _query: &str) -> Result<Vec<SymbolMatch>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn key(asset_type: AssetType, symbol: &str) -> PriceKey {
    PriceKey::new(asset_type, symbol)
}

fn cache_with(entries: &[(AssetType, &str, f64, Option<f64>)]) -> PriceCache {
    let mut cache = PriceCache::new();
    for (asset_type, symbol, price, change) in entries {
        cache.insert(
            &key(asset_type.clone(), *symbol),
            PriceQuote {
                price: *price,
                change_percent: *change,
                previous_price: None,
            },
        );
    }
    cache
}

fn stock(id: &str, symbol: &str, a: f64, b: f64) -> Asset {
    Asset::stock(symbol, format!("{symbol} Corp")).with_id(id).with_quantities(a, b)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn snapshot_with_change(total: f64, change_percent: f64) -> Snapshot {
    Snapshot {
        timestamp: 0,
        date: String::new(),
        total_value: total,
        change_from_previous: 0.0,
        change_percent_from_previous: change_percent,
        assets_up: 0,
        assets_down: 0,
        assets_unchanged: 0,
        total_assets: 1,
    }
}

// ═══════════════════════════════════════════════════════════════════
// ValuationService: values and totals
// ═══════════════════════════════════════════════════════════════════

mod valuation_totals {
    use super::*;

    #[test]
    fn single_stock_values_per_person() {
        let svc = ValuationService::new();
        let assets = vec![stock("x", "X", 10.0, 5.0)];
        let cache = cache_with(&[(AssetType::Stock, "X", 100.0, None)]);

        let totals = svc.totals(&assets, &cache);
        assert_eq!(totals.person_a.value, 1000.0);
        assert_eq!(totals.person_b.value, 500.0);
        assert_eq!(totals.combined.value, 1500.0);
        assert_eq!(totals.by_type.stock, 1500.0);
    }

    #[test]
    fn empty_ledger_is_all_zero() {
        let svc = ValuationService::new();
        let totals = svc.totals(&[], &PriceCache::new());

        assert_eq!(totals.combined.value, 0.0);
        assert_eq!(totals.person_percent(Person::A), 0.0);
        assert_eq!(totals.person_percent(Person::B), 0.0);
        for asset_type in AssetType::KNOWN {
            assert_eq!(totals.type_percent(&asset_type), 0.0);
        }
        assert_eq!(totals.percent_of_portfolio(123.0), 0.0);
    }

    #[test]
    fn combined_equals_sum_of_assets_and_people() {
        let svc = ValuationService::new();
        let assets = vec![
            stock("a", "AAPL", 25.0, 15.0),
            Asset::crypto("BINANCE:BTCUSDT", "Bitcoin").with_id("b").with_quantities(0.15, 0.1),
            Asset::metal("gold", "Gold").with_id("g").with_quantities(10.0, 8.0),
            Asset::savings("USD", "Cash").with_id("s").with_quantities(5000.0, 7500.0),
            stock("m", "MISSING", 3.0, 3.0),
        ];
        let cache = cache_with(&[
            (AssetType::Stock, "AAPL", 178.5, Some(1.31)),
            (AssetType::Crypto, "BINANCE:BTCUSDT", 52500.0, Some(2.94)),
            (AssetType::Metal, "gold", 2050.0, Some(0.49)),
        ]);

        let totals = svc.totals(&assets, &cache);
        let per_asset: f64 = assets.iter().map(|a| svc.value_of(a, &cache).combined).sum();

        assert!(approx(totals.combined.value, per_asset));
        assert!(approx(
            totals.combined.value,
            totals.person_a.value + totals.person_b.value
        ));
        assert!(approx(totals.by_type.sum(), totals.combined.value));
        assert!(approx(
            totals.person_a_by_type.sum() + totals.person_b_by_type.sum(),
            totals.combined.value
        ));
    }

    #[test]
    fn unpriced_asset_is_worth_zero() {
        let svc = ValuationService::new();
        let asset = stock("m", "MISSING", 3.0, 3.0);
        let valuation = svc.value_of(&asset, &PriceCache::new());
        assert_eq!(valuation.price, 0.0);
        assert_eq!(valuation.combined, 0.0);
    }

    #[test]
    fn savings_value_equals_quantity_whatever_the_cache_says() {
        let svc = ValuationService::new();
        let asset = Asset::savings("USD", "Cash").with_quantities(1200.0, 300.0);
        let cache = cache_with(&[(AssetType::Savings, "USD", 3.7, Some(5.0))]);

        let valuation = svc.value_of(&asset, &cache);
        assert_eq!(valuation.price, 1.0);
        assert_eq!(valuation.person_a.value, 1200.0);
        assert_eq!(valuation.person_b.value, 300.0);
        assert_eq!(valuation.combined, 1500.0);
    }

    #[test]
    fn dividends_are_summed_per_person() {
        let svc = ValuationService::new();
        let asset = Asset::stock("JNJ", "Johnson & Johnson").with_holdings(Holdings::new(
            Holding {
                qty: 40.0,
                avg_cost: 155.0,
                dividend: 120.0,
            },
            Holding {
                qty: 35.0,
                avg_cost: 160.0,
                dividend: 105.0,
            },
        ));
        let totals = svc.totals(&[asset], &PriceCache::new());
        assert_eq!(totals.person_a.dividend, 120.0);
        assert_eq!(totals.person_b.dividend, 105.0);
        assert_eq!(totals.combined.dividend, 225.0);
    }

    #[test]
    fn unknown_type_counts_for_people_but_not_types() {
        let svc = ValuationService::new();
        let bond = Asset::new(AssetType::Other("bond".into()), "T10", "Treasury")
            .with_quantities(2.0, 0.0);
        let cache = cache_with(&[(AssetType::Other("bond".into()), "T10", 50.0, None)]);

        let totals = svc.totals(&[bond], &cache);
        assert_eq!(totals.person_a.value, 100.0);
        assert_eq!(totals.combined.value, 100.0);
        assert_eq!(totals.by_type.sum(), 0.0);
    }

    #[test]
    fn type_and_person_percentages() {
        let svc = ValuationService::new();
        let assets = vec![
            stock("x", "X", 10.0, 0.0),
            Asset::savings("USD", "Cash").with_quantities(0.0, 1000.0),
        ];
        let cache = cache_with(&[(AssetType::Stock, "X", 300.0, None)]);

        let totals = svc.totals(&assets, &cache);
        assert_eq!(totals.combined.value, 4000.0);
        assert_eq!(totals.type_percent(&AssetType::Stock), 75.0);
        assert_eq!(totals.type_percent(&AssetType::Savings), 25.0);
        assert_eq!(totals.person_percent(Person::A), 75.0);
        assert_eq!(totals.person_by_type(Person::B).savings, 1000.0);
    }

    #[test]
    fn change_direction_from_cache() {
        let svc = ValuationService::new();
        let cache = cache_with(&[
            (AssetType::Stock, "UP", 1.0, Some(2.5)),
            (AssetType::Stock, "DOWN", 1.0, Some(-0.5)),
            (AssetType::Stock, "FLAT", 1.0, Some(0.0)),
        ]);
        let direction =
            |symbol: &str| svc.change_of(&cache, &key(AssetType::Stock, symbol)).direction;
        assert_eq!(direction("UP"), Direction::Up);
        assert_eq!(direction("DOWN"), Direction::Down);
        assert_eq!(direction("FLAT"), Direction::Flat);
        assert_eq!(direction("NONE"), Direction::Flat);
    }
}

// ═══════════════════════════════════════════════════════════════════
// ValuationService: filter, sort, rankings, compare
// ═══════════════════════════════════════════════════════════════════

mod valuation_views {
    use super::*;

    fn ledger() -> Vec<Asset> {
        vec![
            Asset::stock("BNN", "banana").with_id("1").with_quantities(1.0, 0.0),
            Asset::stock("APL", "Apple").with_id("2").with_quantities(10.0, 0.0),
            Asset::crypto("BINANCE:CHRUSDT", "Cherry").with_id("3").with_quantities(5.0, 5.0),
        ]
    }

    fn prices() -> PriceCache {
        cache_with(&[
            (AssetType::Stock, "BNN", 100.0, Some(5.0)),
            (AssetType::Stock, "APL", 50.0, Some(-2.0)),
        ])
    }

    fn ids(assets: &[&Asset]) -> Vec<String> {
        assets.iter().map(|a| a.id.clone()).collect()
    }

    #[test]
    fn filter_by_type() {
        let svc = ValuationService::new();
        let assets = ledger();
        let crypto = svc.filter(&assets, &AssetFilter::by_type(AssetType::Crypto));
        assert_eq!(ids(&crypto), vec!["3"]);
    }

    #[test]
    fn filter_by_search_matches_name_or_symbol() {
        let svc = ValuationService::new();
        let assets = ledger();
        assert_eq!(ids(&svc.filter(&assets, &AssetFilter::search("APP"))), vec!["2"]);
        assert_eq!(ids(&svc.filter(&assets, &AssetFilter::search("chrusdt"))), vec!["3"]);
        assert_eq!(svc.filter(&assets, &AssetFilter::search("  ")).len(), 3);
    }

    #[test]
    fn filter_combines_type_and_search() {
        let svc = ValuationService::new();
        let assets = ledger();
        let filter = AssetFilter {
            asset_type: Some(AssetType::Stock),
            search: "cherry".into(),
        };
        assert!(svc.filter(&assets, &filter).is_empty());
    }

    #[test]
    fn no_sort_column_keeps_ledger_order() {
        let svc = ValuationService::new();
        let assets = ledger();
        let mut view: Vec<&Asset> = assets.iter().collect();
        svc.sort(&mut view, &SortState::default(), &prices());
        assert_eq!(ids(&view), vec!["1", "2", "3"]);
    }

    #[test]
    fn sort_by_name_is_case_insensitive() {
        let svc = ValuationService::new();
        let assets = ledger();
        let mut view: Vec<&Asset> = assets.iter().collect();
        svc.sort(&mut view, &SortState::new(SortColumn::Name, true), &prices());
        assert_eq!(ids(&view), vec!["2", "1", "3"]);
    }

    #[test]
    fn sort_by_type() {
        let svc = ValuationService::new();
        let assets = ledger();
        let mut view: Vec<&Asset> = assets.iter().collect();
        svc.sort(&mut view, &SortState::new(SortColumn::Type, true), &prices());
        // crypto < stock; the two stocks keep their ledger order
        assert_eq!(ids(&view), vec!["3", "1", "2"]);
    }

    #[test]
    fn sort_by_price_orders_by_day_change() {
        let svc = ValuationService::new();
        let assets = ledger();
        let mut view: Vec<&Asset> = assets.iter().collect();
        svc.sort(&mut view, &SortState::new(SortColumn::Price, true), &prices());
        // -2% (APL), missing treated as 0 (cherry), +5% (BNN)
        assert_eq!(ids(&view), vec!["2", "3", "1"]);
    }

    #[test]
    fn sort_by_combined_descending() {
        let svc = ValuationService::new();
        let assets = ledger();
        let mut view: Vec<&Asset> = assets.iter().collect();
        svc.sort(&mut view, &SortState::new(SortColumn::Combined, false), &prices());
        // APL 500, BNN 100, cherry 0
        assert_eq!(ids(&view), vec!["2", "1", "3"]);
    }

    #[test]
    fn performers_need_price_and_change() {
        let svc = ValuationService::new();
        let assets = ledger();
        let performers = svc.performers(&assets, &prices());
        let symbols: Vec<&str> = performers.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BNN", "APL"]);
        assert_eq!(performers[1].value, 500.0);
        assert_eq!(performers[1].quantity, 10.0);
    }

    #[test]
    fn top_and_bottom_performers() {
        let svc = ValuationService::new();
        let assets = vec![
            stock("a", "A", 1.0, 0.0),
            stock("b", "B", 1.0, 0.0),
            stock("c", "C", 1.0, 0.0),
        ];
        let cache = cache_with(&[
            (AssetType::Stock, "A", 10.0, Some(1.0)),
            (AssetType::Stock, "B", 10.0, Some(3.0)),
            (AssetType::Stock, "C", 10.0, Some(-4.0)),
        ]);

        let top: Vec<String> = svc
            .top_performers(&assets, &cache, 2)
            .into_iter()
            .map(|p| p.symbol)
            .collect();
        assert_eq!(top, vec!["B", "A"]);
        let bottom: Vec<String> = svc
            .bottom_performers(&assets, &cache, 1)
            .into_iter()
            .map(|p| p.symbol)
            .collect();
        assert_eq!(bottom, vec!["C"]);
    }

    #[test]
    fn best_and_worst_first_occurrence_wins_ties() {
        let svc = ValuationService::new();
        let assets = vec![
            stock("a", "A", 1.0, 0.0),
            stock("b", "B", 1.0, 0.0),
            stock("c", "C", 1.0, 0.0),
            stock("d", "D", 1.0, 0.0),
        ];
        let cache = cache_with(&[
            (AssetType::Stock, "A", 10.0, Some(2.0)),
            (AssetType::Stock, "B", 10.0, Some(2.0)),
            (AssetType::Stock, "C", 10.0, Some(-1.0)),
            (AssetType::Stock, "D", 10.0, Some(-1.0)),
        ]);

        assert_eq!(svc.best_performer(&assets, &cache).unwrap().asset_id, "a");
        assert_eq!(svc.worst_performer(&assets, &cache).unwrap().asset_id, "c");
    }

    #[test]
    fn best_performer_none_without_changes() {
        let svc = ValuationService::new();
        assert!(svc.best_performer(&ledger(), &PriceCache::new()).is_none());
    }

    #[test]
    fn compare_two_assets() {
        let svc = ValuationService::new();
        let assets = vec![
            stock("a", "X", 10.0, 5.0),
            Asset::savings("USD", "Cash").with_id("s").with_quantities(250.0, 250.0),
        ];
        let mut cache = PriceCache::new();
        cache.insert(
            &key(AssetType::Stock, "X"),
            PriceQuote {
                price: 100.0,
                change_percent: Some(1.0),
                previous_price: Some(80.0),
            },
        );

        let rows = svc.compare(&assets, &cache, &["s", "a"]).unwrap();
        assert_eq!(rows.len(), 2);

        let cash = &rows[0];
        assert_eq!(cash.asset_id, "s");
        assert_eq!(cash.price, 1.0);
        assert_eq!(cash.price_change_percent, None);
        assert_eq!(cash.total_value, 500.0);
        assert_eq!(cash.portfolio_percent, 25.0);

        let x = &rows[1];
        assert_eq!(x.total_qty, 15.0);
        assert_eq!(x.person_a_qty, 10.0);
        assert_eq!(x.person_b_qty, 5.0);
        assert_eq!(x.total_value, 1500.0);
        assert_eq!(x.portfolio_percent, 75.0);
        assert!(approx(x.price_change_percent.unwrap(), 25.0));
    }

    #[test]
    fn compare_unchanged_price_has_no_change() {
        let svc = ValuationService::new();
        let assets = vec![stock("a", "X", 1.0, 0.0), stock("b", "Y", 1.0, 0.0)];
        let mut cache = PriceCache::new();
        cache.insert(
            &key(AssetType::Stock, "X"),
            PriceQuote {
                price: 10.0,
                change_percent: Some(0.0),
                previous_price: Some(10.0),
            },
        );
        let rows = svc.compare(&assets, &cache, &["a", "b"]).unwrap();
        assert_eq!(rows[0].price_change_percent, None);
        assert_eq!(rows[1].price, 0.0);
    }

    #[test]
    fn compare_requires_two_to_three_ids() {
        let svc = ValuationService::new();
        let assets = ledger();
        let cache = prices();
        assert!(matches!(
            svc.compare(&assets, &cache, &["1"]),
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            svc.compare(&assets, &cache, &["1", "2", "3", "1"]),
            Err(CoreError::ValidationError(_))
        ));
        assert_eq!(svc.compare(&assets, &cache, &["1", "2", "3"]).unwrap().len(), 3);
    }

    #[test]
    fn compare_unknown_id_fails() {
        let svc = ValuationService::new();
        let result = svc.compare(&ledger(), &prices(), &["1", "nope"]);
        assert!(matches!(result, Err(CoreError::AssetNotFound(id)) if id == "nope"));
    }
}

// ═══════════════════════════════════════════════════════════════════
// SnapshotService
// ═══════════════════════════════════════════════════════════════════

mod snapshots {
    use super::*;

    fn x_at(price: f64) -> PriceCache {
        cache_with(&[(AssetType::Stock, "X", price, Some(0.0))])
    }

    #[test]
    fn first_snapshot_has_zero_delta() {
        let svc = SnapshotService::new();
        let assets = vec![stock("x", "X", 10.0, 0.0)];
        let mut history = Vec::new();

        let saved = svc
            .save(&assets, &x_at(100.0), &mut history, 1_000, |_| true)
            .unwrap()
            .unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(saved.total_value, 1000.0);
        assert_eq!(saved.change_from_previous, 0.0);
        assert_eq!(saved.change_percent_from_previous, 0.0);
        assert_eq!(saved.timestamp, 1_000);
        assert_eq!(saved.date, "1970-01-01T00:00:01.000Z");
        assert_eq!(saved.total_assets, 1);
    }

    #[test]
    fn delta_against_previous_snapshot() {
        let svc = SnapshotService::new();
        let assets = vec![stock("x", "X", 10.0, 0.0)];
        let mut history = Vec::new();

        svc.save(&assets, &x_at(100.0), &mut history, 1, |_| true).unwrap();
        let second = svc
            .save(&assets, &x_at(110.0), &mut history, 2, |_| true)
            .unwrap()
            .unwrap();

        assert_eq!(second.total_value, 1100.0);
        assert_eq!(second.change_from_previous, 100.0);
        assert!(approx(second.change_percent_from_previous, 10.0));
    }

    #[test]
    fn zero_baseline_gives_zero_percent() {
        let svc = SnapshotService::new();
        let assets = vec![stock("x", "X", 10.0, 0.0)];
        let mut history = vec![snapshot_with_change(0.0, 0.0)];

        let pending = svc.prepare(&assets, &x_at(5.0), &history, 3).unwrap();
        assert_eq!(pending.snapshot.change_from_previous, 50.0);
        assert_eq!(pending.snapshot.change_percent_from_previous, 0.0);

        pending.commit(&mut history);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn empty_price_cache_fails_and_keeps_history() {
        let svc = SnapshotService::new();
        let assets = vec![stock("x", "X", 10.0, 0.0)];
        let mut history = vec![snapshot_with_change(10.0, 0.0)];

        let result = svc.save(&assets, &PriceCache::new(), &mut history, 1, |_| true);
        assert!(matches!(result, Err(CoreError::NoPriceData)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn empty_ledger_fails() {
        let svc = SnapshotService::new();
        let result = svc.prepare(&[], &x_at(1.0), &[], 1);
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn missing_prices_ask_for_confirmation() {
        let svc = SnapshotService::new();
        let assets = vec![stock("x", "X", 10.0, 0.0), stock("y", "NOPRICE", 3.0, 0.0)];
        let mut history = Vec::new();

        let pending = svc.prepare(&assets, &x_at(100.0), &history, 1).unwrap();
        let warning = pending.warning().unwrap();
        assert_eq!(warning.assets_missing_price, 1);
        assert_eq!(warning.total_value, 1000.0);

        let mut asked = false;
        let declined = svc
            .save(&assets, &x_at(100.0), &mut history, 1, |w| {
                asked = true;
                assert_eq!(w.assets_missing_price, 1);
                false
            })
            .unwrap();
        assert!(asked);
        assert!(declined.is_none());
        assert!(history.is_empty());

        let accepted = svc
            .save(&assets, &x_at(100.0), &mut history, 1, |_| true)
            .unwrap();
        assert_eq!(accepted.unwrap().total_value, 1000.0);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn no_confirmation_when_everything_is_priced() {
        let svc = SnapshotService::new();
        let assets = vec![
            stock("x", "X", 1.0, 0.0),
            Asset::savings("USD", "Cash").with_quantities(10.0, 0.0),
        ];
        let mut history = Vec::new();
        let saved = svc
            .save(&assets, &x_at(100.0), &mut history, 1, |_| panic!("should not ask"))
            .unwrap();
        assert_eq!(saved.unwrap().total_value, 110.0);
    }

    #[test]
    fn counts_up_down_unchanged() {
        let svc = SnapshotService::new();
        let assets = vec![
            stock("a", "A", 1.0, 0.0),
            stock("b", "B", 1.0, 0.0),
            stock("c", "C", 1.0, 0.0),
            stock("d", "D", 1.0, 0.0),
        ];
        let cache = cache_with(&[
            (AssetType::Stock, "A", 1.0, Some(1.0)),
            (AssetType::Stock, "B", 1.0, Some(-1.0)),
            (AssetType::Stock, "C", 1.0, Some(0.0)),
        ]);

        let snapshot = svc.prepare(&assets, &cache, &[], 1).unwrap().snapshot;
        assert_eq!(snapshot.assets_up, 1);
        assert_eq!(snapshot.assets_down, 1);
        assert_eq!(snapshot.assets_unchanged, 2);
        assert_eq!(snapshot.total_assets, 4);
    }

    #[test]
    fn deleting_keeps_other_deltas() {
        let svc = SnapshotService::new();
        let assets = vec![stock("x", "X", 10.0, 0.0)];
        let mut history = Vec::new();
        for (t, price) in [(1, 100.0), (2, 120.0), (3, 90.0), (4, 99.0)] {
            svc.save(&assets, &x_at(price), &mut history, t, |_| true).unwrap();
        }
        let before: Vec<(f64, f64)> = history
            .iter()
            .map(|s| (s.change_from_previous, s.change_percent_from_previous))
            .collect();

        let removed = svc.delete_at(&mut history, 1).unwrap();
        assert_eq!(removed.timestamp, 2);

        let after: Vec<(f64, f64)> = history
            .iter()
            .map(|s| (s.change_from_previous, s.change_percent_from_previous))
            .collect();
        assert_eq!(after, vec![before[0], before[2], before[3]]);
    }

    #[test]
    fn delete_out_of_range() {
        let svc = SnapshotService::new();
        let mut history = vec![snapshot_with_change(1.0, 0.0)];
        assert!(matches!(
            svc.delete_at(&mut history, 1),
            Err(CoreError::SnapshotNotFound(1))
        ));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn clear_returns_count() {
        let svc = SnapshotService::new();
        let mut history = vec![snapshot_with_change(1.0, 0.0), snapshot_with_change(2.0, 0.0)];
        assert_eq!(svc.clear(&mut history), 2);
        assert!(history.is_empty());
    }

    #[test]
    fn summary_of_empty_history_is_none() {
        assert!(SnapshotService::new().summarize(&[]).is_none());
    }

    #[test]
    fn summary_totals_and_extremes() {
        let svc = SnapshotService::new();
        let history = vec![
            snapshot_with_change(1000.0, 50.0),
            snapshot_with_change(1100.0, 10.0),
            snapshot_with_change(990.0, -10.0),
            snapshot_with_change(1089.0, 10.0),
            snapshot_with_change(980.1, -10.0),
        ];

        let summary = svc.summarize(&history).unwrap();
        assert_eq!(summary.snapshot_count, 5);
        assert_eq!(summary.first.total_value, 1000.0);
        assert_eq!(summary.current.total_value, 980.1);
        assert!(approx(summary.total_change, -19.9));
        assert!(approx(summary.total_change_percent, -1.99));
        // the first snapshot's +50% is not a candidate; ties keep the earliest
        assert_eq!(summary.best_day.unwrap().total_value, 1100.0);
        assert_eq!(summary.worst_day.unwrap().total_value, 990.0);
    }

    #[test]
    fn single_snapshot_summary_has_no_days() {
        let summary = SnapshotService::new()
            .summarize(&[snapshot_with_change(0.0, 0.0)])
            .unwrap();
        assert_eq!(summary.total_change_percent, 0.0);
        assert!(summary.best_day.is_none());
        assert!(summary.worst_day.is_none());
    }

    #[test]
    fn series_and_newest_first() {
        let svc = SnapshotService::new();
        let mut a = snapshot_with_change(10.0, 0.0);
        a.timestamp = 1;
        let mut b = snapshot_with_change(20.0, 0.0);
        b.timestamp = 2;
        let history = vec![a, b];

        let series = svc.series(&history);
        assert_eq!(series.len(), 2);
        assert_eq!((series[0].timestamp, series[0].value), (1, 10.0));

        let newest: Vec<usize> = svc.newest_first(&history).into_iter().map(|(i, _)| i).collect();
        assert_eq!(newest, vec![1, 0]);
    }
}

// ═══════════════════════════════════════════════════════════════════
// LedgerService
// ═══════════════════════════════════════════════════════════════════

mod ledger {
    use super::*;

    #[test]
    fn add_asset_appends() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        let id = svc.add_asset(&mut state, stock("a", "AAPL", 1.0, 2.0)).unwrap();
        assert_eq!(id, "a");
        assert_eq!(state.assets.len(), 1);
    }

    #[test]
    fn add_rejects_duplicate_id() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        svc.add_asset(&mut state, stock("a", "AAPL", 1.0, 0.0)).unwrap();
        let result = svc.add_asset(&mut state, stock("a", "MSFT", 1.0, 0.0));
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
        assert_eq!(state.assets.len(), 1);
    }

    #[test]
    fn add_rejects_blank_symbol_or_name() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        assert!(svc.add_asset(&mut state, Asset::stock("  ", "Name")).is_err());
        assert!(svc.add_asset(&mut state, Asset::stock("SYM", "")).is_err());
        assert!(state.assets.is_empty());
    }

    #[test]
    fn add_rejects_negative_or_nan_quantities() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        assert!(svc.add_asset(&mut state, stock("a", "A", -1.0, 0.0)).is_err());
        assert!(svc.add_asset(&mut state, stock("b", "B", 0.0, f64::NAN)).is_err());
        assert!(svc.add_asset(&mut state, stock("c", "C", 0.0, 0.0)).is_ok());
    }

    #[test]
    fn non_stocks_lose_dividends_and_non_metals_lose_units() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        let crypto = Asset::crypto("BINANCE:BTCUSDT", "Bitcoin")
            .with_id("c")
            .with_unit("coins")
            .with_holdings(Holdings::new(
                Holding {
                    qty: 1.0,
                    avg_cost: 0.0,
                    dividend: 12.0,
                },
                Holding::default(),
            ));
        svc.add_asset(&mut state, crypto).unwrap();
        let gold = Asset::metal("gold", "Gold").with_id("g").with_unit(" oz ");
        svc.add_asset(&mut state, gold).unwrap();

        let crypto = state.find_asset("c").unwrap();
        assert_eq!(crypto.holdings.person_a.dividend, 0.0);
        assert_eq!(crypto.unit, None);
        assert_eq!(state.find_asset("g").unwrap().unit.as_deref(), Some("oz"));
    }

    #[test]
    fn update_replaces_in_place() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        svc.add_asset(&mut state, stock("a", "AAPL", 1.0, 0.0)).unwrap();
        svc.add_asset(&mut state, stock("b", "MSFT", 1.0, 0.0)).unwrap();

        svc.update_asset(&mut state, stock("a", "AAPL", 7.0, 3.0)).unwrap();
        assert_eq!(state.assets[0].id, "a");
        assert_eq!(state.assets[0].holdings.total_qty(), 10.0);
    }

    #[test]
    fn update_unknown_fails() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        let result = svc.update_asset(&mut state, stock("zz", "AAPL", 1.0, 0.0));
        assert!(matches!(result, Err(CoreError::AssetNotFound(_))));
    }

    #[test]
    fn delete_removes_cached_price() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        state.price_cache = cache_with(&[(AssetType::Stock, "AAPL", 1.0, None)]);
        svc.add_asset(&mut state, stock("a", "AAPL", 1.0, 0.0)).unwrap();

        let removed = svc.delete_asset(&mut state, "a").unwrap();
        assert_eq!(removed.symbol, "AAPL");
        assert!(state.assets.is_empty());
        assert!(!state.price_cache.contains(&key(AssetType::Stock, "AAPL")));
    }

    #[test]
    fn delete_keeps_price_shared_with_another_asset() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        state.price_cache = cache_with(&[(AssetType::Stock, "AAPL", 1.0, None)]);
        svc.add_asset(&mut state, stock("a", "AAPL", 1.0, 0.0)).unwrap();
        svc.add_asset(&mut state, stock("b", "AAPL", 0.0, 2.0)).unwrap();

        svc.delete_asset(&mut state, "a").unwrap();
        assert!(state.price_cache.contains(&key(AssetType::Stock, "AAPL")));
    }

    #[test]
    fn delete_unknown_fails() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        assert!(matches!(
            svc.delete_asset(&mut state, "missing"),
            Err(CoreError::AssetNotFound(_))
        ));
    }

    #[test]
    fn delete_all_clears_cache_keeps_snapshots_and_settings() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::demo(5_000);
        state.snapshots.push(snapshot_with_change(1.0, 0.0));

        let removed = svc.delete_all(&mut state);
        assert_eq!(removed, 10);
        assert!(state.assets.is_empty());
        assert!(state.price_cache.is_empty());
        assert_eq!(state.price_cache.last_updated, 0);
        assert_eq!(state.snapshots.len(), 1);
        assert_eq!(state.settings.people.name(Person::A), "Dean");
    }

    #[test]
    fn quick_adjust() {
        assert_eq!(adjust_quantity(5.0, 2.5, QuantityAdjustment::Add).unwrap(), 7.5);
        assert_eq!(adjust_quantity(5.0, 2.0, QuantityAdjustment::Remove).unwrap(), 3.0);
        assert_eq!(adjust_quantity(5.0, 9.0, QuantityAdjustment::Remove).unwrap(), 0.0);
        assert!(adjust_quantity(5.0, 0.0, QuantityAdjustment::Add).is_err());
        assert!(adjust_quantity(5.0, -1.0, QuantityAdjustment::Remove).is_err());
    }

    #[test]
    fn adjust_holding_updates_one_person() {
        let svc = LedgerService::new();
        let mut state = PortfolioState::default();
        svc.add_asset(&mut state, stock("a", "AAPL", 4.0, 4.0)).unwrap();

        let qty = svc
            .adjust_holding(&mut state, "a", Person::B, 6.0, QuantityAdjustment::Remove)
            .unwrap();
        assert_eq!(qty, 0.0);
        assert_eq!(state.assets[0].holdings.person_a.qty, 4.0);
        assert_eq!(state.assets[0].holdings.person_b.qty, 0.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// PriceService: refresh with scripted providers
// ═══════════════════════════════════════════════════════════════════

mod price_refresh {
    use super::*;

    fn service_with(provider: Arc<ScriptedProvider>) -> PriceService {
        let mut registry = PriceProviderRegistry::new();
        registry.register(provider);
        PriceService::new(registry, RefreshConfig::immediate())
    }

    fn all_types() -> Vec<AssetType> {
        vec![AssetType::Stock, AssetType::Crypto, AssetType::Metal]
    }

    #[test]
    fn status_text() {
        let ok = RefreshReport {
            updated: 10,
            errors: 0,
            total: 10,
        };
        assert_eq!(ok.status_text(), "Updated 10/10 prices");
        let partial = RefreshReport {
            updated: 9,
            errors: 1,
            total: 10,
        };
        assert_eq!(partial.status_text(), "Updated 9/10 prices, Errors: 1");
    }

    #[tokio::test]
    async fn refresh_updates_every_type() {
        let provider = Arc::new(
            ScriptedProvider::new(all_types())
                .quote("AAPL", 178.5, 1.31)
                .quote("BINANCE:BTCUSDT", 52500.0, 2.94)
                .quote("gold", 2050.0, 0.49),
        );
        let svc = service_with(provider.clone());
        let assets = vec![
            stock("a", "AAPL", 1.0, 0.0),
            Asset::crypto("BINANCE:BTCUSDT", "Bitcoin").with_id("b"),
            Asset::metal("gold", "Gold").with_id("g"),
            Asset::savings("USD", "Cash").with_id("s"),
        ];
        let mut cache = PriceCache::new();

        let report = svc.refresh(&assets, &mut cache, "USD", 42_000).await.unwrap();

        assert_eq!(
            report,
            RefreshReport {
                updated: 4,
                errors: 0,
                total: 4
            }
        );
        assert_eq!(provider.calls(), 3);
        assert_eq!(cache.price(&key(AssetType::Stock, "AAPL")), Some(178.5));
        assert_eq!(cache.change_percent(&key(AssetType::Metal, "gold")), Some(0.49));
        assert_eq!(cache.price(&key(AssetType::Savings, "USD")), Some(1.0));
        assert_eq!(cache.change_percent(&key(AssetType::Savings, "USD")), Some(0.0));
        assert_eq!(cache.last_updated, 42_000);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_rest() {
        let provider = Arc::new(
            ScriptedProvider::new(all_types())
                .reply("BAD", Reply::Fail)
                .quote("GOOD", 10.0, 0.5),
        );
        let svc = service_with(provider.clone());
        let assets = vec![
            stock("1", "BAD", 1.0, 0.0),
            stock("2", "GOOD", 1.0, 0.0),
            Asset::savings("USD", "Cash").with_id("3"),
        ];
        let mut cache = PriceCache::new();

        let report = svc.refresh(&assets, &mut cache, "USD", 1).await.unwrap();
        assert_eq!(report.status_text(), "Updated 2/3 prices, Errors: 1");
        assert_eq!(provider.calls(), 2);
        assert!(!cache.contains(&key(AssetType::Stock, "BAD")));
        assert_eq!(cache.price(&key(AssetType::Stock, "GOOD")), Some(10.0));
    }

    #[tokio::test]
    async fn rate_limited_symbol_is_skipped() {
        let provider = Arc::new(
            ScriptedProvider::new(all_types())
                .reply("LIMITED", Reply::RateLimited)
                .quote("NEXT", 5.0, 0.0),
        );
        let svc = service_with(provider.clone());
        let assets = vec![stock("1", "LIMITED", 1.0, 0.0), stock("2", "NEXT", 1.0, 0.0)];
        let mut cache = PriceCache::new();

        let report = svc.refresh(&assets, &mut cache, "USD", 1).await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(provider.calls(), 2);
        assert_eq!(cache.price(&key(AssetType::Stock, "NEXT")), Some(5.0));
    }

    #[tokio::test]
    async fn invalid_prices_count_as_errors() {
        let provider = Arc::new(
            ScriptedProvider::new(all_types())
                .reply("ZERO", Reply::Quote(PriceData::Bare(0.0)))
                .reply("NAN", Reply::Quote(PriceData::Bare(f64::NAN)))
                .reply("NEG", Reply::Quote(PriceData::Bare(-4.0))),
        );
        let svc = service_with(provider);
        let assets = vec![
            stock("1", "ZERO", 1.0, 0.0),
            stock("2", "NAN", 1.0, 0.0),
            stock("3", "NEG", 1.0, 0.0),
        ];
        let mut cache = PriceCache::new();

        let report = svc.refresh(&assets, &mut cache, "USD", 1).await.unwrap();
        assert_eq!(report.errors, 3);
        assert_eq!(report.updated, 0);
        assert!(cache.is_empty());
        assert_eq!(cache.last_updated, 1);
    }

    #[tokio::test]
    async fn bare_numbers_are_normalized() {
        let provider = Arc::new(
            ScriptedProvider::new(all_types()).reply("X", Reply::Quote(PriceData::Bare(12.0))),
        );
        let svc = service_with(provider);
        let mut cache = PriceCache::new();
        svc.refresh(&[stock("x", "X", 1.0, 0.0)], &mut cache, "USD", 1)
            .await
            .unwrap();
        assert_eq!(cache.change_percent(&key(AssetType::Stock, "X")), Some(0.0));
    }

    #[tokio::test]
    async fn type_without_provider_counts_as_errors() {
        let provider = Arc::new(ScriptedProvider::new(vec![AssetType::Stock]).quote("X", 1.0, 0.0));
        let svc = service_with(provider);
        let assets = vec![
            stock("x", "X", 1.0, 0.0),
            Asset::metal("gold", "Gold").with_id("g"),
            Asset::new(AssetType::Other("bond".into()), "T10", "Treasury").with_id("t"),
        ];
        let mut cache = PriceCache::new();

        let report = svc.refresh(&assets, &mut cache, "USD", 1).await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.errors, 2);
        assert_eq!(report.total, 3);
    }

    #[tokio::test]
    async fn shared_symbols_are_fetched_once() {
        let provider = Arc::new(ScriptedProvider::new(all_types()).quote("AAPL", 110.0, 10.0));
        let svc = service_with(provider.clone());
        let assets = vec![stock("1", "AAPL", 1.0, 0.0), stock("2", "AAPL", 0.0, 1.0)];
        let mut cache = cache_with(&[(AssetType::Stock, "AAPL", 100.0, Some(0.0))]);

        let report = svc.refresh(&assets, &mut cache, "USD", 1).await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(report.updated, 2);
        assert_eq!(cache.price(&key(AssetType::Stock, "AAPL")), Some(110.0));
        assert_eq!(cache.previous_price(&key(AssetType::Stock, "AAPL")), Some(100.0));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_old_price() {
        let provider = Arc::new(ScriptedProvider::new(all_types()).reply("AAPL", Reply::Fail));
        let svc = service_with(provider);
        let mut cache = cache_with(&[(AssetType::Stock, "AAPL", 100.0, Some(1.0))]);

        svc.refresh(&[stock("1", "AAPL", 1.0, 0.0)], &mut cache, "USD", 1)
            .await
            .unwrap();
        assert_eq!(cache.price(&key(AssetType::Stock, "AAPL")), Some(100.0));
    }

    #[tokio::test]
    async fn pacing_between_calls_to_one_provider() {
        let provider = Arc::new(
            ScriptedProvider::new(all_types())
                .quote("A", 1.0, 0.0)
                .quote("B", 1.0, 0.0)
                .quote("C", 1.0, 0.0),
        );
        let mut registry = PriceProviderRegistry::new();
        registry.register(provider);
        let config = RefreshConfig {
            rate_limit_pause: Duration::ZERO,
            pacing_override: Some(Duration::from_millis(20)),
        };
        let svc = PriceService::new(registry, config);
        let assets = vec![
            stock("1", "A", 1.0, 0.0),
            stock("2", "B", 1.0, 0.0),
            stock("3", "C", 1.0, 0.0),
        ];
        let mut cache = PriceCache::new();

        let started = std::time::Instant::now();
        svc.refresh(&assets, &mut cache, "USD", 1).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    fn paced_config(pacing: Duration) -> RefreshConfig {
        RefreshConfig {
            rate_limit_pause: Duration::from_secs(5),
            pacing_override: Some(pacing),
        }
    }

    #[test]
    fn pacing_runs_without_a_tokio_runtime() {
        let provider = Arc::new(
            ScriptedProvider::new(all_types())
                .quote("A", 1.0, 0.0)
                .quote("B", 2.0, 0.0),
        );
        let pacer = Arc::new(RecordingPacer::default());
        let mut registry = PriceProviderRegistry::new();
        registry.register(provider.clone());
        let svc = PriceService::new(registry, paced_config(Duration::from_millis(10)))
            .with_pacer(pacer.clone());
        let assets = vec![stock("1", "A", 1.0, 0.0), stock("2", "B", 1.0, 0.0)];
        let mut cache = PriceCache::new();

        let report = block_on(svc.refresh(&assets, &mut cache, "USD", 1)).unwrap();

        assert_eq!(report.updated, 2);
        assert_eq!(provider.calls(), 2);
        assert_eq!(pacer.pauses(), vec![Duration::from_millis(10)]);
        assert_eq!(cache.price(&key(AssetType::Stock, "B")), Some(2.0));
    }

    #[test]
    fn rate_limit_pause_goes_through_the_pacer() {
        let provider = Arc::new(
            ScriptedProvider::new(all_types())
                .reply("A", Reply::RateLimited)
                .quote("B", 2.0, 0.0),
        );
        let pacer = Arc::new(RecordingPacer::default());
        let mut registry = PriceProviderRegistry::new();
        registry.register(provider);
        let svc = PriceService::new(registry, paced_config(Duration::from_millis(10)))
            .with_pacer(pacer.clone());
        let assets = vec![stock("1", "A", 1.0, 0.0), stock("2", "B", 1.0, 0.0)];
        let mut cache = PriceCache::new();

        let report = block_on(svc.refresh(&assets, &mut cache, "USD", 1)).unwrap();

        assert_eq!(report.errors, 1);
        assert_eq!(
            pacer.pauses(),
            vec![Duration::from_secs(5), Duration::from_millis(10)]
        );
    }

    #[test]
    fn no_pacer_skips_the_wait() {
        let provider = Arc::new(
            ScriptedProvider::new(all_types())
                .quote("A", 1.0, 0.0)
                .quote("B", 1.0, 0.0),
        );
        let mut registry = PriceProviderRegistry::new();
        registry.register(provider);
        let svc = PriceService::new(registry, paced_config(Duration::from_secs(60)))
            .with_pacer(Arc::new(NoPacer));
        let assets = vec![stock("1", "A", 1.0, 0.0), stock("2", "B", 1.0, 0.0)];
        let mut cache = PriceCache::new();

        let report = block_on(svc.refresh(&assets, &mut cache, "USD", 1)).unwrap();
        assert_eq!(report.updated, 2);
    }

    #[tokio::test]
    async fn concurrent_refresh_is_rejected() {
        let provider = Arc::new(
            ScriptedProvider::new(all_types())
                .quote("SLOW", 1.0, 0.0)
                .with_delay(Duration::from_millis(50)),
        );
        let svc = service_with(provider);
        let assets = vec![stock("1", "SLOW", 1.0, 0.0)];
        let mut first_cache = PriceCache::new();
        let mut second_cache = PriceCache::new();

        let (first, second) = tokio::join!(
            svc.refresh(&assets, &mut first_cache, "USD", 1),
            svc.refresh(&assets, &mut second_cache, "USD", 1),
        );

        assert_eq!(first.unwrap().updated, 1);
        assert!(matches!(second, Err(CoreError::RefreshInProgress)));
        assert!(second_cache.is_empty());
        assert!(!svc.is_refreshing());

        // the guard is released once the first pass is done
        assert!(svc.refresh(&assets, &mut second_cache, "USD", 2).await.is_ok());
    }

    #[test]
    fn savings_always_have_a_provider() {
        let svc = PriceService::new(PriceProviderRegistry::new(), RefreshConfig::immediate());
        assert!(svc.has_provider_for(&AssetType::Savings));
        assert!(!svc.has_provider_for(&AssetType::Stock));
    }
}

// ═══════════════════════════════════════════════════════════════════
// SearchService
// ═══════════════════════════════════════════════════════════════════

mod symbol_search {
    use super::*;

    fn matches(symbols: &[&str]) -> Vec<SymbolMatch> {
        FixedSearch::new(symbols).results
    }

    fn symbols(results: &[SymbolMatch]) -> Vec<&str> {
        results.iter().map(|m| m.symbol.as_str()).collect()
    }

    #[test]
    fn stocks_drop_exchange_qualified_symbols() {
        let raw = matches(&["AAPL", "BINANCE:AAPL", "AAPL.MX"]);
        let filtered = filter_matches(raw, &AssetType::Stock);
        assert_eq!(symbols(&filtered), vec!["AAPL", "AAPL.MX"]);
    }

    #[test]
    fn crypto_keeps_binance_pairs_only() {
        let filtered = filter_matches(
            matches(&["BINANCE:BTCUSDT", "COINBASE:BTC-USD", "BTC"]),
            &AssetType::Crypto,
        );
        assert_eq!(symbols(&filtered), vec!["BINANCE:BTCUSDT"]);
    }

    #[test]
    fn other_types_have_no_suggestions() {
        assert!(filter_matches(matches(&["gold"]), &AssetType::Metal).is_empty());
        assert!(filter_matches(matches(&["USD"]), &AssetType::Savings).is_empty());
    }

    #[test]
    fn at_most_ten_suggestions() {
        let many: Vec<String> = (0..25).map(|i| format!("SYM{i}")).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let filtered = filter_matches(matches(&refs), &AssetType::Stock);
        assert_eq!(filtered.len(), MAX_SUGGESTIONS);
        assert_eq!(filtered[0].symbol, "SYM0");
    }

    #[tokio::test]
    async fn search_delegates_and_filters() {
        let searcher = Arc::new(FixedSearch::new(&["AAPL", "NASDAQ:AAPL"]));
        let mut registry = PriceProviderRegistry::new();
        registry.register_search(searcher.clone());

        let results = SearchService::new()
            .search(&registry, "apple", &AssetType::Stock)
            .await
            .unwrap();
        assert_eq!(symbols(&results), vec!["AAPL"]);
        assert_eq!(results[0].description, "AAPL description");
        assert_eq!(searcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_query_or_metal_makes_no_request() {
        let searcher = Arc::new(FixedSearch::new(&["AAPL"]));
        let mut registry = PriceProviderRegistry::new();
        registry.register_search(searcher.clone());
        let svc = SearchService::new();

        assert!(svc.search(&registry, "   ", &AssetType::Stock).await.unwrap().is_empty());
        assert!(svc.search(&registry, "gold", &AssetType::Metal).await.unwrap().is_empty());
        assert_eq!(searcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn search_without_backend_fails() {
        let result = SearchService::new()
            .search(&PriceProviderRegistry::new(), "apple", &AssetType::Stock)
            .await;
        assert!(matches!(result, Err(CoreError::NoProvider(_))));
    }
}
