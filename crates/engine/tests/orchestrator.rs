use api_client::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use configuration::{ApiKeys, Settings};
use core_types::{
    AcquisitionResult, ChainRequest, Citation, ContractQuote, ContractType, VolatilityMetrics,
    VolatilityStatus,
};
use engine::{
    Dashboard, EngineError, FetchOutcome, FetchRequest, Progress, ProviderFactory, QuoteProvider,
    VolatilitySource,
};
use events::{DashboardEvent, FetchPhase, LogLevel};
use rust_decimal_macros::dec;
use search_client::error::SearchError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

// ── Fakes ────────────────────────────────────────────────────────────

struct FakeProvider {
    name: &'static str,
    reply: Result<AcquisitionResult, EngineError>,
    calls: AtomicUsize,
    /// When set, the provider signals `entered` and waits for `release`.
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeProvider {
    fn ok(name: &'static str, result: AcquisitionResult) -> Arc<Self> {
        Arc::new(Self { name, reply: Ok(result), calls: AtomicUsize::new(0), gate: None })
    }

    fn failing(name: &'static str, error: EngineError) -> Arc<Self> {
        Arc::new(Self { name, reply: Err(error), calls: AtomicUsize::new(0), gate: None })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn acquire(
        &self,
        _request: &ChainRequest,
        _as_of: DateTime<Utc>,
        progress: Progress<'_>,
    ) -> Result<AcquisitionResult, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress(&format!("{} attempt 1", self.name));
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        progress(&format!("{} attempt 2", self.name));
        self.reply.clone()
    }
}

struct FakeVolatility {
    reply: Result<VolatilityMetrics, EngineError>,
    calls: AtomicUsize,
}

#[async_trait]
impl VolatilitySource for FakeVolatility {
    async fn fetch_volatility(&self, index: &str) -> Result<VolatilityMetrics, EngineError> {
        assert_eq!(index, "VIX");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

struct FakeFactory {
    structured: Arc<FakeProvider>,
    ai: Arc<FakeProvider>,
    volatility: Arc<FakeVolatility>,
    builds: AtomicUsize,
}

impl FakeFactory {
    fn new(structured: Arc<FakeProvider>, ai: Arc<FakeProvider>) -> Arc<Self> {
        Arc::new(Self {
            structured,
            ai,
            volatility: Arc::new(FakeVolatility {
                reply: Err(EngineError::Search(SearchError::VolatilityUnavailable("VIX".into()))),
                calls: AtomicUsize::new(0),
            }),
            builds: AtomicUsize::new(0),
        })
    }

    fn with_volatility(self: Arc<Self>, reply: Result<VolatilityMetrics, EngineError>) -> Arc<Self> {
        let this = Arc::try_unwrap(self).ok().unwrap();
        Arc::new(Self {
            volatility: Arc::new(FakeVolatility { reply, calls: AtomicUsize::new(0) }),
            ..this
        })
    }

    fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ProviderFactory for FakeFactory {
    fn structured(&self, _key: &str) -> Result<Arc<dyn QuoteProvider>, EngineError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.structured.clone())
    }

    fn ai_search(&self, _key: &str) -> Result<Arc<dyn QuoteProvider>, EngineError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.ai.clone())
    }

    fn volatility(&self, _key: &str) -> Result<Arc<dyn VolatilitySource>, EngineError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.volatility.clone())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

const STRUCTURED_KEY: &str = "polygon-key-0123456789";
const AI_KEY: &str = "gemini-key-0123456789";

fn keys(structured: Option<&str>, ai: Option<&str>) -> ApiKeys {
    ApiKeys {
        structured_api_key: structured.map(str::to_string),
        ai_search_key: ai.map(str::to_string),
    }
}

fn dashboard(keys: ApiKeys, factory: Arc<FakeFactory>) -> Dashboard {
    Dashboard::new(Settings::default(), keys, factory)
}

fn chain(price: rust_decimal::Decimal, strikes: &[(rust_decimal::Decimal, rust_decimal::Decimal)]) -> AcquisitionResult {
    AcquisitionResult::new(
        price,
        strikes
            .iter()
            .map(|(strike, premium)| ContractQuote::bare(*strike, *premium))
            .collect(),
    )
}

fn spy_puts() -> AcquisitionResult {
    let mut result = chain(dec!(500), &[(dec!(495), dec!(3.10)), (dec!(490), dec!(2.20))]);
    result.quotes[0].delta = Some(dec!(-0.30));
    result.quotes[0].greeks_available = true;
    result
}

fn request() -> FetchRequest {
    FetchRequest::new(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(), ContractType::Put)
        .at(Utc.with_ymd_and_hms(2025, 1, 1, 15, 0, 0).unwrap())
}

fn key_rejected() -> EngineError {
    EngineError::Structured(ApiError::KeyInvalid("Unknown API Key".into()))
}

fn unused(name: &'static str) -> Arc<FakeProvider> {
    FakeProvider::failing(name, EngineError::NoDataSource)
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn no_keys_fails_fatally_without_any_network_call() {
    let factory = FakeFactory::new(unused("structured"), unused("ai"));
    let dashboard = dashboard(ApiKeys::default(), factory.clone());

    let err = dashboard.fetch(request()).await.unwrap_err();

    assert_eq!(err, EngineError::NoDataSource);
    assert_eq!(factory.builds(), 0);
    let state = dashboard.snapshot().await;
    assert_eq!(state.phase, FetchPhase::Error);
    assert_eq!(state.notices.len(), 1);
    assert!(state.notices[0].is_fatal());
    assert!(state.notices[0].action.is_some());
}

#[tokio::test]
async fn structured_success_fills_the_book() {
    let structured = FakeProvider::ok("structured", spy_puts());
    let ai = unused("ai");
    let factory = FakeFactory::new(structured.clone(), ai.clone());
    let dashboard = dashboard(keys(Some(STRUCTURED_KEY), None), factory.clone());

    let outcome = dashboard.fetch(request()).await.unwrap();

    assert_eq!(outcome, FetchOutcome::Loaded { provider: "structured", rows: 2 });
    assert_eq!((structured.calls(), ai.calls()), (1, 0));
    // No AI key: no volatility source was built either.
    assert_eq!(factory.builds(), 1);

    let state = dashboard.snapshot().await;
    assert_eq!(state.phase, FetchPhase::Success);
    assert_eq!(state.current_price, Some(dec!(500)));
    let first = &state.book.rows()[0];
    assert_eq!(first.id.as_str(), "put-495-2025-01-31");
    assert_eq!(first.days_to_expiration, 30);
    assert_eq!(first.win_rate, Some(dec!(70)));
    assert!(state.book.rows()[1].delta.is_none());
    assert!(state.notices.is_empty());
}

#[tokio::test]
async fn structured_failure_falls_back_to_ai_search_with_a_warning() {
    let structured = FakeProvider::failing("structured", key_rejected());
    let mut from_search = chain(dec!(501), &[(dec!(500), dec!(4.00))]);
    from_search.citations.push(Citation {
        uri: "https://a.example/spy".into(),
        title: "A".into(),
    });
    let ai = FakeProvider::ok("ai", from_search);
    let factory = FakeFactory::new(structured.clone(), ai.clone());
    let dashboard = dashboard(keys(Some(STRUCTURED_KEY), Some(AI_KEY)), factory);

    let outcome = dashboard.fetch(request()).await.unwrap();
    dashboard.settle_volatility().await;

    assert_eq!(outcome, FetchOutcome::Loaded { provider: "ai", rows: 1 });
    assert_eq!((structured.calls(), ai.calls()), (1, 1));

    let state = dashboard.snapshot().await;
    assert_eq!(state.notices.len(), 1);
    assert_eq!(state.notices[0].level, LogLevel::Warn);
    assert!(state.notices[0].message.contains("falling back"));
    assert_eq!(state.citations.len(), 1);
}

#[tokio::test]
async fn structured_failure_without_ai_key_is_fatal() {
    let structured = FakeProvider::failing("structured", key_rejected());
    let factory = FakeFactory::new(structured.clone(), unused("ai"));
    let dashboard = dashboard(keys(Some(STRUCTURED_KEY), None), factory);

    let err = dashboard.fetch(request()).await.unwrap_err();

    assert_eq!(err, key_rejected());
    let state = dashboard.snapshot().await;
    assert_eq!(state.phase, FetchPhase::Error);
    assert!(state.notices.iter().all(|n| n.is_fatal()));
    assert_eq!(
        state.notices[0].action.as_deref(),
        Some("Check the structured-API key, or add an AI-search key as a fallback.")
    );
}

#[tokio::test]
async fn malformed_structured_key_goes_straight_to_ai_search() {
    let structured = unused("structured");
    let ai = FakeProvider::ok("ai", spy_puts());
    let factory = FakeFactory::new(structured.clone(), ai.clone());
    let dashboard = dashboard(keys(Some("  short  "), Some(AI_KEY)), factory);

    dashboard.fetch(request()).await.unwrap();
    dashboard.settle_volatility().await;

    assert_eq!((structured.calls(), ai.calls()), (0, 1));
    // Going straight to AI search is not a fallback: no warning.
    assert!(dashboard.snapshot().await.notices.is_empty());
}

#[tokio::test]
async fn price_without_contracts_is_no_chain_found() {
    let structured = FakeProvider::ok("structured", chain(dec!(498.5), &[]));
    let factory = FakeFactory::new(structured, unused("ai"));
    let dashboard = dashboard(keys(Some(STRUCTURED_KEY), None), factory);

    let outcome = dashboard.fetch(request()).await.unwrap();

    assert_eq!(
        outcome,
        FetchOutcome::NoChainFound { provider: "structured", current_price: dec!(498.5) }
    );
    let state = dashboard.snapshot().await;
    assert_eq!(state.phase, FetchPhase::NoChainFound);
    assert!(state.book.is_empty());
    assert!(state.notices.is_empty());
}

#[tokio::test]
async fn volatility_failure_is_silent() {
    let factory = FakeFactory::new(FakeProvider::ok("structured", spy_puts()), unused("ai"));
    let dashboard = dashboard(keys(Some(STRUCTURED_KEY), Some(AI_KEY)), factory.clone());

    dashboard.fetch(request()).await.unwrap();
    dashboard.settle_volatility().await;

    assert_eq!(factory.volatility.calls.load(Ordering::SeqCst), 1);
    let state = dashboard.snapshot().await;
    assert_eq!(state.phase, FetchPhase::Success);
    assert!(state.volatility.is_none());
    assert!(state.notices.is_empty());
}

#[tokio::test]
async fn volatility_lands_in_shared_state_and_is_broadcast() {
    let metrics = VolatilityMetrics {
        current: dec!(34),
        high: dec!(40),
        low: dec!(10),
        rank: dec!(80),
        status: VolatilityStatus::HighFavorSelling,
    };
    let factory = FakeFactory::new(FakeProvider::ok("structured", spy_puts()), unused("ai"))
        .with_volatility(Ok(metrics.clone()));
    let dashboard = dashboard(keys(Some(STRUCTURED_KEY), Some(AI_KEY)), factory);
    let mut events = dashboard.subscribe();

    dashboard.fetch(request()).await.unwrap();
    dashboard.settle_volatility().await;

    assert_eq!(dashboard.snapshot().await.volatility, Some(metrics.clone()));
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(received.contains(&DashboardEvent::VolatilityUpdated(metrics)));
}

#[tokio::test]
async fn progress_is_broadcast_in_attempt_order() {
    let structured = FakeProvider::failing("structured", key_rejected());
    let ai = FakeProvider::ok("ai", spy_puts());
    let factory = FakeFactory::new(structured, ai);
    let dashboard = dashboard(keys(Some(STRUCTURED_KEY), Some(AI_KEY)), factory);
    let mut events = dashboard.subscribe();

    dashboard.fetch(request()).await.unwrap();

    let mut progress = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let DashboardEvent::Progress(status) = event {
            progress.push(status);
        }
    }
    assert_eq!(
        progress,
        vec!["structured attempt 1", "structured attempt 2", "ai attempt 1", "ai attempt 2"]
    );
}

#[tokio::test]
async fn overlapping_fetch_is_rejected() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let structured = Arc::new(FakeProvider {
        name: "structured",
        reply: Ok(spy_puts()),
        calls: AtomicUsize::new(0),
        gate: Some((entered.clone(), release.clone())),
    });
    let factory = FakeFactory::new(structured.clone(), unused("ai"));
    let dashboard = Arc::new(dashboard(keys(Some(STRUCTURED_KEY), None), factory));

    let first = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.fetch(request()).await }
    });
    entered.notified().await;

    let second = dashboard.fetch(request()).await;
    assert_eq!(second, Err(EngineError::FetchInProgress));
    assert_eq!(dashboard.phase().await, FetchPhase::Loading);

    release.notify_one();
    let first = first.await.unwrap();
    assert!(matches!(first, Ok(FetchOutcome::Loaded { rows: 2, .. })));
    assert_eq!(structured.calls(), 1);

    // The flag is cleared once the first fetch ends.
    release.notify_one();
    assert!(dashboard.fetch(request()).await.is_ok());
}

#[tokio::test]
async fn covered_calls_use_the_cost_basis() {
    let calls = chain(dec!(500), &[(dec!(510), dec!(4.50))]);
    let factory = FakeFactory::new(FakeProvider::ok("structured", calls), unused("ai"));
    let dashboard = dashboard(keys(Some(STRUCTURED_KEY), None), factory);

    let request = FetchRequest::new(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(), ContractType::Call)
        .with_cost_basis(dec!(450))
        .at(call_as_of());
    dashboard.fetch(request).await.unwrap();

    let state = dashboard.snapshot().await;
    let row = &state.book.rows()[0];
    assert_eq!(row.capital_required, dec!(45000));
    assert_eq!(row.roi, dec!(1));

    let edit = analytics::RowEdit {
        premium: Some(dec!(9)),
        ..analytics::RowEdit::default()
    };
    let edited = dashboard.update_row(&row.id, &edit, call_as_of()).await.unwrap();
    assert_eq!(edited.capital_required, dec!(45000));
    assert_eq!(edited.roi, dec!(2));
    assert_eq!(edited.breakeven, dec!(441));
}

fn call_as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 15, 0, 0).unwrap()
}

#[tokio::test]
async fn manual_rows_reject_duplicates() {
    let factory = FakeFactory::new(FakeProvider::ok("structured", spy_puts()), unused("ai"));
    let dashboard = dashboard(keys(Some(STRUCTURED_KEY), None), factory);
    dashboard.fetch(request()).await.unwrap();

    let input = analytics::RowInput::new(
        dec!(495),
        dec!(2.00),
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        ContractType::Put,
    );
    let err = dashboard.add_row(&input, request().as_of).await.unwrap_err();
    assert!(matches!(err, EngineError::Analytics(analytics::AnalyticsError::DuplicateRow(_))));
    assert_eq!(dashboard.snapshot().await.book.len(), 2);
}
