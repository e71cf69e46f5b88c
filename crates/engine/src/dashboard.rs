use crate::error::EngineError;
use crate::provider::{ProviderFactory, QuoteProvider};
use analytics::{OptionBook, RowEdit, RowInput, StrategyRowView, row_from_quote, strategy_view};
use chrono::{DateTime, NaiveDate, Utc};
use configuration::{ApiKeys, Settings};
use core_types::{
    AcquisitionResult, ChainRequest, Citation, ContractType, OptionRow, RowId, StrategyKind,
    VolatilityMetrics,
};
use events::{DashboardEvent, FetchPhase, Notice};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

/// Structured-API keys at or below this length are treated as absent.
const MIN_STRUCTURED_KEY_LEN: usize = 10;
const EVENT_CAPACITY: usize = 64;

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub expiration: NaiveDate,
    pub contract_type: ContractType,
    /// Used for covered-call capital and ROI; ignored for puts.
    pub cost_basis: Option<Decimal>,
    pub as_of: DateTime<Utc>,
}

impl FetchRequest {
    pub fn new(expiration: NaiveDate, contract_type: ContractType) -> Self {
        Self {
            expiration,
            contract_type,
            cost_basis: None,
            as_of: Utc::now(),
        }
    }

    pub fn with_cost_basis(mut self, cost_basis: Decimal) -> Self {
        self.cost_basis = Some(cost_basis);
        self
    }

    pub fn at(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = as_of;
        self
    }
}

/// How a successful fetch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Loaded { provider: &'static str, rows: usize },
    /// A price came back but no usable contracts.
    NoChainFound { provider: &'static str, current_price: Decimal },
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub phase: FetchPhase,
    pub book: OptionBook,
    pub current_price: Option<Decimal>,
    pub volatility: Option<VolatilityMetrics>,
    pub citations: Vec<Citation>,
    pub notices: Vec<Notice>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            phase: FetchPhase::Idle,
            book: OptionBook::new(),
            current_price: None,
            volatility: None,
            citations: Vec::new(),
            notices: Vec::new(),
        }
    }
}

/// Clears the in-flight flag when the fetch that set it ends, however it ends.
struct FetchGuard<'a>(&'a AtomicBool);

impl<'a> FetchGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, EngineError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EngineError::FetchInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The acquisition orchestrator and the session state it drives.
///
/// A fetch tries the structured API first when its key is usable and falls back to
/// AI search when that key exists. The volatility card is fetched on its own task
/// and lands in the shared state whenever it resolves. Only one fetch may be
/// outstanding at a time; a second is rejected with `FetchInProgress`.
pub struct Dashboard {
    settings: Settings,
    keys: ApiKeys,
    factory: Arc<dyn ProviderFactory>,
    state: Arc<Mutex<DashboardState>>,
    events: broadcast::Sender<DashboardEvent>,
    in_flight: AtomicBool,
    volatility_task: Mutex<Option<JoinHandle<()>>>,
}

impl Dashboard {
    pub fn new(settings: Settings, keys: ApiKeys, factory: Arc<dyn ProviderFactory>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            keys,
            factory,
            state: Arc::new(Mutex::new(DashboardState::default())),
            events,
            in_flight: AtomicBool::new(false),
            volatility_task: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A copy of the current state for rendering.
    pub async fn snapshot(&self) -> DashboardState {
        self.state.lock().await.clone()
    }

    pub async fn phase(&self) -> FetchPhase {
        self.state.lock().await.phase
    }

    /// Runs one acquisition and replaces the book with its rows.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome, EngineError> {
        let _guard = FetchGuard::acquire(&self.in_flight)?;

        {
            let mut state = self.state.lock().await;
            state.phase = FetchPhase::Loading;
            state.notices.clear();
        }
        self.emit(DashboardEvent::PhaseChanged(FetchPhase::Loading));

        self.spawn_volatility().await;

        let chain = ChainRequest::new(
            self.settings.underlying.ticker.clone(),
            request.expiration,
            request.contract_type,
        );
        tracing::info!(
            ticker = %chain.ticker,
            expiration = %chain.expiration,
            contract_type = %chain.contract_type,
            "Starting chain fetch."
        );

        match self.acquire_with_fallback(&chain, request.as_of).await {
            Ok((provider, result)) => Ok(self.apply(provider, &request, result).await),
            Err(e) => {
                tracing::error!(error = %e, "Chain fetch failed.");
                self.state.lock().await.phase = FetchPhase::Error;
                self.emit(DashboardEvent::PhaseChanged(FetchPhase::Error));
                Err(e)
            }
        }
    }

    /// Waits for the volatility task started by the last fetch, if any.
    pub async fn settle_volatility(&self) {
        let handle = self.volatility_task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Volatility task did not complete.");
            }
        }
    }

    /// Adds a hand-entered row.
    pub async fn add_row(&self, input: &RowInput, as_of: DateTime<Utc>) -> Result<OptionRow, EngineError> {
        let mut state = self.state.lock().await;
        Ok(state.book.add_manual(input, as_of)?.clone())
    }

    pub async fn update_row(
        &self,
        id: &RowId,
        edit: &RowEdit,
        as_of: DateTime<Utc>,
    ) -> Result<OptionRow, EngineError> {
        let mut state = self.state.lock().await;
        Ok(state.book.update(id, edit, as_of)?.clone())
    }

    pub async fn remove_row(&self, id: &RowId) -> Result<OptionRow, EngineError> {
        let mut state = self.state.lock().await;
        Ok(state.book.remove(id)?)
    }

    /// The book as seen through `strategy`, using the configured width tolerance.
    pub async fn view(&self, strategy: StrategyKind, spread_width: Decimal) -> Vec<StrategyRowView> {
        let state = self.state.lock().await;
        strategy_view(
            state.book.rows(),
            strategy,
            spread_width,
            self.settings.dashboard.width_tolerance,
        )
    }

    async fn acquire_with_fallback(
        &self,
        chain: &ChainRequest,
        as_of: DateTime<Utc>,
    ) -> Result<(&'static str, AcquisitionResult), EngineError> {
        let structured_key = self.keys.structured_api_key.as_deref().filter(|key| {
            let usable = key.trim().len() > MIN_STRUCTURED_KEY_LEN;
            if !usable {
                tracing::warn!("Structured-API key is too short to be valid, ignoring it.");
            }
            usable
        });
        let ai_key = self
            .keys
            .ai_search_key
            .as_deref()
            .filter(|key| !key.trim().is_empty());

        let Some(structured_key) = structured_key else {
            let Some(ai_key) = ai_key else {
                self.fail(
                    "No data source configured.",
                    "Add a structured-API or AI-search key with `yieldscope keys set`.",
                )
                .await;
                return Err(EngineError::NoDataSource);
            };
            return self.try_ai_search(ai_key, chain, as_of).await;
        };

        let structured = match self.factory.structured(structured_key) {
            Ok(provider) => self.run(provider.as_ref(), chain, as_of).await,
            Err(e) => Err(e),
        };
        let error = match structured {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        match ai_key {
            Some(ai_key) => {
                self.warn(format!(
                    "Structured API failed ({error}); falling back to AI search."
                ))
                .await;
                self.try_ai_search(ai_key, chain, as_of).await
            }
            None => {
                let action = if error.is_key_rejection() {
                    "Check the structured-API key, or add an AI-search key as a fallback."
                } else {
                    "Add an AI-search key to enable the fallback source."
                };
                self.fail(format!("Structured API failed: {error}"), action).await;
                Err(error)
            }
        }
    }

    async fn try_ai_search(
        &self,
        key: &str,
        chain: &ChainRequest,
        as_of: DateTime<Utc>,
    ) -> Result<(&'static str, AcquisitionResult), EngineError> {
        let outcome = match self.factory.ai_search(key) {
            Ok(provider) => self.run(provider.as_ref(), chain, as_of).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &outcome {
            let action = if e.is_key_rejection() {
                "Check the AI-search key."
            } else {
                "Try again later or choose another expiration."
            };
            self.fail(format!("AI search failed: {e}"), action).await;
        }
        outcome
    }

    async fn run(
        &self,
        provider: &dyn QuoteProvider,
        chain: &ChainRequest,
        as_of: DateTime<Utc>,
    ) -> Result<(&'static str, AcquisitionResult), EngineError> {
        let sender = self.events.clone();
        let progress = move |status: &str| {
            tracing::debug!(status, "Progress.");
            let _ = sender.send(DashboardEvent::Progress(status.to_string()));
        };

        tracing::info!(provider = provider.name(), "Requesting chain.");
        let result = provider.acquire(chain, as_of, &progress).await;
        if let Err(e) = &result {
            tracing::warn!(provider = provider.name(), error = %e, "Provider failed.");
        }
        result.map(|result| (provider.name(), result))
    }

    /// Normalizes the quotes into rows and publishes the new state.
    async fn apply(
        &self,
        provider: &'static str,
        request: &FetchRequest,
        result: AcquisitionResult,
    ) -> FetchOutcome {
        let rows: Vec<OptionRow> = result
            .quotes
            .iter()
            .filter_map(|quote| {
                row_from_quote(
                    quote,
                    request.expiration,
                    request.contract_type,
                    request.cost_basis,
                    request.as_of,
                )
                .map_err(|e| tracing::warn!(strike = %quote.strike, error = %e, "Skipping quote."))
                .ok()
            })
            .collect();

        let mut state = self.state.lock().await;
        state.book.replace_all(rows);
        state.current_price = Some(result.current_price);
        state.citations = result.citations;

        let (phase, outcome) = if state.book.is_empty() {
            (
                FetchPhase::NoChainFound,
                FetchOutcome::NoChainFound {
                    provider,
                    current_price: result.current_price,
                },
            )
        } else {
            (
                FetchPhase::Success,
                FetchOutcome::Loaded {
                    provider,
                    rows: state.book.len(),
                },
            )
        };
        state.phase = phase;
        drop(state);

        tracing::info!(provider, ?outcome, "Chain fetch finished.");
        self.emit(DashboardEvent::PhaseChanged(phase));
        outcome
    }

    /// Starts the volatility fetch when an AI-search key exists. Its failure is
    /// only logged.
    async fn spawn_volatility(&self) {
        let Some(key) = self
            .keys
            .ai_search_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
        else {
            return;
        };
        let source = match self.factory.volatility(key) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, "Could not build the volatility source.");
                return;
            }
        };

        let index = self.settings.underlying.volatility_index.clone();
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            match source.fetch_volatility(&index).await {
                Ok(metrics) => {
                    tracing::info!(%index, rank = %metrics.rank, "Volatility metrics resolved.");
                    state.lock().await.volatility = Some(metrics.clone());
                    let _ = events.send(DashboardEvent::VolatilityUpdated(metrics));
                }
                Err(e) => tracing::warn!(%index, error = %e, "Volatility fetch failed."),
            }
        });

        if let Some(previous) = self.volatility_task.lock().await.replace(handle) {
            previous.abort();
        }
    }

    async fn warn(&self, message: String) {
        tracing::warn!("{message}");
        let notice = Notice::fallback(message);
        self.state.lock().await.notices.push(notice.clone());
        self.emit(DashboardEvent::Notice(notice));
    }

    async fn fail(&self, message: impl Into<String>, action: &str) {
        let notice = Notice::fatal(message, Some(action.to_string()));
        self.state.lock().await.notices.push(notice.clone());
        self.emit(DashboardEvent::Notice(notice));
    }

    fn emit(&self, event: DashboardEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
