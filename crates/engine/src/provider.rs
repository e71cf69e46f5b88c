use crate::error::EngineError;
use api_client::PolygonClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use configuration::Settings;
use core_types::{AcquisitionResult, ChainRequest, VolatilityMetrics};
use search_client::GeminiClient;
use std::sync::Arc;

pub use search_client::Progress;

/// A source of option chains. The orchestrator tries these in fallback order.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Short name for logs and notices.
    fn name(&self) -> &'static str;

    /// Price plus quotes for `request`. `progress` is called before each network attempt.
    async fn acquire(
        &self,
        request: &ChainRequest,
        as_of: DateTime<Utc>,
        progress: Progress<'_>,
    ) -> Result<AcquisitionResult, EngineError>;
}

/// A source of volatility-index levels.
#[async_trait]
pub trait VolatilitySource: Send + Sync {
    async fn fetch_volatility(&self, index: &str) -> Result<VolatilityMetrics, EngineError>;
}

/// Builds providers from opaque keys, so the orchestrator never constructs
/// HTTP clients itself.
pub trait ProviderFactory: Send + Sync {
    fn structured(&self, key: &str) -> Result<Arc<dyn QuoteProvider>, EngineError>;
    fn ai_search(&self, key: &str) -> Result<Arc<dyn QuoteProvider>, EngineError>;
    fn volatility(&self, key: &str) -> Result<Arc<dyn VolatilitySource>, EngineError>;
}

#[async_trait]
impl QuoteProvider for PolygonClient {
    fn name(&self) -> &'static str {
        "structured API"
    }

    async fn acquire(
        &self,
        request: &ChainRequest,
        as_of: DateTime<Utc>,
        progress: Progress<'_>,
    ) -> Result<AcquisitionResult, EngineError> {
        progress(&format!(
            "Fetching {} {} chain from the structured API...",
            request.ticker, request.contract_type
        ));
        Ok(PolygonClient::acquire(self, request, as_of).await?)
    }
}

#[async_trait]
impl QuoteProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "AI search"
    }

    async fn acquire(
        &self,
        request: &ChainRequest,
        _as_of: DateTime<Utc>,
        progress: Progress<'_>,
    ) -> Result<AcquisitionResult, EngineError> {
        Ok(GeminiClient::acquire(self, request, progress).await?)
    }
}

#[async_trait]
impl VolatilitySource for GeminiClient {
    async fn fetch_volatility(&self, index: &str) -> Result<VolatilityMetrics, EngineError> {
        let quiet = |status: &str| tracing::debug!(status, "Volatility search progress.");
        Ok(GeminiClient::fetch_volatility(self, index, &quiet).await?)
    }
}

/// The production factory: Polygon-style REST for the structured key, Gemini for
/// the AI-search key.
pub struct LiveProviders {
    settings: Settings,
}

impl LiveProviders {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    fn gemini(&self, key: &str) -> Result<GeminiClient, EngineError> {
        Ok(GeminiClient::new(key, &self.settings.ai_search)?)
    }
}

impl ProviderFactory for LiveProviders {
    fn structured(&self, key: &str) -> Result<Arc<dyn QuoteProvider>, EngineError> {
        let client = PolygonClient::new(
            key,
            &self.settings.structured_api,
            self.settings.dashboard.baseline_volatility,
        )?;
        Ok(Arc::new(client))
    }

    fn ai_search(&self, key: &str) -> Result<Arc<dyn QuoteProvider>, EngineError> {
        Ok(Arc::new(self.gemini(key)?))
    }

    fn volatility(&self, key: &str) -> Result<Arc<dyn VolatilitySource>, EngineError> {
        Ok(Arc::new(self.gemini(key)?))
    }
}
