use crate::error::SearchError;
use crate::extract::{OptionsReply, PriceReply, Validate, VolatilityReply, parse_reply};
use crate::strategies::{
    OPTION_STRATEGIES, PRICE_STRATEGIES, SearchStrategy, VOLATILITY_STRATEGIES, options_prompt,
    price_prompt, volatility_prompt,
};
use crate::wire::{ErrorEnvelope, GenerateRequest, GenerateResponse};
use analytics::{target_strike_band, volatility_metrics};
use configuration::AiSearchSettings;
use core_types::{AcquisitionResult, ChainRequest, Citation, KeyStatus, VolatilityMetrics, merge_citations};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod error;
pub mod extract;
pub mod strategies;
pub mod wire;

/// Receives a human-readable status line before each search attempt.
pub type Progress<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// A client for a search-grounded generative model (Gemini `generateContent`
/// with the `google_search` tool).
///
/// Each stage walks an ordered list of search strategies and stops at the first
/// usable reply. Attempts are strictly sequential.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, settings: &AiSearchSettings) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: api_key.trim().to_string(),
        })
    }

    /// Price discovery, then option discovery for the three target strikes.
    ///
    /// Only a missing price is fatal. If no option strategy yields data the
    /// result carries the price and no quotes.
    pub async fn acquire(
        &self,
        request: &ChainRequest,
        progress: Progress<'_>,
    ) -> Result<AcquisitionResult, SearchError> {
        let mut citations = Vec::new();

        let price = self
            .run_strategies::<PriceReply>(
                &PRICE_STRATEGIES,
                |s| price_prompt(s, &request.ticker),
                |s| format!("Searching {} for the {} price...", s.label, request.ticker),
                progress,
                &mut citations,
            )
            .await?
            .ok_or_else(|| SearchError::PriceUnavailable(request.ticker.clone()))?;
        tracing::info!(ticker = %request.ticker, %price, "Search resolved underlying price.");

        let strikes = target_strike_band(price, request.contract_type);
        let quotes = self
            .run_strategies::<OptionsReply>(
                &OPTION_STRATEGIES,
                |s| {
                    options_prompt(
                        s,
                        &request.ticker,
                        request.contract_type,
                        request.expiration,
                        &strikes,
                    )
                },
                |s| format!("Searching {} for {} premiums...", s.label, request.contract_type),
                progress,
                &mut citations,
            )
            .await?
            .unwrap_or_else(|| {
                tracing::warn!(ticker = %request.ticker, "No search strategy returned option premiums.");
                Vec::new()
            });

        let mut result = AcquisitionResult::new(price, quotes);
        result.merge_citations(citations);
        Ok(result)
    }

    /// Current level and 52-week range of a volatility index, ranked.
    pub async fn fetch_volatility(
        &self,
        index: &str,
        progress: Progress<'_>,
    ) -> Result<VolatilityMetrics, SearchError> {
        let mut citations = Vec::new();
        let (current, high, low) = self
            .run_strategies::<VolatilityReply>(
                &VOLATILITY_STRATEGIES,
                |s| volatility_prompt(s, index),
                |s| format!("Searching {} for {index} levels...", s.label),
                progress,
                &mut citations,
            )
            .await?
            .ok_or_else(|| SearchError::VolatilityUnavailable(index.to_string()))?;

        Ok(volatility_metrics(current, high, low))
    }

    /// Lists a single model to check the key.
    pub async fn verify_key(&self) -> Result<KeyStatus, SearchError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("pageSize", "1")])
            .send()
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Ok(KeyStatus::Invalid)
            }
            status if status.is_success() => Ok(KeyStatus::Valid),
            status => Err(SearchError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Tries each strategy in order until one yields a valid reply.
    ///
    /// Network and parse failures are logged and skipped. A rejected key ends the
    /// loop since every later attempt would fail the same way.
    async fn run_strategies<R>(
        &self,
        strategies: &[SearchStrategy],
        prompt: impl Fn(&SearchStrategy) -> String,
        status: impl Fn(&SearchStrategy) -> String,
        progress: Progress<'_>,
        citations: &mut Vec<Citation>,
    ) -> Result<Option<R::Output>, SearchError>
    where
        R: Validate + DeserializeOwned,
    {
        for strategy in strategies {
            progress(&status(strategy));

            let response = match self.generate(&prompt(strategy)).await {
                Ok(response) => response,
                Err(SearchError::KeyInvalid(message)) => return Err(SearchError::KeyInvalid(message)),
                Err(e) => {
                    tracing::warn!(strategy = strategy.label, error = %e, "Search attempt failed.");
                    continue;
                }
            };
            merge_citations(citations, response.citations());

            match parse_reply::<R>(&response.text()).and_then(R::validate) {
                Ok(output) => return Ok(Some(output)),
                Err(e) => {
                    tracing::warn!(strategy = strategy.label, error = %e, "Search reply was not usable.");
                }
            }
        }
        Ok(None)
    }

    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, SearchError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateRequest::grounded(prompt))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text)
                .map_err(|e| SearchError::Deserialization(e.to_string()));
        }

        let envelope: ErrorEnvelope = serde_json::from_str(&text).unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SearchError::KeyInvalid(envelope.describe())
            }
            StatusCode::BAD_REQUEST if envelope.is_invalid_key() => {
                SearchError::KeyInvalid(envelope.describe())
            }
            _ => SearchError::Status {
                status: status.as_u16(),
                body: text,
            },
        })
    }
}
