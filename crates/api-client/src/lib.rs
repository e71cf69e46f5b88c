use crate::error::ApiError;
use crate::responses::{
    ApiErrorResponse, ChainSnapshotResponse, ContractReference, ContractsResponse,
    LastTradeResponse, OptionSnapshot, PreviousCloseResponse,
};
use analytics::expected_move_targets;
use chrono::{DateTime, Utc};
use configuration::StructuredApiSettings;
use core_types::{AcquisitionResult, ChainRequest, ContractQuote, ContractType, KeyStatus};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod error;
pub mod responses;

/// Where the underlying price comes from, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceSource {
    LatestTrade,
    PreviousClose,
}

const PRICE_SOURCES: [PriceSource; 2] = [PriceSource::LatestTrade, PriceSource::PreviousClose];

/// Strike band requested from the snapshot endpoint, as fractions of the price.
fn strike_band(contract_type: ContractType) -> (Decimal, Decimal) {
    match contract_type {
        ContractType::Put => (Decimal::new(80, 2), Decimal::new(102, 2)),
        ContractType::Call => (Decimal::new(95, 2), Decimal::new(120, 2)),
    }
}

/// A client for a structured options market-data REST API (Polygon-style endpoints).
///
/// The key travels as the `apiKey` query parameter on every request.
#[derive(Clone)]
pub struct PolygonClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    snapshot_limit: u32,
    top_n: usize,
    baseline_volatility: Decimal,
}

impl PolygonClient {
    pub fn new(
        api_key: &str,
        settings: &StructuredApiSettings,
        baseline_volatility: Decimal,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            snapshot_limit: settings.snapshot_limit,
            top_n: settings.top_n,
            baseline_volatility,
        })
    }

    /// Fetches price and chain for `request`.
    pub async fn acquire(
        &self,
        request: &ChainRequest,
        as_of: DateTime<Utc>,
    ) -> Result<AcquisitionResult, ApiError> {
        let price = self.fetch_price(&request.ticker).await?;
        tracing::info!(ticker = %request.ticker, %price, "Resolved underlying price.");
        let quotes = self.fetch_chain(request, price, as_of).await?;
        Ok(AcquisitionResult::new(price, quotes))
    }

    /// Latest trade, falling back to the previous close.
    ///
    /// A rejected key is fatal; a plan restriction or an empty answer moves on to
    /// the next source.
    pub async fn fetch_price(&self, ticker: &str) -> Result<Decimal, ApiError> {
        for source in PRICE_SOURCES {
            let attempt = match source {
                PriceSource::LatestTrade => self.latest_trade(ticker).await,
                PriceSource::PreviousClose => self.previous_close(ticker).await,
            };
            match attempt {
                Ok(Some(price)) if price > Decimal::ZERO => return Ok(price),
                Ok(_) => tracing::warn!(?source, ticker, "Price source returned no price."),
                Err(ApiError::KeyInvalid(message)) => return Err(ApiError::KeyInvalid(message)),
                Err(e) => tracing::warn!(?source, ticker, error = %e, "Price source failed."),
            }
        }
        Err(ApiError::PriceUnavailable(ticker.to_string()))
    }

    /// The chain snapshot, or the restricted-tier reconstruction when the key
    /// cannot read snapshots.
    pub async fn fetch_chain(
        &self,
        request: &ChainRequest,
        price: Decimal,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<ContractQuote>, ApiError> {
        match self.chain_snapshot(request, price).await {
            Ok(quotes) => Ok(quotes),
            Err(e @ (ApiError::EntitlementRestricted(_) | ApiError::KeyInvalid(_))) => {
                tracing::warn!(error = %e, "Snapshot unavailable, using the restricted-tier contract list.");
                self.restricted_chain(request, price, as_of).await
            }
            Err(e) => Err(e),
        }
    }

    /// Issues a minimal reference-list call to check the key.
    pub async fn verify_key(&self) -> Result<KeyStatus, ApiError> {
        let url = format!("{}/v3/reference/options/contracts", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("limit", "1"), ("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(KeyStatus::Invalid),
            status if status.is_success() => Ok(KeyStatus::Valid),
            status => Err(ApiError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn latest_trade(&self, ticker: &str) -> Result<Option<Decimal>, ApiError> {
        let path = format!("/v2/last/trade/{ticker}");
        let response: LastTradeResponse = self.get_json(&path, &[]).await?;
        Ok(response.results.and_then(|trade| trade.price))
    }

    /// Previous session close for a stock or an option ticker.
    async fn previous_close(&self, ticker: &str) -> Result<Option<Decimal>, ApiError> {
        let path = format!("/v2/aggs/ticker/{ticker}/prev");
        let response: PreviousCloseResponse = self
            .get_json(&path, &[("adjusted", "true".to_string())])
            .await?;
        Ok(response.results.first().and_then(|bar| bar.close))
    }

    async fn chain_snapshot(
        &self,
        request: &ChainRequest,
        price: Decimal,
    ) -> Result<Vec<ContractQuote>, ApiError> {
        let (low, high) = strike_band(request.contract_type);
        let path = format!("/v3/snapshot/options/{}", request.ticker);
        let query = [
            ("expiration_date", request.expiration.format("%Y-%m-%d").to_string()),
            ("contract_type", request.contract_type.as_str().to_string()),
            ("strike_price.gte", (price * low).round_dp(2).to_string()),
            ("strike_price.lte", (price * high).round_dp(2).to_string()),
            ("limit", self.snapshot_limit.to_string()),
        ];
        let response: ChainSnapshotResponse = self.get_json(&path, &query).await?;

        let total = response.results.len();
        let quotes: Vec<ContractQuote> = response
            .results
            .iter()
            .filter_map(quote_from_snapshot)
            .collect();
        tracing::debug!(total, usable = quotes.len(), "Parsed chain snapshot.");

        Ok(nearest_the_money(quotes, request.contract_type, self.top_n))
    }

    /// Picks the listed contract nearest each expected-move target and prices each
    /// one from its previous close. Greeks are never available on this path.
    async fn restricted_chain(
        &self,
        request: &ChainRequest,
        price: Decimal,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<ContractQuote>, ApiError> {
        let query = [
            ("underlying_ticker", request.ticker.clone()),
            ("expiration_date", request.expiration.format("%Y-%m-%d").to_string()),
            ("contract_type", request.contract_type.as_str().to_string()),
            ("limit", "1000".to_string()),
        ];
        let listing: ContractsResponse = self
            .get_json("/v3/reference/options/contracts", &query)
            .await?;

        let targets = expected_move_targets(
            price,
            request.expiration,
            as_of,
            self.baseline_volatility,
            request.contract_type,
        );
        let selected = select_nearest_contracts(&listing.results, &targets.targets());
        tracing::info!(
            listed = listing.results.len(),
            selected = selected.len(),
            "Selected contracts nearest the expected-move targets."
        );

        let mut quotes = Vec::with_capacity(selected.len());
        for (ticker, strike) in selected {
            match self.previous_close(&ticker).await {
                Ok(Some(close)) if close > Decimal::ZERO => {
                    quotes.push(ContractQuote::bare(strike, close));
                }
                Ok(_) => tracing::debug!(%ticker, "Contract has no previous close, skipping."),
                Err(e) => tracing::warn!(%ticker, error = %e, "Failed to price contract, skipping."),
            }
        }

        Ok(nearest_the_money(quotes, request.contract_type, self.top_n))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str::<T>(&text)
                .map_err(|e| ApiError::Deserialization(format!("{path}: {e}")));
        }

        let body: ApiErrorResponse = serde_json::from_str(&text).unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED => ApiError::KeyInvalid(body.describe()),
            StatusCode::FORBIDDEN if body.is_entitlement() => {
                ApiError::EntitlementRestricted(body.describe())
            }
            StatusCode::FORBIDDEN => ApiError::KeyInvalid(body.describe()),
            _ => ApiError::Status {
                status: status.as_u16(),
                body: text,
            },
        })
    }
}

/// Reads one snapshot entry, preferring the session close, then the bid, then the last trade.
fn quote_from_snapshot(snapshot: &OptionSnapshot) -> Option<ContractQuote> {
    let strike = snapshot
        .details
        .as_ref()?
        .strike_price
        .filter(|strike| *strike > Decimal::ZERO)?;

    let positive = |value: Option<Decimal>| value.filter(|v| *v > Decimal::ZERO);
    let premium = positive(snapshot.day.as_ref().and_then(|d| d.close))
        .or_else(|| positive(snapshot.last_quote.as_ref().and_then(|q| q.bid)))
        .or_else(|| positive(snapshot.last_trade.as_ref().and_then(|t| t.price)))?;

    let delta = snapshot.greeks.as_ref().and_then(|g| g.delta);
    Some(ContractQuote {
        strike,
        premium,
        implied_volatility: snapshot.implied_volatility,
        delta,
        greeks_available: delta.is_some(),
    })
}

/// Puts descending by strike, calls ascending, keeping the first `top_n`.
fn nearest_the_money(
    mut quotes: Vec<ContractQuote>,
    contract_type: ContractType,
    top_n: usize,
) -> Vec<ContractQuote> {
    match contract_type {
        ContractType::Put => quotes.sort_by(|a, b| b.strike.cmp(&a.strike)),
        ContractType::Call => quotes.sort_by(|a, b| a.strike.cmp(&b.strike)),
    }
    quotes.truncate(top_n);
    quotes
}

/// For each target, the listed contract with the closest strike. A contract chosen
/// for two targets appears once.
fn select_nearest_contracts(
    listing: &[ContractReference],
    targets: &[Decimal],
) -> Vec<(String, Decimal)> {
    let usable: Vec<(&str, Decimal)> = listing
        .iter()
        .filter_map(|c| Some((c.ticker.as_deref()?, c.strike_price?)))
        .collect();

    let mut selected: Vec<(String, Decimal)> = Vec::new();
    for target in targets {
        let nearest = usable
            .iter()
            .min_by_key(|(_, strike)| (*strike - *target).abs());
        if let Some((ticker, strike)) = nearest {
            if !selected.iter().any(|(chosen, _)| chosen.as_str() == *ticker) {
                selected.push((ticker.to_string(), *strike));
            }
        }
    }
    selected
}
