use rust_decimal::Decimal;
use serde::Deserialize;

// Every field is optional: absent sub-fields skip the contract instead of defaulting to zero.

/// `GET /v2/last/trade/{ticker}`
#[derive(Debug, Clone, Deserialize)]
pub struct LastTradeResponse {
    pub results: Option<LastTrade>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastTrade {
    #[serde(rename = "p")]
    pub price: Option<Decimal>,
}

/// `GET /v2/aggs/ticker/{ticker}/prev`, used for both the underlying and single contracts.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviousCloseResponse {
    #[serde(default)]
    pub results: Vec<Aggregate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Aggregate {
    #[serde(rename = "T")]
    pub ticker: Option<String>,
    #[serde(rename = "c")]
    pub close: Option<Decimal>,
}

/// `GET /v3/snapshot/options/{underlying}`
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSnapshotResponse {
    #[serde(default)]
    pub results: Vec<OptionSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionSnapshot {
    pub details: Option<ContractDetails>,
    pub day: Option<DayBar>,
    pub last_quote: Option<LastQuote>,
    pub last_trade: Option<LastOptionTrade>,
    pub implied_volatility: Option<Decimal>,
    pub greeks: Option<Greeks>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractDetails {
    pub ticker: Option<String>,
    pub strike_price: Option<Decimal>,
    pub contract_type: Option<String>,
    pub expiration_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayBar {
    pub close: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastQuote {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastOptionTrade {
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Greeks {
    pub delta: Option<Decimal>,
}

/// `GET /v3/reference/options/contracts`
#[derive(Debug, Clone, Deserialize)]
pub struct ContractsResponse {
    #[serde(default)]
    pub results: Vec<ContractReference>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractReference {
    pub ticker: Option<String>,
    pub strike_price: Option<Decimal>,
}

/// Represents an error body from the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorResponse {
    pub status: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ApiErrorResponse {
    pub fn describe(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .or_else(|| self.status.clone())
            .unwrap_or_else(|| "no details".to_string())
    }

    /// A 403 that says "not on your plan" rather than "bad key".
    pub fn is_entitlement(&self) -> bool {
        let status = self.status.as_deref().unwrap_or_default();
        let text = self.describe().to_ascii_lowercase();
        status.eq_ignore_ascii_case("NOT_AUTHORIZED")
            || text.contains("entitled")
            || text.contains("upgrade")
            || text.contains("plan")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tolerates_missing_sub_fields() {
        let raw = r#"{"results":[
            {"details":{"strike_price":495,"ticker":"O:SPY250117P00495000"},
             "day":{"close":3.1},"implied_volatility":0.17,"greeks":{"delta":-0.41}},
            {"details":{"strike_price":490},"greeks":{}},
            {}
        ],"status":"OK"}"#;
        let parsed: ChainSnapshotResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 3);
        assert!(parsed.results[1].day.is_none());
        assert!(parsed.results[1].greeks.as_ref().unwrap().delta.is_none());
        assert!(parsed.results[2].details.is_none());
    }

    #[test]
    fn classifies_plan_restrictions() {
        let body: ApiErrorResponse = serde_json::from_str(
            r#"{"status":"NOT_AUTHORIZED","message":"You are not entitled to this data. Please upgrade your plan."}"#,
        )
        .unwrap();
        assert!(body.is_entitlement());

        let body: ApiErrorResponse =
            serde_json::from_str(r#"{"status":"ERROR","error":"Unknown API Key"}"#).unwrap();
        assert!(!body.is_entitlement());
        assert_eq!(body.describe(), "Unknown API Key");
    }
}
