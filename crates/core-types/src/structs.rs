use crate::enums::{ContractType, VolatilityStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw contract as reported by one provider for one fetch.
///
/// `premium` is whichever price the provider could supply (close, bid or last).
/// Missing greeks stay `None`; they are never estimated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractQuote {
    pub strike: Decimal,
    pub premium: Decimal,
    pub implied_volatility: Option<Decimal>,
    pub delta: Option<Decimal>,
    pub greeks_available: bool,
}

impl ContractQuote {
    /// A quote carrying only a strike and a premium.
    pub fn bare(strike: Decimal, premium: Decimal) -> Self {
        Self {
            strike,
            premium,
            implied_volatility: None,
            delta: None,
            greeks_available: false,
        }
    }
}

/// Stable composite key of a row: `(contract type, strike, expiration)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(String);

impl RowId {
    pub fn new(strike: Decimal, expiration: NaiveDate, contract_type: ContractType) -> Self {
        // `normalize` makes 490 and 490.00 produce the same key.
        Self(format!(
            "{}-{}-{}",
            contract_type.as_str(),
            strike.normalize(),
            expiration.format("%Y-%m-%d")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized, display-ready option contract with its derived yield figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRow {
    pub id: RowId,
    pub strike: Decimal,
    pub premium: Decimal,
    pub contract_type: ContractType,
    pub expiration: NaiveDate,
    /// Always at least 1.
    pub days_to_expiration: i64,
    /// Percent.
    pub annualized_return: Decimal,
    /// Percent.
    pub roi: Decimal,
    pub breakeven: Decimal,
    pub capital_required: Decimal,
    pub delta: Option<Decimal>,
    pub implied_volatility: Option<Decimal>,
    /// Percent, only present when a delta was supplied.
    pub win_rate: Option<Decimal>,
    /// The positive cost basis supplied at derivation. Calls measure against it.
    pub cost_basis: Option<Decimal>,
}

/// What to acquire: the chain of one side of one expiration of the underlying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRequest {
    pub ticker: String,
    pub expiration: NaiveDate,
    pub contract_type: ContractType,
}

impl ChainRequest {
    pub fn new(ticker: impl Into<String>, expiration: NaiveDate, contract_type: ContractType) -> Self {
        Self {
            ticker: ticker.into(),
            expiration,
            contract_type,
        }
    }
}

/// A source document the AI-search provider grounded its answer on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: String,
}

/// What a provider returns for one acquisition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AcquisitionResult {
    pub current_price: Decimal,
    pub quotes: Vec<ContractQuote>,
    pub citations: Vec<Citation>,
}

impl AcquisitionResult {
    pub fn new(current_price: Decimal, quotes: Vec<ContractQuote>) -> Self {
        Self {
            current_price,
            quotes,
            citations: Vec::new(),
        }
    }

    /// Appends citations, skipping any uri already present. First-seen order wins.
    pub fn merge_citations<I>(&mut self, incoming: I)
    where
        I: IntoIterator<Item = Citation>,
    {
        merge_citations(&mut self.citations, incoming);
    }
}

/// Deduplicates `incoming` into `target` by uri, preserving first-seen order.
pub fn merge_citations<I>(target: &mut Vec<Citation>, incoming: I)
where
    I: IntoIterator<Item = Citation>,
{
    for citation in incoming {
        if !target.iter().any(|c| c.uri == citation.uri) {
            target.push(citation);
        }
    }
}

/// Volatility index levels and their rank within the 52-week range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityMetrics {
    pub current: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    /// 0-100.
    pub rank: Decimal,
    pub status: VolatilityStatus,
}
