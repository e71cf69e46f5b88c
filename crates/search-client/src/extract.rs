use crate::error::SearchError;
use core_types::ContractQuote;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("fenced-block pattern is valid")
});

/// The body of the first fenced code block, if any.
fn fenced_block(text: &str) -> Option<&str> {
    let body = FENCED_BLOCK.captures(text)?.get(1)?.as_str().trim();
    (!body.is_empty()).then_some(body)
}

/// Everything from the first `{` to the last `}`.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Reads a typed reply out of free text: the fenced block first, then the brace span.
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, SearchError> {
    let candidates = [fenced_block(text), brace_span(text)];
    let mut last_error = "no JSON object in the reply".to_string();

    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<T>(candidate) {
            Ok(reply) => return Ok(reply),
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(SearchError::ParseFailure(last_error))
}

/// Replies must also make sense, not only parse.
pub trait Validate: Sized {
    type Output;

    fn validate(self) -> Result<Self::Output, SearchError>;
}

/// `{"currentPrice": number}`
#[derive(Debug, Clone, Deserialize)]
pub struct PriceReply {
    #[serde(rename = "currentPrice")]
    pub current_price: Decimal,
}

impl Validate for PriceReply {
    type Output = Decimal;

    fn validate(self) -> Result<Decimal, SearchError> {
        if self.current_price > Decimal::ZERO {
            Ok(self.current_price)
        } else {
            Err(SearchError::ParseFailure(format!(
                "price must be positive, got {}",
                self.current_price
            )))
        }
    }
}

/// `{"options": [{"strike": number, "premium": number}, ...]}`
#[derive(Debug, Clone, Deserialize)]
pub struct OptionsReply {
    pub options: Vec<OptionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionEntry {
    pub strike: Option<Decimal>,
    pub premium: Option<Decimal>,
}

impl Validate for OptionsReply {
    type Output = Vec<ContractQuote>;

    /// Drops entries without a positive strike and premium; none left is a failure.
    fn validate(self) -> Result<Vec<ContractQuote>, SearchError> {
        let quotes: Vec<ContractQuote> = self
            .options
            .into_iter()
            .filter_map(|entry| {
                let strike = entry.strike.filter(|s| *s > Decimal::ZERO)?;
                let premium = entry.premium.filter(|p| *p > Decimal::ZERO)?;
                Some(ContractQuote::bare(strike, premium))
            })
            .collect();

        if quotes.is_empty() {
            return Err(SearchError::ParseFailure(
                "no option with a positive strike and premium".to_string(),
            ));
        }
        Ok(quotes)
    }
}

/// `{"current": number, "high": number, "low": number}`
#[derive(Debug, Clone, Deserialize)]
pub struct VolatilityReply {
    pub current: Decimal,
    pub high: Decimal,
    pub low: Decimal,
}

impl Validate for VolatilityReply {
    type Output = (Decimal, Decimal, Decimal);

    fn validate(self) -> Result<Self::Output, SearchError> {
        let positive = [self.current, self.high, self.low]
            .iter()
            .all(|v| *v > Decimal::ZERO);
        if !positive || self.low > self.high {
            return Err(SearchError::ParseFailure(format!(
                "implausible levels current={} high={} low={}",
                self.current, self.high, self.low
            )));
        }
        Ok((self.current, self.high, self.low))
    }
}
