use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("The search API key was rejected: {0}")]
    KeyInvalid(String),

    #[error("No search strategy produced a price for {0}")]
    PriceUnavailable(String),

    #[error("No search strategy produced volatility levels for {0}")]
    VolatilityUnavailable(String),

    #[error("Could not read a usable JSON payload from the reply: {0}")]
    ParseFailure(String),

    #[error("The search request returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to deserialize the search response: {0}")]
    Deserialization(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        // The key is a query parameter; keep it out of the message.
        SearchError::Network(e.without_url().to_string())
    }
}
