use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("The API key was rejected: {0}")]
    KeyInvalid(String),

    #[error("The API key's plan does not include this data: {0}")]
    EntitlementRestricted(String),

    #[error("No price available for {0} from the latest trade or previous close")]
    PriceUnavailable(String),

    #[error("The API request returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the key as a query parameter.
        ApiError::Network(e.without_url().to_string())
    }
}
