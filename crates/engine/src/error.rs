use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("No data source configured: add a structured-API or AI-search key")]
    NoDataSource,

    #[error("A fetch is already in progress")]
    FetchInProgress,

    #[error("Structured API error: {0}")]
    Structured(#[from] api_client::error::ApiError),

    #[error("AI search error: {0}")]
    Search(#[from] search_client::error::SearchError),

    #[error("Row error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),
}

impl EngineError {
    /// The provider rejected its key, as opposed to failing to find data.
    pub fn is_key_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::Structured(api_client::error::ApiError::KeyInvalid(_))
                | EngineError::Search(search_client::error::SearchError::KeyInvalid(_))
        )
    }
}
