use core_types::RowId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("A contract with id '{0}' is already in the table")]
    DuplicateRow(RowId),

    #[error("No row with id '{0}'")]
    RowNotFound(RowId),

    #[error("Invalid input for {0}: {1}")]
    InvalidInput(&'static str, String),
}
