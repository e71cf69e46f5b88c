//! # Yieldscope Core Types
//!
//! The shared vocabulary of the workspace: raw provider quotes, normalized option
//! rows, volatility metrics and acquisition results.
//!
//! As a Layer 0 crate it has no knowledge of HTTP, configuration or rendering.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{ContractType, KeyStatus, StrategyKind, VolatilityStatus};
pub use error::CoreError;
pub use structs::{
    merge_citations, AcquisitionResult, ChainRequest, Citation, ContractQuote, OptionRow, RowId,
    VolatilityMetrics,
};
