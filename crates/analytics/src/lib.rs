//! # Yieldscope Metrics Engine
//!
//! Turns raw `(strike, premium)` pairs into comparable yield and risk figures for
//! cash-secured puts, put credit spreads and covered calls.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** pure and deterministic, no I/O. Every function that depends
//!   on the current date takes an explicit `as_of` instant.
//! - **Unavailable is not zero:** metrics that cannot be computed (win rate without a
//!   delta, spread figures without a long leg) are `None`, never a fabricated number.
//!
//! ## Public API
//!
//! - `derive_row` / `row_from_quote`: normalize a contract into an `OptionRow`.
//! - `find_long_leg` / `derive_spread`: nearest-strike vertical spread matching.
//! - `iv_rank` / `volatility_metrics`: position of the volatility index in its range.
//! - `target_strike_band` / `expected_move_targets`: strike seeds for the providers.
//! - `OptionBook`: the ordered, duplicate-rejecting row collection.
//! - `summarize` / `strategy_view`: per-strategy views for the presentation layer.

// Declare the modules that constitute this crate.
pub mod book;
pub mod engine;
pub mod error;
pub mod report;
pub mod spread;
pub mod targets;
pub mod volatility;

// Re-export the key components to create a clean, public-facing API.
pub use book::{OptionBook, RowEdit};
pub use engine::{days_to_expiration, derive_row, row_from_quote, RowInput};
pub use error::AnalyticsError;
pub use report::{strategy_view, summarize, BookSummary, StrategyRowView};
pub use spread::{derive_spread, find_long_leg, SpreadMetrics};
pub use targets::{expected_move_targets, target_strike_band, ExpectedMove};
pub use volatility::{iv_rank, volatility_metrics};
