//! # Yieldscope Events
//!
//! The event structures the acquisition engine broadcasts to whatever renders the
//! dashboard: progress strings, user-visible notices, fetch-state transitions and
//! late-arriving volatility metrics.
//!
//! As a Layer 0 crate it depends only on `core-types`.

// Declare the modules that make up this crate.
pub mod error;
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use error::EventsError;
pub use messages::{DashboardEvent, FetchPhase, LogLevel, Notice};
