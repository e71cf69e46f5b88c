//! # Yieldscope Engine
//!
//! The acquisition orchestrator. It owns the dashboard session state, picks a
//! provider from the configured keys, falls back from the structured API to AI
//! search, normalizes quotes into rows and broadcasts progress to the renderer.

pub mod dashboard;
pub mod error;
pub mod provider;

pub use dashboard::{Dashboard, DashboardState, FetchOutcome, FetchRequest};
pub use error::EngineError;
pub use provider::{LiveProviders, Progress, ProviderFactory, QuoteProvider, VolatilitySource};
