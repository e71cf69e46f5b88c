use crate::error::ConfigError;
use core_types::StrategyKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub underlying: UnderlyingSettings,
    pub structured_api: StructuredApiSettings,
    pub ai_search: AiSearchSettings,
    pub dashboard: DashboardSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Rejects values that would make the metrics or the fetch meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.underlying.ticker.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "underlying.ticker must not be empty".to_string(),
            ));
        }
        if self.dashboard.spread_width <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "dashboard.spread_width must be greater than 0".to_string(),
            ));
        }
        if self.dashboard.cost_basis < Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "dashboard.cost_basis must not be negative".to_string(),
            ));
        }
        if self.structured_api.top_n == 0 {
            return Err(ConfigError::ValidationError(
                "structured_api.top_n must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The single ETF the dashboard analyses.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnderlyingSettings {
    pub ticker: String,
    /// The index whose 52-week range drives the volatility card (e.g. "VIX").
    pub volatility_index: String,
}

impl Default for UnderlyingSettings {
    fn default() -> Self {
        Self {
            ticker: "SPY".to_string(),
            volatility_index: "VIX".to_string(),
        }
    }
}

/// Parameters for the structured market-data REST provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StructuredApiSettings {
    pub base_url: String,
    /// Server-side cap on snapshot results.
    pub snapshot_limit: u32,
    /// Contracts kept after sorting nearest the money.
    pub top_n: usize,
    pub timeout_secs: u64,
}

impl Default for StructuredApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.polygon.io".to_string(),
            snapshot_limit: 250,
            top_n: 15,
            timeout_secs: 20,
        }
    }
}

/// Parameters for the search-grounded generative model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiSearchSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for AiSearchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            timeout_secs: 60,
        }
    }
}

/// The user-facing dashboard parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub strategy: StrategyKind,
    /// Target distance between the short and long legs of a credit spread.
    pub spread_width: Decimal,
    /// Cost basis of the owned shares for covered calls; 0 means "use the strike".
    pub cost_basis: Decimal,
    /// Above this difference between actual and target width the spread is flagged.
    pub width_tolerance: Decimal,
    /// Annualized volatility assumed when computing expected-move targets.
    pub baseline_volatility: Decimal,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::CashSecuredPut,
            spread_width: dec!(5),
            cost_basis: Decimal::ZERO,
            width_tolerance: dec!(0.5),
            baseline_volatility: dec!(0.18),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Fallback filter when `RUST_LOG` is unset.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}
