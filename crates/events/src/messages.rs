use crate::error::EventsError;
use chrono::{DateTime, Utc};
use core_types::VolatilityMetrics;
use serde::{Deserialize, Serialize};

/// Enum representing the severity of a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A user-visible message about the fetch.
///
/// A `Warn` notice means an automatic fallback is already in progress and nothing
/// is required of the user. An `Error` notice is fatal; `action` then tells the
/// user what to do (e.g. supply a key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub action: Option<String>,
}

impl Notice {
    pub fn fallback(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: LogLevel::Warn,
            message: message.into(),
            action: None,
        }
    }

    pub fn fatal(message: impl Into<String>, action: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: LogLevel::Error,
            message: message.into(),
            action,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.level == LogLevel::Error
    }
}

/// The coarse state of the fetch control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchPhase {
    Idle,
    Loading,
    Success,
    /// A price was found but the chain came back empty. Not an error.
    NoChainFound,
    Error,
}

/// The top-level event enum.
///
/// Serializes as `{ "type": "...", "payload": ... }` so a UI can switch on `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum DashboardEvent {
    /// A human-readable status emitted before each provider attempt.
    Progress(String),
    Notice(Notice),
    PhaseChanged(FetchPhase),
    /// Volatility metrics resolved; may arrive before or after the chain.
    VolatilityUpdated(VolatilityMetrics),
}

impl DashboardEvent {
    pub fn to_json(&self) -> Result<String, EventsError> {
        serde_json::to_string(self).map_err(|e| EventsError::Serialization(e.to_string()))
    }
}
