use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The side of an option contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Put,
    Call,
}

impl ContractType {
    /// The lowercase form used in provider query strings and row ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Put => "put",
            ContractType::Call => "call",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "put" | "p" => Ok(ContractType::Put),
            "call" | "c" => Ok(ContractType::Call),
            other => Err(CoreError::InvalidInput(
                "contract type".to_string(),
                other.to_string(),
            )),
        }
    }
}

/// The option-selling strategy the dashboard is evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Cash-secured put.
    #[serde(rename = "csp")]
    CashSecuredPut,
    /// Put credit spread.
    #[serde(rename = "pcs")]
    PutCreditSpread,
    /// Covered call.
    #[serde(rename = "cc")]
    CoveredCall,
}

impl StrategyKind {
    /// The contract type whose chain this strategy sells.
    pub fn contract_type(&self) -> ContractType {
        match self {
            StrategyKind::CashSecuredPut | StrategyKind::PutCreditSpread => ContractType::Put,
            StrategyKind::CoveredCall => ContractType::Call,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            StrategyKind::CashSecuredPut => "CSP",
            StrategyKind::PutCreditSpread => "PCS",
            StrategyKind::CoveredCall => "CC",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for StrategyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csp" | "cash-secured-put" => Ok(StrategyKind::CashSecuredPut),
            "pcs" | "put-credit-spread" => Ok(StrategyKind::PutCreditSpread),
            "cc" | "covered-call" => Ok(StrategyKind::CoveredCall),
            other => Err(CoreError::InvalidInput(
                "strategy".to_string(),
                other.to_string(),
            )),
        }
    }
}

/// Outcome of a provider key check that reached the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStatus {
    Valid,
    Invalid,
}

/// Qualitative reading of the volatility index rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityStatus {
    /// Rank at or above 50: premiums are rich, favor selling.
    HighFavorSelling,
    Neutral,
    /// Rank at or below 20: premiums are thin, favor buying.
    LowFavorBuying,
}

impl VolatilityStatus {
    /// Classifies a 0-100 rank: `>= 50` sell-favorable, `<= 20` buy-favorable.
    pub fn from_rank(rank: Decimal) -> Self {
        if rank >= Decimal::from(50) {
            VolatilityStatus::HighFavorSelling
        } else if rank <= Decimal::from(20) {
            VolatilityStatus::LowFavorBuying
        } else {
            VolatilityStatus::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VolatilityStatus::HighFavorSelling => "High volatility - favor selling",
            VolatilityStatus::Neutral => "Neutral",
            VolatilityStatus::LowFavorBuying => "Low volatility - favor buying",
        }
    }

    /// The tri-colour classification consumed by the presentation layer.
    pub fn tone(&self) -> &'static str {
        match self {
            VolatilityStatus::HighFavorSelling => "sell",
            VolatilityStatus::Neutral => "neutral",
            VolatilityStatus::LowFavorBuying => "buy",
        }
    }
}
