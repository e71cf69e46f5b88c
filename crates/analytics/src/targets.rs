use crate::engine::days_to_expiration;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::ContractType;
use rust_decimal::{Decimal, MathematicalOps};
use serde::Serialize;

const STRIKE_STEP: i64 = 5;

/// Three candidate strikes around the money used to seed search queries.
///
/// Puts: the price rounded down to a multiple of 5, then 5 and 10 below it.
/// Calls: the price rounded up to a multiple of 5, then 5 and 10 above it.
pub fn target_strike_band(current_price: Decimal, contract_type: ContractType) -> [Decimal; 3] {
    let step = Decimal::from(STRIKE_STEP);
    match contract_type {
        ContractType::Put => {
            let base = (current_price / step).floor() * step;
            [base, base - step, base - step * Decimal::TWO]
        }
        ContractType::Call => {
            let base = (current_price / step).ceil() * step;
            [base, base + step, base + step * Decimal::TWO]
        }
    }
}

/// Strike targets at 0.5, 1 and 2 expected standard deviations from the price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedMove {
    pub aggressive: Decimal,
    pub moderate: Decimal,
    pub safe: Decimal,
    pub std_dev: Decimal,
}

impl ExpectedMove {
    pub fn targets(&self) -> [Decimal; 3] {
        [self.aggressive, self.moderate, self.safe]
    }
}

/// Scales `baseline_volatility` by the square root of time to expiration.
///
/// `std_dev = price * vol * sqrt(days / 365)`; puts subtract multiples of it
/// from the price, calls add them.
pub fn expected_move_targets(
    current_price: Decimal,
    expiration: NaiveDate,
    as_of: DateTime<Utc>,
    baseline_volatility: Decimal,
    contract_type: ContractType,
) -> ExpectedMove {
    let days = days_to_expiration(expiration, as_of);
    let time_factor = (Decimal::from(days) / Decimal::from(365))
        .sqrt()
        .unwrap_or(Decimal::ZERO);
    let std_dev = current_price * baseline_volatility * time_factor;

    let sign = match contract_type {
        ContractType::Put => Decimal::NEGATIVE_ONE,
        ContractType::Call => Decimal::ONE,
    };
    let offset = |multiple: Decimal| current_price + sign * multiple * std_dev;

    ExpectedMove {
        aggressive: offset(Decimal::new(5, 1)),
        moderate: offset(Decimal::ONE),
        safe: offset(Decimal::TWO),
        std_dev,
    }
}
