use crate::error::AnalyticsError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use core_types::{ContractQuote, ContractType, OptionRow, RowId};
use rust_decimal::Decimal;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Everything needed to derive one `OptionRow`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowInput {
    pub strike: Decimal,
    pub premium: Decimal,
    pub expiration: NaiveDate,
    pub contract_type: ContractType,
    pub delta: Option<Decimal>,
    pub implied_volatility: Option<Decimal>,
    /// Only consulted for calls; `None` or a non-positive value means "use the strike".
    pub cost_basis: Option<Decimal>,
}

impl RowInput {
    pub fn new(
        strike: Decimal,
        premium: Decimal,
        expiration: NaiveDate,
        contract_type: ContractType,
    ) -> Self {
        Self {
            strike,
            premium,
            expiration,
            contract_type,
            delta: None,
            implied_volatility: None,
            cost_basis: None,
        }
    }

    pub fn with_delta(mut self, delta: Option<Decimal>) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_implied_volatility(mut self, iv: Option<Decimal>) -> Self {
        self.implied_volatility = iv;
        self
    }

    pub fn with_cost_basis(mut self, cost_basis: Option<Decimal>) -> Self {
        self.cost_basis = cost_basis;
        self
    }
}

/// Whole days until expiration, rounded up and never below 1.
///
/// The expiration date is taken at 00:00 UTC.
pub fn days_to_expiration(expiration: NaiveDate, as_of: DateTime<Utc>) -> i64 {
    let expires_at = expiration.and_time(NaiveTime::default()).and_utc();
    let remaining = (expires_at - as_of).num_milliseconds();
    if remaining <= 0 {
        return 1;
    }
    let days = (remaining + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
    days.max(1)
}

/// Derives the yield and risk figures for one contract.
///
/// Calls are measured against the cost basis when one is supplied, otherwise
/// against the strike. Win rate is only present when a delta is.
pub fn derive_row(input: &RowInput, as_of: DateTime<Utc>) -> Result<OptionRow, AnalyticsError> {
    if input.strike <= Decimal::ZERO {
        return Err(AnalyticsError::InvalidInput(
            "strike",
            format!("{} must be greater than 0", input.strike),
        ));
    }
    if input.premium < Decimal::ZERO {
        return Err(AnalyticsError::InvalidInput(
            "premium",
            format!("{} must not be negative", input.premium),
        ));
    }

    let hundred = Decimal::ONE_HUNDRED;
    let days = days_to_expiration(input.expiration, as_of);

    let cost_basis = input.cost_basis.filter(|basis| *basis > Decimal::ZERO);
    let basis = match input.contract_type {
        ContractType::Call => cost_basis.unwrap_or(input.strike),
        ContractType::Put => input.strike,
    };

    let capital_required = basis * hundred;
    let roi = input.premium / basis * hundred;
    let breakeven = basis - input.premium;
    let annualized_return = roi * Decimal::from(365) / Decimal::from(days);
    let win_rate = input
        .delta
        .map(|delta| (Decimal::ONE - delta.abs()) * hundred);

    Ok(OptionRow {
        id: RowId::new(input.strike, input.expiration, input.contract_type),
        strike: input.strike,
        premium: input.premium,
        contract_type: input.contract_type,
        expiration: input.expiration,
        days_to_expiration: days,
        annualized_return,
        roi,
        breakeven,
        capital_required,
        delta: input.delta,
        implied_volatility: input.implied_volatility,
        win_rate,
        cost_basis,
    })
}

/// Normalizes a provider quote for the given expiration and side.
pub fn row_from_quote(
    quote: &ContractQuote,
    expiration: NaiveDate,
    contract_type: ContractType,
    cost_basis: Option<Decimal>,
    as_of: DateTime<Utc>,
) -> Result<OptionRow, AnalyticsError> {
    let input = RowInput::new(quote.strike, quote.premium, expiration, contract_type)
        .with_delta(quote.delta)
        .with_implied_volatility(quote.implied_volatility)
        .with_cost_basis(cost_basis);
    derive_row(&input, as_of)
}
