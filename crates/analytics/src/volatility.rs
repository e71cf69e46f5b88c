use core_types::{VolatilityMetrics, VolatilityStatus};
use rust_decimal::Decimal;

/// Percent position of `current` inside `[low, high]`, clamped to 0-100.
///
/// A degenerate range (`high <= low`) reads as neutral: exactly 50.
pub fn iv_rank(current: Decimal, low: Decimal, high: Decimal) -> Decimal {
    if high <= low {
        return Decimal::from(50);
    }
    let rank = (current - low) / (high - low) * Decimal::ONE_HUNDRED;
    rank.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

/// Builds the volatility card from index levels.
pub fn volatility_metrics(current: Decimal, high: Decimal, low: Decimal) -> VolatilityMetrics {
    let rank = iv_rank(current, low, high);
    VolatilityMetrics {
        current,
        high,
        low,
        rank,
        status: VolatilityStatus::from_rank(rank),
    }
}
