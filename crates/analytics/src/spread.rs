use core_types::{ContractType, OptionRow, RowId};
use rust_decimal::Decimal;
use serde::Serialize;

/// Figures for a vertical credit spread built from a short row and its matched long leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadMetrics {
    pub long_leg: RowId,
    pub long_strike: Decimal,
    pub long_premium: Decimal,
    pub net_credit: Decimal,
    /// Distance between the legs actually matched; may differ from the target.
    pub actual_width: Decimal,
    /// Set when the actual width is further than the tolerance from the target.
    pub width_mismatch: bool,
    pub max_risk: Decimal,
    /// Percent; `None` when max risk is not positive.
    pub roi: Option<Decimal>,
    /// Percent; `None` whenever `roi` is.
    pub annualized_return: Option<Decimal>,
}

/// Picks the long leg for `short` among `rows`.
///
/// For a put spread the candidates are puts of the same expiration with a strike
/// strictly below the short strike, and the winner is the one closest to
/// `short.strike - target_width`. Calls mirror this above the short strike.
/// On a tie the candidate found first in `rows` wins.
pub fn find_long_leg<'a>(
    short: &OptionRow,
    rows: &'a [OptionRow],
    target_width: Decimal,
) -> Option<&'a OptionRow> {
    let target = match short.contract_type {
        ContractType::Put => short.strike - target_width,
        ContractType::Call => short.strike + target_width,
    };

    let candidates = rows
        .iter()
        .filter(|row| {
            row.contract_type == short.contract_type && row.expiration == short.expiration
        })
        .filter(|row| match short.contract_type {
            ContractType::Put => row.strike < short.strike,
            ContractType::Call => row.strike > short.strike,
        });

    let mut best: Option<(&OptionRow, Decimal)> = None;
    for row in candidates {
        let distance = (row.strike - target).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((row, distance)),
        }
    }
    best.map(|(row, _)| row)
}

/// Derives the credit-spread figures for `short`, or `None` if no long leg exists.
pub fn derive_spread(
    short: &OptionRow,
    rows: &[OptionRow],
    target_width: Decimal,
    tolerance: Decimal,
) -> Option<SpreadMetrics> {
    let long = find_long_leg(short, rows, target_width)?;
    let hundred = Decimal::ONE_HUNDRED;

    let net_credit = short.premium - long.premium;
    let actual_width = (short.strike - long.strike).abs();
    let width_mismatch = (actual_width - target_width).abs() > tolerance;
    let max_risk = actual_width * hundred - net_credit * hundred;

    let roi = (max_risk > Decimal::ZERO).then(|| net_credit * hundred / max_risk * hundred);
    let annualized_return =
        roi.map(|roi| roi * Decimal::from(365) / Decimal::from(short.days_to_expiration));

    if width_mismatch {
        tracing::debug!(
            short = %short.id,
            long = %long.id,
            %actual_width,
            %target_width,
            "Matched long leg differs from the target width."
        );
    }

    Some(SpreadMetrics {
        long_leg: long.id.clone(),
        long_strike: long.strike,
        long_premium: long.premium,
        net_credit,
        actual_width,
        width_mismatch,
        max_risk,
        roi,
        annualized_return,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{derive_row, RowInput};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 17).unwrap()
    }

    fn row(strike: Decimal, premium: Decimal, side: ContractType) -> OptionRow {
        let as_of = Utc.with_ymd_and_hms(2025, 1, 10, 15, 30, 0).unwrap();
        derive_row(&RowInput::new(strike, premium, expiry(), side), as_of).unwrap()
    }

    fn put(strike: Decimal, premium: Decimal) -> OptionRow {
        row(strike, premium, ContractType::Put)
    }

    #[test]
    fn matches_strike_closest_to_target_width() {
        let short = put(dec!(490), dec!(3));
        let rows = vec![
            short.clone(),
            put(dec!(470), dec!(0.4)),
            put(dec!(480), dec!(0.8)),
            put(dec!(485), dec!(1.2)),
        ];
        let long = find_long_leg(&short, &rows, dec!(5)).unwrap();
        assert_eq!(long.strike, dec!(485));
    }

    #[test]
    fn spread_figures_match_worked_example() {
        let short = put(dec!(490), dec!(3.00));
        let rows = vec![short.clone(), put(dec!(485), dec!(1.20)), put(dec!(480), dec!(0.8))];

        let spread = derive_spread(&short, &rows, dec!(5), dec!(0.5)).unwrap();
        assert_eq!(spread.net_credit, dec!(1.80));
        assert_eq!(spread.actual_width, dec!(5));
        assert_eq!(spread.max_risk, dec!(320));
        assert_eq!(spread.roi, Some(dec!(56.25)));
        assert!(!spread.width_mismatch);
        assert_eq!(
            spread.annualized_return,
            Some(dec!(56.25) * Decimal::from(365) / Decimal::from(7))
        );
    }

    #[test]
    fn no_lower_strike_means_no_spread() {
        let short = put(dec!(470), dec!(0.4));
        let rows = vec![short.clone(), put(dec!(480), dec!(0.8)), put(dec!(490), dec!(3))];
        assert!(find_long_leg(&short, &rows, dec!(5)).is_none());
        assert!(derive_spread(&short, &rows, dec!(5), dec!(0.5)).is_none());
    }

    #[test]
    fn flags_width_mismatch_beyond_tolerance() {
        let short = put(dec!(490), dec!(3));
        let rows = vec![short.clone(), put(dec!(480), dec!(0.8))];
        let spread = derive_spread(&short, &rows, dec!(5), dec!(0.5)).unwrap();
        assert_eq!(spread.actual_width, dec!(10));
        assert!(spread.width_mismatch);
    }

    #[test]
    fn tie_keeps_the_first_candidate_in_row_order() {
        let short = put(dec!(490), dec!(3));
        let rows = vec![put(dec!(482.5), dec!(1)), put(dec!(487.5), dec!(2)), short.clone()];
        let long = find_long_leg(&short, &rows, dec!(5)).unwrap();
        assert_eq!(long.strike, dec!(482.5));

        let reversed = vec![put(dec!(487.5), dec!(2)), put(dec!(482.5), dec!(1)), short.clone()];
        let long = find_long_leg(&short, &reversed, dec!(5)).unwrap();
        assert_eq!(long.strike, dec!(487.5));
    }

    #[test]
    fn non_positive_max_risk_leaves_roi_unavailable() {
        let short = put(dec!(490), dec!(6));
        let rows = vec![short.clone(), put(dec!(485), dec!(0.5))];
        let spread = derive_spread(&short, &rows, dec!(5), dec!(0.5)).unwrap();
        assert_eq!(spread.max_risk, dec!(-50));
        assert!(spread.roi.is_none());
        assert!(spread.annualized_return.is_none());
    }

    #[test]
    fn call_spreads_look_above_the_short_strike() {
        let short = row(dec!(500), dec!(2.5), ContractType::Call);
        let rows = vec![
            row(dec!(495), dec!(4), ContractType::Call),
            row(dec!(505), dec!(1), ContractType::Call),
            put(dec!(505), dec!(9)),
        ];
        let spread = derive_spread(&short, &rows, dec!(5), dec!(0.5)).unwrap();
        assert_eq!(spread.long_strike, dec!(505));
        assert_eq!(spread.net_credit, dec!(1.5));
    }
}
