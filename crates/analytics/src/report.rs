use crate::spread::{derive_spread, SpreadMetrics};
use core_types::{OptionRow, StrategyKind};
use rust_decimal::Decimal;
use serde::Serialize;

/// One row as seen through the selected strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyRowView {
    pub row: OptionRow,
    /// Only populated for put credit spreads; `None` there means no long leg matched.
    pub spread: Option<SpreadMetrics>,
}

impl StrategyRowView {
    /// The annualized figure the strategy is judged by.
    pub fn headline_return(&self, strategy: StrategyKind) -> Option<Decimal> {
        match strategy {
            StrategyKind::PutCreditSpread => {
                self.spread.as_ref().and_then(|s| s.annualized_return)
            }
            StrategyKind::CashSecuredPut | StrategyKind::CoveredCall => {
                Some(self.row.annualized_return)
            }
        }
    }
}

/// Builds the per-row view for `strategy`, keeping only rows of its contract type.
pub fn strategy_view(
    rows: &[OptionRow],
    strategy: StrategyKind,
    spread_width: Decimal,
    width_tolerance: Decimal,
) -> Vec<StrategyRowView> {
    rows.iter()
        .filter(|row| row.contract_type == strategy.contract_type())
        .map(|row| StrategyRowView {
            row: row.clone(),
            spread: match strategy {
                StrategyKind::PutCreditSpread => {
                    derive_spread(row, rows, spread_width, width_tolerance)
                }
                _ => None,
            },
        })
        .collect()
}

/// Aggregate figures for the summary cards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookSummary {
    pub best_annualized: Option<Decimal>,
    pub average_annualized: Option<Decimal>,
    /// Averaged only over rows that have a win rate.
    pub average_win_rate: Option<Decimal>,
    pub total_capital: Option<Decimal>,
}

pub fn summarize(rows: &[OptionRow]) -> BookSummary {
    if rows.is_empty() {
        return BookSummary::default();
    }
    let count = Decimal::from(rows.len());

    let best_annualized = rows.iter().map(|r| r.annualized_return).max();
    let average_annualized =
        Some(rows.iter().map(|r| r.annualized_return).sum::<Decimal>() / count);
    let total_capital = Some(rows.iter().map(|r| r.capital_required).sum());

    let win_rates: Vec<Decimal> = rows.iter().filter_map(|r| r.win_rate).collect();
    let average_win_rate = (!win_rates.is_empty())
        .then(|| win_rates.iter().sum::<Decimal>() / Decimal::from(win_rates.len()));

    BookSummary {
        best_annualized,
        average_annualized,
        average_win_rate,
        total_capital,
    }
}
