use crate::engine::{derive_row, RowInput};
use crate::error::AnalyticsError;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{ContractType, OptionRow, RowId};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A requested change to an existing row.
///
/// Fields left `None` keep the row's current value, cost basis included. Delta and
/// implied volatility are carried over to the re-derived row unless `clear_greeks` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowEdit {
    pub strike: Option<Decimal>,
    pub premium: Option<Decimal>,
    pub expiration: Option<NaiveDate>,
    pub contract_type: Option<ContractType>,
    pub cost_basis: Option<Decimal>,
    pub clear_greeks: bool,
}

/// The ordered collection of rows shown on the dashboard, keyed by `RowId`.
#[derive(Debug, Clone, Default)]
pub struct OptionBook {
    rows: Vec<OptionRow>,
    index: HashMap<RowId, usize>,
}

impl OptionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[OptionRow] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: &RowId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &RowId) -> Option<&OptionRow> {
        self.index.get(id).map(|&position| &self.rows[position])
    }

    /// Appends a row. An existing row with the same id is a conflict, never overwritten.
    pub fn insert(&mut self, row: OptionRow) -> Result<&OptionRow, AnalyticsError> {
        if self.index.contains_key(&row.id) {
            return Err(AnalyticsError::DuplicateRow(row.id));
        }
        let position = self.rows.len();
        self.index.insert(row.id.clone(), position);
        self.rows.push(row);
        Ok(&self.rows[position])
    }

    /// Derives a row from manual input and inserts it.
    pub fn add_manual(
        &mut self,
        input: &RowInput,
        as_of: DateTime<Utc>,
    ) -> Result<&OptionRow, AnalyticsError> {
        let row = derive_row(input, as_of)?;
        self.insert(row)
    }

    /// Re-derives the row `id` with the edit applied, keeping its position.
    pub fn update(
        &mut self,
        id: &RowId,
        edit: &RowEdit,
        as_of: DateTime<Utc>,
    ) -> Result<&OptionRow, AnalyticsError> {
        let position = *self
            .index
            .get(id)
            .ok_or_else(|| AnalyticsError::RowNotFound(id.clone()))?;
        let current = &self.rows[position];

        let (delta, implied_volatility) = if edit.clear_greeks {
            (None, None)
        } else {
            (current.delta, current.implied_volatility)
        };
        let input = RowInput::new(
            edit.strike.unwrap_or(current.strike),
            edit.premium.unwrap_or(current.premium),
            edit.expiration.unwrap_or(current.expiration),
            edit.contract_type.unwrap_or(current.contract_type),
        )
        .with_delta(delta)
        .with_implied_volatility(implied_volatility)
        .with_cost_basis(edit.cost_basis.or(current.cost_basis));

        let updated = derive_row(&input, as_of)?;
        if updated.id != *id && self.index.contains_key(&updated.id) {
            return Err(AnalyticsError::DuplicateRow(updated.id));
        }

        self.index.remove(id);
        self.index.insert(updated.id.clone(), position);
        self.rows[position] = updated;
        Ok(&self.rows[position])
    }

    pub fn remove(&mut self, id: &RowId) -> Result<OptionRow, AnalyticsError> {
        let position = self
            .index
            .remove(id)
            .ok_or_else(|| AnalyticsError::RowNotFound(id.clone()))?;
        let removed = self.rows.remove(position);
        self.reindex();
        Ok(removed)
    }

    /// Replaces the whole book, e.g. with a freshly fetched chain.
    ///
    /// Later rows whose id repeats an earlier one are dropped.
    pub fn replace_all(&mut self, rows: Vec<OptionRow>) {
        self.rows.clear();
        self.index.clear();
        for row in rows {
            if let Err(AnalyticsError::DuplicateRow(id)) = self.insert(row) {
                tracing::debug!(%id, "Dropping repeated contract from fetched chain.");
            }
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(position, row)| (row.id.clone(), position))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 15, 30, 0).unwrap()
    }

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 17).unwrap()
    }

    fn input(strike: Decimal, premium: Decimal) -> RowInput {
        RowInput::new(strike, premium, expiry(), ContractType::Put)
    }

    #[test]
    fn duplicate_manual_insert_is_rejected() {
        let mut book = OptionBook::new();
        book.add_manual(&input(dec!(490), dec!(3)), as_of()).unwrap();

        let err = book
            .add_manual(&input(dec!(490.0), dec!(9.99)), as_of())
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::DuplicateRow(_)));
        assert_eq!(book.len(), 1);
        assert_eq!(book.rows()[0].premium, dec!(3));
    }

    #[test]
    fn edit_preserves_greeks_unless_cleared() {
        let mut book = OptionBook::new();
        let id = book
            .add_manual(
                &input(dec!(490), dec!(3))
                    .with_delta(Some(dec!(-0.3)))
                    .with_implied_volatility(Some(dec!(0.19))),
                as_of(),
            )
            .unwrap()
            .id
            .clone();

        let edit = RowEdit {
            premium: Some(dec!(3.5)),
            ..RowEdit::default()
        };
        let updated = book.update(&id, &edit, as_of()).unwrap();
        assert_eq!(updated.premium, dec!(3.5));
        assert_eq!(updated.delta, Some(dec!(-0.3)));
        assert_eq!(updated.implied_volatility, Some(dec!(0.19)));
        assert_eq!(updated.win_rate, Some(dec!(70)));

        let clear = RowEdit {
            clear_greeks: true,
            ..RowEdit::default()
        };
        let cleared = book.update(&id, &clear, as_of()).unwrap();
        assert!(cleared.delta.is_none());
        assert!(cleared.win_rate.is_none());
    }

    #[test]
    fn premium_edit_keeps_the_call_cost_basis() {
        let mut book = OptionBook::new();
        let call = RowInput::new(dec!(510), dec!(4.5), expiry(), ContractType::Call)
            .with_cost_basis(Some(dec!(450)));
        let id = book.add_manual(&call, as_of()).unwrap().id.clone();

        let edit = RowEdit {
            premium: Some(dec!(4.5)),
            ..RowEdit::default()
        };
        let updated = book.update(&id, &edit, as_of()).unwrap();
        assert_eq!(updated.capital_required, dec!(45000));
        assert_eq!(updated.roi, dec!(1));
        assert_eq!(updated.breakeven, dec!(445.5));

        let rebased = RowEdit {
            cost_basis: Some(dec!(500)),
            ..RowEdit::default()
        };
        let updated = book.update(&id, &rebased, as_of()).unwrap();
        assert_eq!(updated.capital_required, dec!(50000));
        assert_eq!(updated.cost_basis, Some(dec!(500)));
    }

    #[test]
    fn edit_that_moves_onto_another_row_is_rejected() {
        let mut book = OptionBook::new();
        let first = book.add_manual(&input(dec!(490), dec!(3)), as_of()).unwrap().id.clone();
        book.add_manual(&input(dec!(485), dec!(1.2)), as_of()).unwrap();

        let edit = RowEdit {
            strike: Some(dec!(485)),
            ..RowEdit::default()
        };
        assert!(matches!(
            book.update(&first, &edit, as_of()),
            Err(AnalyticsError::DuplicateRow(_))
        ));
        assert_eq!(book.get(&first).unwrap().strike, dec!(490));
    }

    #[test]
    fn strike_edit_rekeys_in_place() {
        let mut book = OptionBook::new();
        let first = book.add_manual(&input(dec!(490), dec!(3)), as_of()).unwrap().id.clone();
        book.add_manual(&input(dec!(480), dec!(0.8)), as_of()).unwrap();

        let edit = RowEdit {
            strike: Some(dec!(495)),
            ..RowEdit::default()
        };
        let new_id = book.update(&first, &edit, as_of()).unwrap().id.clone();
        assert!(!book.contains(&first));
        assert_eq!(book.rows()[0].id, new_id);
    }

    #[test]
    fn removal_keeps_order_and_index_consistent() {
        let mut book = OptionBook::new();
        let a = book.add_manual(&input(dec!(490), dec!(3)), as_of()).unwrap().id.clone();
        let b = book.add_manual(&input(dec!(485), dec!(2)), as_of()).unwrap().id.clone();
        let c = book.add_manual(&input(dec!(480), dec!(1)), as_of()).unwrap().id.clone();

        book.remove(&a).unwrap();
        assert_eq!(book.get(&c).unwrap().strike, dec!(480));
        assert_eq!(book.rows()[0].id, b);
        assert!(matches!(book.remove(&a), Err(AnalyticsError::RowNotFound(_))));
    }
}
