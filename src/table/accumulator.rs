//! Accumulators for group-reduce.
//!
//! An accumulator folds the cells of one group into a single numeric value.
//! `reduce` resets it at the start of every group and turns its final state
//! into a literal cell.

use std::collections::HashSet;
use std::fmt;

use crate::triple::Literal;

use super::{Cell, TableError, TableResult};

/// The value domain accumulators operate in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccumulatorValue {
    Int64(i64),
    Float64(f64),
}

impl AccumulatorValue {
    /// Converts the final accumulator state into a literal cell.
    pub fn into_cell(self) -> Cell {
        match self {
            AccumulatorValue::Int64(v) => Cell::Literal(Literal::Int64(v)),
            AccumulatorValue::Float64(v) => Cell::Literal(Literal::Float64(v)),
        }
    }
}

/// A streaming fold over the cells of one group.
pub trait Accumulator: fmt::Debug + Send {
    /// Folds one cell in and returns the running value.
    fn accumulate(&mut self, cell: &Cell) -> TableResult<AccumulatorValue>;

    /// Restores the initial state, ready for the next group.
    fn reset(&mut self);
}

/// Sums int64 literal cells, starting from an initial value.
#[derive(Debug)]
pub struct SumInt64 {
    initial: i64,
    state: i64,
}

impl SumInt64 {
    pub fn new(initial: i64) -> SumInt64 {
        SumInt64 {
            initial,
            state: initial,
        }
    }
}

impl Accumulator for SumInt64 {
    fn accumulate(&mut self, cell: &Cell) -> TableResult<AccumulatorValue> {
        match cell {
            Cell::Literal(Literal::Int64(v)) => {
                self.state += v;
                Ok(AccumulatorValue::Int64(self.state))
            }
            other => Err(TableError::InvalidAccumulation(format!(
                "sum of int64 saw cell {other:?}"
            ))),
        }
    }

    fn reset(&mut self) {
        self.state = self.initial;
    }
}

/// Sums float64 literal cells, starting from an initial value.
#[derive(Debug)]
pub struct SumFloat64 {
    initial: f64,
    state: f64,
}

impl SumFloat64 {
    pub fn new(initial: f64) -> SumFloat64 {
        SumFloat64 {
            initial,
            state: initial,
        }
    }
}

impl Accumulator for SumFloat64 {
    fn accumulate(&mut self, cell: &Cell) -> TableResult<AccumulatorValue> {
        match cell {
            Cell::Literal(Literal::Float64(v)) => {
                self.state += v;
                Ok(AccumulatorValue::Float64(self.state))
            }
            other => Err(TableError::InvalidAccumulation(format!(
                "sum of float64 saw cell {other:?}"
            ))),
        }
    }

    fn reset(&mut self) {
        self.state = self.initial;
    }
}

/// Counts cells, whatever they hold.
#[derive(Debug, Default)]
pub struct Count {
    state: i64,
}

impl Count {
    pub fn new() -> Count {
        Count::default()
    }
}

impl Accumulator for Count {
    fn accumulate(&mut self, _cell: &Cell) -> TableResult<AccumulatorValue> {
        self.state += 1;
        Ok(AccumulatorValue::Int64(self.state))
    }

    fn reset(&mut self) {
        self.state = 0;
    }
}

/// Counts distinct cells, keyed on their canonical string form.
#[derive(Debug, Default)]
pub struct CountDistinct {
    seen: HashSet<String>,
}

impl CountDistinct {
    pub fn new() -> CountDistinct {
        CountDistinct::default()
    }
}

impl Accumulator for CountDistinct {
    fn accumulate(&mut self, cell: &Cell) -> TableResult<AccumulatorValue> {
        self.seen.insert(cell.to_string());
        Ok(AccumulatorValue::Int64(self.seen.len() as i64))
    }

    fn reset(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_cell(v: i64) -> Cell {
        Cell::Literal(Literal::Int64(v))
    }

    #[test]
    fn test_sum_int64_accumulates_from_initial() {
        let mut acc = SumInt64::new(10);
        assert_eq!(acc.accumulate(&int_cell(5)).unwrap(), AccumulatorValue::Int64(15));
        assert_eq!(acc.accumulate(&int_cell(-3)).unwrap(), AccumulatorValue::Int64(12));
        acc.reset();
        assert_eq!(acc.accumulate(&int_cell(1)).unwrap(), AccumulatorValue::Int64(11));
    }

    #[test]
    fn test_sum_int64_rejects_other_cells() {
        let mut acc = SumInt64::new(0);
        assert!(acc.accumulate(&Cell::Text("x".into())).is_err());
        assert!(acc.accumulate(&Cell::Literal(Literal::Float64(1.0))).is_err());
    }

    #[test]
    fn test_sum_float64() {
        let mut acc = SumFloat64::new(1.0);
        assert_eq!(
            acc.accumulate(&Cell::Literal(Literal::Float64(0.5))).unwrap(),
            AccumulatorValue::Float64(1.5)
        );
    }

    #[test]
    fn test_count_counts_everything() {
        let mut acc = Count::new();
        acc.accumulate(&Cell::Text("a".into())).unwrap();
        acc.accumulate(&Cell::Empty).unwrap();
        assert_eq!(acc.accumulate(&int_cell(9)).unwrap(), AccumulatorValue::Int64(3));
        acc.reset();
        assert_eq!(acc.accumulate(&Cell::Empty).unwrap(), AccumulatorValue::Int64(1));
    }

    #[test]
    fn test_count_distinct_keys_on_canonical_form() {
        let mut acc = CountDistinct::new();
        acc.accumulate(&Cell::Text("a".into())).unwrap();
        acc.accumulate(&Cell::Text("a".into())).unwrap();
        let v = acc.accumulate(&Cell::Text("b".into())).unwrap();
        assert_eq!(v, AccumulatorValue::Int64(2));
    }
}
