//! In-memory binding tables.
//!
//! A [`Table`] is an ordered list of unique binding names plus a list of
//! rows, where a row maps binding names to [`Cell`]s. Tables are the
//! currency of the query planner: the data-access stage streams triples
//! into per-clause tables, and the planner folds those together with the
//! algebra implemented here (dot product, left-optional join, sort,
//! group-reduce, filter, limit, projection).
//!
//! ## Concurrency
//!
//! A table is a shared-resource container. All state lives behind one
//! `parking_lot::RwLock`: mutating operations hold the write lock for the
//! whole operation, so readers never observe a partial mutation.

mod accumulator;

pub use accumulator::{Accumulator, AccumulatorValue, Count, CountDistinct, SumFloat64, SumInt64};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use thiserror::Error;

use crate::triple::{format_anchor, Literal, Node, Predicate};

/// Binding-table errors.
#[derive(Error, Debug)]
pub enum TableError {
    /// A binding name appears more than once
    #[error("duplicate binding: {0}")]
    DuplicateBinding(String),

    /// A binding name is empty or contains whitespace
    #[error("invalid binding name: {0:?}")]
    InvalidBinding(String),

    /// A referenced binding is not part of the table
    #[error("unknown binding: {0}")]
    UnknownBinding(String),

    /// Reduce specs do not cover the visible bindings exactly once
    #[error("reduce specs do not match the table schema: {0}")]
    ReduceSchemaMismatch(String),

    /// Binding sets incompatible for dot product or append
    #[error("incompatible bindings: {0}")]
    IncompatibleBindings(String),

    /// Row index past the end of the table
    #[error("row index {0} out of bounds ({1} rows)")]
    RowOutOfBounds(usize, usize),

    /// An accumulator saw a cell it cannot fold
    #[error("invalid accumulation: {0}")]
    InvalidAccumulation(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

// ============================================================================
// Cells and rows
// ============================================================================

/// One slot of a row: exactly one populated value, or empty (NULL).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Node(Node),
    Predicate(Predicate),
    Literal(Literal),
    Time(DateTime<Utc>),
}

impl Cell {
    /// True for the NULL cell.
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// The string form used by sort comparisons: literals use their
    /// comparable form, times their RFC 3339 nanosecond form, everything
    /// else its canonical string. Empty cells sort before everything.
    pub fn sort_form(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Literal(l) => l.comparable_form(),
            Cell::Time(t) => format_anchor(t),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Node(n) => n.fmt(f),
            Cell::Predicate(p) => p.fmt(f),
            Cell::Literal(l) => l.fmt(f),
            Cell::Time(t) => write!(f, "{}", format_anchor(t)),
        }
    }
}

/// A row maps binding names to cells.
pub type Row = HashMap<String, Cell>;

// ============================================================================
// Sorting
// ============================================================================

/// One sort key: a binding plus a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub binding: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(binding: &str) -> SortKey {
        SortKey {
            binding: binding.to_string(),
            descending: false,
        }
    }

    pub fn desc(binding: &str) -> SortKey {
        SortKey {
            binding: binding.to_string(),
            descending: true,
        }
    }
}

/// A multi-key sort configuration, applied left to right.
pub type SortConfig = Vec<SortKey>;

fn compare_rows(a: &Row, b: &Row, cfg: &[SortKey]) -> std::cmp::Ordering {
    for key in cfg {
        let av = a.get(&key.binding).map(Cell::sort_form).unwrap_or_default();
        let bv = b.get(&key.binding).map(Cell::sort_form).unwrap_or_default();
        let mut ord = av.cmp(&bv);
        if key.descending {
            ord = ord.reverse();
        }
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

/// Extracts the comparable key of `row` over `keys`, in key order.
fn group_key(row: &Row, keys: &[String]) -> Vec<String> {
    keys.iter()
        .map(|k| row.get(k).map(Cell::sort_form).unwrap_or_default())
        .collect()
}

/// Merges two rows; on a shared key the left value wins.
fn merge_rows(left: &Row, right: &Row) -> Row {
    let mut merged = left.clone();
    for (k, v) in right {
        merged.entry(k.clone()).or_insert_with(|| v.clone());
    }
    merged
}

// ============================================================================
// Reduce specs
// ============================================================================

/// One (input binding, output binding, optional accumulator) entry of a
/// group-reduce. Without an accumulator the group's first value passes
/// through; with one, the accumulator's final state becomes a literal cell.
#[derive(Debug)]
pub struct ReduceSpec {
    pub input: String,
    pub output: String,
    pub accumulator: Option<Box<dyn Accumulator>>,
}

impl ReduceSpec {
    /// Pass-through spec: the group's first value survives under `output`.
    pub fn pass(input: &str, output: &str) -> ReduceSpec {
        ReduceSpec {
            input: input.to_string(),
            output: output.to_string(),
            accumulator: None,
        }
    }

    /// Folding spec: the accumulator's final state survives under `output`.
    pub fn fold(input: &str, output: &str, accumulator: Box<dyn Accumulator>) -> ReduceSpec {
        ReduceSpec {
            input: input.to_string(),
            output: output.to_string(),
            accumulator: Some(accumulator),
        }
    }
}

// ============================================================================
// Table
// ============================================================================

#[derive(Debug, Clone, Default)]
struct TableState {
    bindings: Vec<String>,
    rows: Vec<Row>,
}

impl TableState {
    fn binding_set(&self) -> HashSet<&str> {
        self.bindings.iter().map(String::as_str).collect()
    }

    /// Cross product against a snapshot of another table.
    fn cross(&mut self, r_bindings: &[String], r_rows: &[Row]) {
        let mut out = Vec::with_capacity(self.rows.len() * r_rows.len());
        for l in &self.rows {
            for r in r_rows {
                out.push(merge_rows(l, r));
            }
        }
        self.rows = out;
        for b in r_bindings {
            if !self.bindings.contains(b) {
                self.bindings.push(b.clone());
            }
        }
    }

    /// Sort-merge join against a snapshot of another table over the shared
    /// bindings. With `extend_unmatched`, left rows without a join partner
    /// survive, extended with empty cells for the right-only bindings.
    fn merge_join(&mut self, r_bindings: Vec<String>, mut r_rows: Vec<Row>, extend_unmatched: bool) {
        let shared: Vec<String> = self
            .bindings
            .iter()
            .filter(|b| r_bindings.contains(b))
            .cloned()
            .collect();
        let sort_cfg: Vec<SortKey> = shared.iter().map(|b| SortKey::asc(b)).collect();
        self.rows.sort_by(|a, b| compare_rows(a, b, &sort_cfg));
        r_rows.sort_by(|a, b| compare_rows(a, b, &sort_cfg));

        let new_bindings: Vec<String> = r_bindings
            .iter()
            .filter(|b| !self.bindings.contains(*b))
            .cloned()
            .collect();

        let mut out = Vec::new();
        let mut j = 0;
        for l in &self.rows {
            let lk = group_key(l, &shared);
            while j < r_rows.len() && group_key(&r_rows[j], &shared) < lk {
                j += 1;
            }
            let mut k = j;
            let mut matched = false;
            while k < r_rows.len() && group_key(&r_rows[k], &shared) == lk {
                out.push(merge_rows(l, &r_rows[k]));
                matched = true;
                k += 1;
            }
            if extend_unmatched && !matched {
                let mut ext = l.clone();
                for b in &new_bindings {
                    ext.insert(b.clone(), Cell::Empty);
                }
                out.push(ext);
            }
        }
        self.rows = out;
        self.bindings.extend(new_bindings);
    }
}

/// An in-memory binding table.
///
/// Binding insertion order is observable and preserved through projections
/// that keep relative order.
#[derive(Debug, Default)]
pub struct Table {
    state: RwLock<TableState>,
}

impl Table {
    /// Creates a table over the given bindings.
    ///
    /// Fails with `DuplicateBinding` on repeated names and `InvalidBinding`
    /// on empty or whitespace-bearing names.
    pub fn new(bindings: Vec<String>) -> TableResult<Table> {
        let mut seen = HashSet::new();
        for b in &bindings {
            if b.is_empty() || b.chars().any(char::is_whitespace) {
                return Err(TableError::InvalidBinding(b.clone()));
            }
            if !seen.insert(b.clone()) {
                return Err(TableError::DuplicateBinding(b.clone()));
            }
        }
        Ok(Table {
            state: RwLock::new(TableState {
                bindings,
                rows: Vec::new(),
            }),
        })
    }

    /// The visible bindings, in order.
    pub fn bindings(&self) -> Vec<String> {
        self.state.read().bindings.clone()
    }

    /// Whether `name` is a visible binding.
    pub fn has_binding(&self, name: &str) -> bool {
        self.state.read().bindings.iter().any(|b| b == name)
    }

    /// Number of rows currently held.
    pub fn num_rows(&self) -> usize {
        self.state.read().rows.len()
    }

    /// A snapshot of all rows.
    pub fn rows(&self) -> Vec<Row> {
        self.state.read().rows.clone()
    }

    /// A snapshot of row `i`, if present.
    pub fn row(&self, i: usize) -> Option<Row> {
        self.state.read().rows.get(i).cloned()
    }

    /// Appends a row. Empty-name keys are dropped; the row's shape is not
    /// validated against the bindings (the planner guarantees it).
    pub fn add_row(&self, mut row: Row) {
        row.retain(|k, _| !k.is_empty());
        self.state.write().rows.push(row);
    }

    /// Restricts the visible bindings to `bindings`, in the given order.
    ///
    /// Stored rows keep their hidden columns (pruning is delayed); any name
    /// not currently visible fails with `UnknownBinding`.
    pub fn project(&self, bindings: &[String]) -> TableResult<()> {
        let mut state = self.state.write();
        let mut seen = HashSet::new();
        for b in bindings {
            if !state.bindings.contains(b) {
                return Err(TableError::UnknownBinding(b.clone()));
            }
            if !seen.insert(b.clone()) {
                return Err(TableError::DuplicateBinding(b.clone()));
            }
        }
        state.bindings = bindings.to_vec();
        Ok(())
    }

    /// Appends another table's rows.
    ///
    /// Requires this table to be empty (no bindings, no rows) or the two
    /// binding sets to be identical; otherwise `IncompatibleBindings`.
    pub fn append_table(&self, other: &Table) -> TableResult<()> {
        let (r_bindings, r_rows) = {
            let o = other.state.read();
            (o.bindings.clone(), o.rows.clone())
        };
        let mut state = self.state.write();
        if state.bindings.is_empty() && state.rows.is_empty() {
            state.bindings = r_bindings;
            state.rows = r_rows;
            return Ok(());
        }
        let mine = state.binding_set();
        let theirs: HashSet<&str> = r_bindings.iter().map(String::as_str).collect();
        if mine != theirs {
            return Err(TableError::IncompatibleBindings(format!(
                "append requires identical binding sets, got {:?} and {r_bindings:?}",
                state.bindings
            )));
        }
        state.rows.extend(r_rows);
        Ok(())
    }

    /// Cartesian product with a binding-disjoint table.
    ///
    /// Produces `|self| * |other|` merged rows; overlapping binding sets
    /// fail with `IncompatibleBindings`.
    pub fn dot_product(&self, other: &Table) -> TableResult<()> {
        let (r_bindings, r_rows) = {
            let o = other.state.read();
            (o.bindings.clone(), o.rows.clone())
        };
        let mut state = self.state.write();
        if let Some(shared) = r_bindings.iter().find(|b| state.bindings.contains(*b)) {
            return Err(TableError::IncompatibleBindings(format!(
                "dot product requires disjoint binding sets, both sides carry {shared:?}"
            )));
        }
        state.cross(&r_bindings, &r_rows);
        Ok(())
    }

    /// Left-outer join on the shared bindings.
    ///
    /// Equal binding sets and binding-less right sides are no-ops; disjoint
    /// sets degrade to the dot product. Otherwise both sides are sorted by
    /// the shared bindings and merge-walked: every left row either extends
    /// with all joinable right rows or, lacking any, with empty cells for
    /// the right-only bindings.
    pub fn left_optional_join(&self, other: &Table) -> TableResult<()> {
        let (r_bindings, r_rows) = {
            let o = other.state.read();
            (o.bindings.clone(), o.rows.clone())
        };
        let mut state = self.state.write();
        if r_bindings.is_empty() {
            return Ok(());
        }
        let theirs: HashSet<&str> = r_bindings.iter().map(String::as_str).collect();
        if state.binding_set() == theirs {
            return Ok(());
        }
        if state.bindings.iter().all(|b| !theirs.contains(b.as_str())) {
            state.cross(&r_bindings, &r_rows);
            return Ok(());
        }
        state.merge_join(r_bindings, r_rows, true);
        Ok(())
    }

    /// Natural join: the left-optional merge-walk without the left
    /// extension. Used by the planner for non-optional clauses.
    pub(crate) fn inner_join(&self, other: &Table) -> TableResult<()> {
        let (r_bindings, r_rows) = {
            let o = other.state.read();
            (o.bindings.clone(), o.rows.clone())
        };
        let mut state = self.state.write();
        if r_bindings.is_empty() {
            return Ok(());
        }
        let theirs: HashSet<&str> = r_bindings.iter().map(String::as_str).collect();
        if state.bindings.iter().all(|b| !theirs.contains(b.as_str())) {
            state.cross(&r_bindings, &r_rows);
            return Ok(());
        }
        state.merge_join(r_bindings, r_rows, false);
        Ok(())
    }

    /// Stable multi-key sort.
    pub fn sort(&self, cfg: &[SortKey]) {
        let mut state = self.state.write();
        state.rows.sort_by(|a, b| compare_rows(a, b, cfg));
    }

    /// Sorts by `cfg`, groups contiguous rows equal on all sort keys, and
    /// collapses each group through `specs`.
    ///
    /// Every visible binding must appear exactly once as a spec input;
    /// anything else fails with `ReduceSchemaMismatch`. The table's
    /// bindings become the spec outputs, in spec order.
    pub fn reduce(&self, cfg: &[SortKey], mut specs: Vec<ReduceSpec>) -> TableResult<()> {
        let mut state = self.state.write();

        let mut inputs = HashSet::new();
        let mut outputs = HashSet::new();
        for spec in &specs {
            if !state.bindings.contains(&spec.input) {
                return Err(TableError::ReduceSchemaMismatch(format!(
                    "input {:?} is not a table binding",
                    spec.input
                )));
            }
            if !inputs.insert(spec.input.clone()) {
                return Err(TableError::ReduceSchemaMismatch(format!(
                    "input {:?} is covered more than once",
                    spec.input
                )));
            }
            if !outputs.insert(spec.output.clone()) {
                return Err(TableError::ReduceSchemaMismatch(format!(
                    "output {:?} is produced more than once",
                    spec.output
                )));
            }
        }
        if let Some(missing) = state.bindings.iter().find(|b| !inputs.contains(*b)) {
            return Err(TableError::ReduceSchemaMismatch(format!(
                "binding {missing:?} is not covered by any spec"
            )));
        }

        state.rows.sort_by(|a, b| compare_rows(a, b, cfg));
        let keys: Vec<String> = cfg.iter().map(|k| k.binding.clone()).collect();

        let mut out_rows = Vec::new();
        let mut i = 0;
        while i < state.rows.len() {
            let key = group_key(&state.rows[i], &keys);
            let mut end = i + 1;
            while end < state.rows.len() && group_key(&state.rows[end], &keys) == key {
                end += 1;
            }
            let mut new_row = Row::new();
            for spec in &mut specs {
                let cell = match &mut spec.accumulator {
                    None => state.rows[i].get(&spec.input).cloned().unwrap_or_default(),
                    Some(acc) => {
                        acc.reset();
                        let mut last = None;
                        for row in &state.rows[i..end] {
                            let input = row.get(&spec.input).cloned().unwrap_or_default();
                            last = Some(acc.accumulate(&input)?);
                        }
                        last.map(AccumulatorValue::into_cell).unwrap_or_default()
                    }
                };
                new_row.insert(spec.output.clone(), cell);
            }
            out_rows.push(new_row);
            i = end;
        }

        state.bindings = specs.iter().map(|s| s.output.clone()).collect();
        state.rows = out_rows;
        Ok(())
    }

    /// Removes all the rows where `f` returns true.
    pub fn filter<F>(&self, mut f: F)
    where
        F: FnMut(&Row) -> bool,
    {
        self.state.write().rows.retain(|r| !f(r));
    }

    /// Fallible variant of [`filter`](Table::filter): removes rows where
    /// `f` returns `Ok(true)` and aborts, table unchanged, on the first
    /// error.
    pub fn try_filter<E, F>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&Row) -> Result<bool, E>,
    {
        let mut state = self.state.write();
        let mut keep = Vec::with_capacity(state.rows.len());
        for row in &state.rows {
            keep.push(!f(row)?);
        }
        let mut it = keep.into_iter();
        state.rows.retain(|_| it.next().unwrap_or(false));
        Ok(())
    }

    /// Keeps only the first `n` rows.
    pub fn limit(&self, n: u64) {
        let mut state = self.state.write();
        state.rows.truncate(n as usize);
    }

    /// Drops all rows, keeping the bindings.
    pub fn truncate(&self) {
        self.state.write().rows.clear();
    }

    /// Deletes row `i`.
    pub fn delete_row(&self, i: usize) -> TableResult<()> {
        let mut state = self.state.write();
        if i >= state.rows.len() {
            return Err(TableError::RowOutOfBounds(i, state.rows.len()));
        }
        state.rows.remove(i);
        Ok(())
    }

    /// Renders the visible bindings and rows, `sep`-separated, one line per
    /// row with a leading header line.
    pub fn to_text(&self, sep: &str) -> String {
        let state = self.state.read();
        let mut out = state.bindings.join(sep);
        out.push('\n');
        for row in &state.rows {
            let line: Vec<String> = state
                .bindings
                .iter()
                .map(|b| row.get(b).map(ToString::to_string).unwrap_or_default())
                .collect();
            out.push_str(&line.join(sep));
            out.push('\n');
        }
        out
    }

    /// Writes the table as JSON: the visible bindings plus one string array
    /// per row, aligned with the binding order.
    pub fn to_json<W: io::Write>(&self, w: &mut W) -> TableResult<()> {
        let state = self.state.read();
        let rows: Vec<Vec<String>> = state
            .rows
            .iter()
            .map(|row| {
                state
                    .bindings
                    .iter()
                    .map(|b| row.get(b).map(ToString::to_string).unwrap_or_default())
                    .collect()
            })
            .collect();
        let value = json!({ "bindings": state.bindings, "rows": rows });
        serde_json::to_writer(w, &value)?;
        Ok(())
    }
}

impl Clone for Table {
    fn clone(&self) -> Table {
        Table {
            state: RwLock::new(self.state.read().clone()),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text("\t"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn text_row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Cell::Text(v.to_string())))
            .collect()
    }

    #[test]
    fn test_new_rejects_duplicates_and_invalid_names() {
        assert!(matches!(
            Table::new(bindings(&["?a", "?a"])),
            Err(TableError::DuplicateBinding(_))
        ));
        assert!(matches!(
            Table::new(bindings(&["?a", ""])),
            Err(TableError::InvalidBinding(_))
        ));
        assert!(matches!(
            Table::new(bindings(&["?a b"])),
            Err(TableError::InvalidBinding(_))
        ));
    }

    #[test]
    fn test_add_row_drops_empty_names() {
        let t = Table::new(bindings(&["?a"])).unwrap();
        let mut row = text_row(&[("?a", "x")]);
        row.insert(String::new(), Cell::Text("dropped".into()));
        t.add_row(row);
        assert_eq!(t.row(0).unwrap().len(), 1);
    }

    #[test]
    fn test_project_restricts_visible_bindings_only() {
        let t = Table::new(bindings(&["?a", "?b"])).unwrap();
        t.add_row(text_row(&[("?a", "1"), ("?b", "2")]));
        t.project(&bindings(&["?b"])).unwrap();
        assert_eq!(t.bindings(), bindings(&["?b"]));
        // Delayed pruning: the stored row keeps the hidden column.
        assert!(t.row(0).unwrap().contains_key("?a"));
        assert!(matches!(
            t.project(&bindings(&["?a"])),
            Err(TableError::UnknownBinding(_))
        ));
    }

    #[test]
    fn test_append_table() {
        let t = Table::new(vec![]).unwrap();
        let u = Table::new(bindings(&["?a"])).unwrap();
        u.add_row(text_row(&[("?a", "1")]));
        t.append_table(&u).unwrap();
        assert_eq!(t.bindings(), bindings(&["?a"]));
        assert_eq!(t.num_rows(), 1);
        t.append_table(&u).unwrap();
        assert_eq!(t.num_rows(), 2);

        let v = Table::new(bindings(&["?b"])).unwrap();
        assert!(matches!(
            t.append_table(&v),
            Err(TableError::IncompatibleBindings(_))
        ));
    }

    #[test]
    fn test_dot_product_counts_rows() {
        let t = Table::new(bindings(&["?a"])).unwrap();
        t.add_row(text_row(&[("?a", "1")]));
        t.add_row(text_row(&[("?a", "2")]));
        let u = Table::new(bindings(&["?b"])).unwrap();
        u.add_row(text_row(&[("?b", "x")]));
        u.add_row(text_row(&[("?b", "y")]));
        u.add_row(text_row(&[("?b", "z")]));
        t.dot_product(&u).unwrap();
        assert_eq!(t.bindings(), bindings(&["?a", "?b"]));
        assert_eq!(t.num_rows(), 6);
    }

    #[test]
    fn test_dot_product_with_empty_right_annihilates() {
        let t = Table::new(bindings(&["?a"])).unwrap();
        t.add_row(text_row(&[("?a", "1")]));
        let u = Table::new(bindings(&["?b"])).unwrap();
        t.dot_product(&u).unwrap();
        assert_eq!(t.num_rows(), 0);
    }

    #[test]
    fn test_dot_product_requires_disjoint_bindings() {
        let t = Table::new(bindings(&["?a", "?b"])).unwrap();
        let u = Table::new(bindings(&["?b"])).unwrap();
        assert!(matches!(
            t.dot_product(&u),
            Err(TableError::IncompatibleBindings(_))
        ));
    }

    #[test]
    fn test_left_optional_join_equal_bindings_is_identity() {
        let t = Table::new(bindings(&["?a"])).unwrap();
        t.add_row(text_row(&[("?a", "1")]));
        let u = Table::new(bindings(&["?a"])).unwrap();
        u.add_row(text_row(&[("?a", "2")]));
        t.left_optional_join(&u).unwrap();
        assert_eq!(t.num_rows(), 1);
        assert_eq!(t.row(0).unwrap()["?a"], Cell::Text("1".into()));
    }

    #[test]
    fn test_left_optional_join_extends_unmatched_rows() {
        let left = Table::new(bindings(&["?s", "?t"])).unwrap();
        left.add_row(text_row(&[("?s", "a"), ("?t", "1")]));
        left.add_row(text_row(&[("?s", "b"), ("?t", "2")]));
        left.add_row(text_row(&[("?s", "c"), ("?t", "3")]));
        let right = Table::new(bindings(&["?s", "?u"])).unwrap();
        right.add_row(text_row(&[("?s", "a"), ("?u", "x")]));

        left.left_optional_join(&right).unwrap();
        assert_eq!(left.bindings(), bindings(&["?s", "?t", "?u"]));
        assert_eq!(left.num_rows(), 3);
        let rows = left.rows();
        assert_eq!(rows[0]["?u"], Cell::Text("x".into()));
        assert_eq!(rows[1]["?u"], Cell::Empty);
        assert_eq!(rows[2]["?u"], Cell::Empty);
    }

    #[test]
    fn test_inner_join_drops_unmatched_rows() {
        let left = Table::new(bindings(&["?s", "?t"])).unwrap();
        left.add_row(text_row(&[("?s", "a"), ("?t", "1")]));
        left.add_row(text_row(&[("?s", "b"), ("?t", "2")]));
        let right = Table::new(bindings(&["?s", "?u"])).unwrap();
        right.add_row(text_row(&[("?s", "a"), ("?u", "x")]));
        right.add_row(text_row(&[("?s", "a"), ("?u", "y")]));

        left.inner_join(&right).unwrap();
        assert_eq!(left.num_rows(), 2);
        for row in left.rows() {
            assert_eq!(row["?s"], Cell::Text("a".into()));
        }
    }

    #[test]
    fn test_sort_multi_key_with_direction() {
        let t = Table::new(bindings(&["?a", "?b"])).unwrap();
        t.add_row(text_row(&[("?a", "x"), ("?b", "2")]));
        t.add_row(text_row(&[("?a", "x"), ("?b", "1")]));
        t.add_row(text_row(&[("?a", "w"), ("?b", "9")]));
        t.sort(&[SortKey::asc("?a"), SortKey::desc("?b")]);
        let rows = t.rows();
        assert_eq!(rows[0]["?a"], Cell::Text("w".into()));
        assert_eq!(rows[1]["?b"], Cell::Text("2".into()));
        assert_eq!(rows[2]["?b"], Cell::Text("1".into()));
    }

    #[test]
    fn test_sort_literals_numerically() {
        let t = Table::new(bindings(&["?n"])).unwrap();
        for v in [10, 2, -5] {
            let mut row = Row::new();
            row.insert("?n".to_string(), Cell::Literal(Literal::Int64(v)));
            t.add_row(row);
        }
        t.sort(&[SortKey::asc("?n")]);
        let values: Vec<String> = t.rows().iter().map(|r| r["?n"].to_string()).collect();
        assert_eq!(
            values,
            ["\"-5\"^^type:int64", "\"2\"^^type:int64", "\"10\"^^type:int64"]
        );
    }

    #[test]
    fn test_reduce_counts_groups() {
        let t = Table::new(bindings(&["?foo", "?bar"])).unwrap();
        for (foo, bar, n) in [("foo", "bar", 3), ("foo2", "bar2", 2), ("foo3", "bar3", 1)] {
            for _ in 0..n {
                t.add_row(text_row(&[("?foo", foo), ("?bar", bar)]));
            }
        }
        t.reduce(
            &[SortKey::asc("?foo")],
            vec![
                ReduceSpec::pass("?foo", "?foo_alias"),
                ReduceSpec::fold("?bar", "?bar_alias", Box::new(Count::new())),
            ],
        )
        .unwrap();
        assert_eq!(t.bindings(), bindings(&["?foo_alias", "?bar_alias"]));
        let rows = t.rows();
        assert_eq!(rows.len(), 3);
        let got: Vec<(String, Cell)> = rows
            .iter()
            .map(|r| (r["?foo_alias"].to_string(), r["?bar_alias"].clone()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("foo".to_string(), Cell::Literal(Literal::Int64(3))),
                ("foo2".to_string(), Cell::Literal(Literal::Int64(2))),
                ("foo3".to_string(), Cell::Literal(Literal::Int64(1))),
            ]
        );
    }

    #[test]
    fn test_reduce_requires_full_coverage() {
        let t = Table::new(bindings(&["?a", "?b"])).unwrap();
        let err = t
            .reduce(&[SortKey::asc("?a")], vec![ReduceSpec::pass("?a", "?a")])
            .unwrap_err();
        assert!(matches!(err, TableError::ReduceSchemaMismatch(_)));
    }

    #[test]
    fn test_filter_removes_where_true() {
        let t = Table::new(bindings(&["?a"])).unwrap();
        t.add_row(text_row(&[("?a", "keep")]));
        t.add_row(text_row(&[("?a", "drop")]));
        t.filter(|row| row["?a"] == Cell::Text("drop".into()));
        assert_eq!(t.num_rows(), 1);
        assert_eq!(t.row(0).unwrap()["?a"], Cell::Text("keep".into()));
    }

    #[test]
    fn test_limit_truncate_delete() {
        let t = Table::new(bindings(&["?a"])).unwrap();
        for i in 0..5 {
            let v = i.to_string();
            t.add_row(text_row(&[("?a", v.as_str())]));
        }
        t.limit(3);
        assert_eq!(t.num_rows(), 3);
        t.delete_row(1).unwrap();
        assert_eq!(t.num_rows(), 2);
        assert!(matches!(t.delete_row(9), Err(TableError::RowOutOfBounds(9, 2))));
        t.truncate();
        assert_eq!(t.num_rows(), 0);
        assert_eq!(t.bindings(), bindings(&["?a"]));
    }

    #[test]
    fn test_to_text_and_json() {
        let t = Table::new(bindings(&["?a", "?b"])).unwrap();
        t.add_row(text_row(&[("?a", "1"), ("?b", "2")]));
        assert_eq!(t.to_text("\t"), "?a\t?b\n1\t2\n");

        let mut buf = Vec::new();
        t.to_json(&mut buf).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["bindings"][1], "?b");
        assert_eq!(v["rows"][0][0], "1");
    }
}
