//! Table Algebra Tests
//!
//! Integration coverage of the binding-table operators: the join laws the
//! planner relies on, group-reduce, multi-key sorting over mixed cell
//! kinds, and schema validation errors.

use chrono::{TimeZone, Utc};

use chronograph::table::{
    Cell, Count, ReduceSpec, Row, SortKey, SumInt64, Table, TableError,
};
use chronograph::triple::{Literal, Node, Predicate};

// ============================================================================
// Test Helpers
// ============================================================================

fn bindings(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn text_row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Cell::Text(v.to_string())))
        .collect()
}

// ============================================================================
// Join Laws
// ============================================================================

#[test]
fn test_dot_product_with_empty_right_yields_empty_left() {
    let left = Table::new(bindings(&["?a"])).unwrap();
    for v in ["1", "2", "3"] {
        left.add_row(text_row(&[("?a", v)]));
    }
    let right = Table::new(bindings(&["?b"])).unwrap();
    left.dot_product(&right).unwrap();
    assert_eq!(left.num_rows(), 0);
    assert_eq!(left.bindings(), bindings(&["?a", "?b"]));
}

#[test]
fn test_left_optional_join_with_equal_bindings_is_identity() {
    let left = Table::new(bindings(&["?a", "?b"])).unwrap();
    left.add_row(text_row(&[("?a", "1"), ("?b", "2")]));
    let snapshot = left.rows();

    let right = Table::new(bindings(&["?b", "?a"])).unwrap();
    right.add_row(text_row(&[("?a", "9"), ("?b", "9")]));
    left.left_optional_join(&right).unwrap();
    assert_eq!(left.rows(), snapshot);
}

#[test]
fn test_left_optional_join_disjoint_degrades_to_dot_product() {
    let left = Table::new(bindings(&["?a"])).unwrap();
    left.add_row(text_row(&[("?a", "1")]));
    left.add_row(text_row(&[("?a", "2")]));
    let right = Table::new(bindings(&["?b"])).unwrap();
    right.add_row(text_row(&[("?b", "x")]));
    left.left_optional_join(&right).unwrap();
    assert_eq!(left.num_rows(), 2);
    for row in left.rows() {
        assert_eq!(row["?b"], Cell::Text("x".to_string()));
    }
}

#[test]
fn test_left_optional_join_spec_shape() {
    // Three left rows, two right rows matching only one of them: the
    // result keeps all three left rows, the unmatched ones with empty
    // cells for the right-only binding.
    let left = Table::new(bindings(&["?s", "?t"])).unwrap();
    left.add_row(text_row(&[("?s", "a"), ("?t", "1")]));
    left.add_row(text_row(&[("?s", "b"), ("?t", "2")]));
    left.add_row(text_row(&[("?s", "c"), ("?t", "3")]));
    let right = Table::new(bindings(&["?s", "?u"])).unwrap();
    right.add_row(text_row(&[("?s", "b"), ("?u", "x")]));
    right.add_row(text_row(&[("?s", "b"), ("?u", "y")]));

    left.left_optional_join(&right).unwrap();
    assert_eq!(left.bindings(), bindings(&["?s", "?t", "?u"]));
    assert_eq!(left.num_rows(), 4);
    let empty = left
        .rows()
        .iter()
        .filter(|r| r["?u"] == Cell::Empty)
        .count();
    assert_eq!(empty, 2);
}

// ============================================================================
// Reduce
// ============================================================================

#[test]
fn test_reduce_with_count_spec_scenario() {
    let table = Table::new(bindings(&["?foo", "?bar"])).unwrap();
    for (foo, bar, n) in [("foo", "bar", 3), ("foo2", "bar2", 2), ("foo3", "bar3", 1)] {
        for _ in 0..n {
            table.add_row(text_row(&[("?foo", foo), ("?bar", bar)]));
        }
    }
    table
        .reduce(
            &[SortKey::asc("?foo")],
            vec![
                ReduceSpec::pass("?foo", "?foo_alias"),
                ReduceSpec::fold("?bar", "?bar_alias", Box::new(Count::new())),
            ],
        )
        .unwrap();

    let rows = table.rows();
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
fn test_reduce_sum_resets_between_groups() {
    let table = Table::new(bindings(&["?g", "?n"])).unwrap();
    for (g, n) in [("a", 1), ("a", 2), ("b", 10)] {
        let mut row = Row::new();
        row.insert("?g".to_string(), Cell::Text(g.to_string()));
        row.insert("?n".to_string(), Cell::Literal(Literal::Int64(n)));
        table.add_row(row);
    }
    table
        .reduce(
            &[SortKey::asc("?g")],
            vec![
                ReduceSpec::pass("?g", "?g"),
                ReduceSpec::fold("?n", "?total", Box::new(SumInt64::new(0))),
            ],
        )
        .unwrap();
    let rows = table.rows();
    assert_eq!(rows[0]["?total"], Cell::Literal(Literal::Int64(3)));
    assert_eq!(rows[1]["?total"], Cell::Literal(Literal::Int64(10)));
}

#[test]
fn test_reduce_rejects_uncovered_and_doubled_bindings() {
    let table = Table::new(bindings(&["?a", "?b"])).unwrap();
    assert!(matches!(
        table.reduce(&[SortKey::asc("?a")], vec![ReduceSpec::pass("?a", "?x")]),
        Err(TableError::ReduceSchemaMismatch(_))
    ));
    assert!(matches!(
        table.reduce(
            &[SortKey::asc("?a")],
            vec![
                ReduceSpec::pass("?a", "?x"),
                ReduceSpec::pass("?a", "?y"),
                ReduceSpec::pass("?b", "?z"),
            ],
        ),
        Err(TableError::ReduceSchemaMismatch(_))
    ));
}

// ============================================================================
// Sorting Mixed Cell Kinds
// ============================================================================

#[test]
fn test_sort_times_chronologically() {
    let table = Table::new(bindings(&["?t"])).unwrap();
    let anchors = [
        Utc.with_ymd_and_hms(2016, 4, 10, 4, 25, 0).unwrap(),
        Utc.with_ymd_and_hms(2016, 4, 10, 4, 21, 0).unwrap(),
        Utc.with_ymd_and_hms(2015, 12, 31, 23, 59, 0).unwrap(),
    ];
    for anchor in anchors {
        let mut row = Row::new();
        row.insert("?t".to_string(), Cell::Time(anchor));
        table.add_row(row);
    }
    table.sort(&[SortKey::asc("?t")]);
    let sorted: Vec<Cell> = table.rows().iter().map(|r| r["?t"].clone()).collect();
    assert_eq!(
        sorted,
        vec![
            Cell::Time(anchors[2]),
            Cell::Time(anchors[1]),
            Cell::Time(anchors[0]),
        ]
    );
}

#[test]
fn test_sort_is_stable_across_equal_keys() {
    let table = Table::new(bindings(&["?k", "?v"])).unwrap();
    for v in ["first", "second", "third"] {
        table.add_row(text_row(&[("?k", "same"), ("?v", v)]));
    }
    table.sort(&[SortKey::asc("?k")]);
    let order: Vec<String> = table.rows().iter().map(|r| r["?v"].to_string()).collect();
    assert_eq!(order, vec!["first", "second", "third"]);
}

#[test]
fn test_sort_entity_cells_on_canonical_strings() {
    let table = Table::new(bindings(&["?x"])).unwrap();
    let cells = [
        Cell::Node(Node::new("/u", "zed").unwrap()),
        Cell::Predicate(Predicate::immutable("knows")),
        Cell::Node(Node::new("/u", "amy").unwrap()),
    ];
    for cell in &cells {
        let mut row = Row::new();
        row.insert("?x".to_string(), cell.clone());
        table.add_row(row);
    }
    table.sort(&[SortKey::asc("?x")]);
    let first = table.row(0).unwrap()["?x"].clone();
    // '"knows"@[]' sorts before '/u<...>'.
    assert_eq!(first, cells[1].clone());
}

// ============================================================================
// Text and JSON Output
// ============================================================================

#[test]
fn test_to_text_uses_separator_and_header() {
    let table = Table::new(bindings(&["?a", "?b"])).unwrap();
    table.add_row(text_row(&[("?a", "x"), ("?b", "y")]));
    assert_eq!(table.to_text(" | "), "?a | ?b\nx | y\n");
}

#[test]
fn test_to_json_respects_projection() {
    let table = Table::new(bindings(&["?a", "?b"])).unwrap();
    table.add_row(text_row(&[("?a", "x"), ("?b", "y")]));
    table.project(&bindings(&["?b"])).unwrap();
    let mut buf = Vec::new();
    table.to_json(&mut buf).unwrap();
    let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
    assert_eq!(v["bindings"], serde_json::json!(["?b"]));
    assert_eq!(v["rows"], serde_json::json!([["y"]]));
}
