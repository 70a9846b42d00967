//! Data access stage: from a resolved clause to a per-clause table.
//!
//! [`simple_fetch`] picks the narrowest index-backed call for the clause's
//! concrete positions, runs it in a producer thread, and converts the
//! resulting triple stream row by row. [`triple_to_row`] owns the
//! triple-to-cells contract, including the skippable-row rule for anchor
//! requests against immutable predicates and the collision rule that turns
//! repeated binding names into equality filters.

use crossbeam_channel::{self as channel, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::storage::{Cancellation, Graph, LookupOptions, StorageResult};
use crate::table::{Cell, Row, Table};
use crate::triple::{Object, Triple};

use super::{GraphClause, PlannerError, PlannerResult};

/// Fetches all triples matching the clause into a fresh table over the
/// clause's bindings.
///
/// The producer runs on its own thread so the stream and the row
/// conversion progress concurrently; skippable rows are dropped silently.
pub fn simple_fetch(
    graph: &Arc<dyn Graph>,
    clause: &GraphClause,
    lo: &LookupOptions,
    channel_capacity: usize,
) -> PlannerResult<Table> {
    let table = Table::new(clause.bindings())?;
    let cancel = Cancellation::new();
    let g = Arc::clone(graph);
    let lo_owned = lo.clone();
    let producer_cancel = cancel.clone();

    match (&clause.subject, &clause.predicate, &clause.object) {
        // Fully specified: a point existence probe.
        (Some(s), Some(p), Some(o)) => {
            let t = Triple::new(s.clone(), p.clone(), o.clone());
            if graph.exist(&t)? {
                append_row(&table, &t, clause)?;
            }
        }
        // Subject and predicate: stream objects, rebuild triples.
        (Some(s), Some(p), None) => {
            let (tx, rx) = channel::bounded::<Object>(channel_capacity);
            let (s2, p2) = (s.clone(), p.clone());
            let producer = std::thread::spawn(move || {
                g.objects(&s2, &p2, &lo_owned, &producer_cancel, tx)
            });
            drain_rows(rx, producer, &cancel, &table, clause, |o| {
                Triple::new(s.clone(), p.clone(), o)
            })?;
        }
        // Predicate and object: stream triples directly.
        (None, Some(p), Some(o)) => {
            let (tx, rx) = channel::bounded::<Triple>(channel_capacity);
            let (p2, o2) = (p.clone(), o.clone());
            let producer = std::thread::spawn(move || {
                g.triples_for_predicate_and_object(&p2, &o2, &lo_owned, &producer_cancel, tx)
            });
            drain_rows(rx, producer, &cancel, &table, clause, |t| t)?;
        }
        // Subject and object: stream the linking predicates, rebuild.
        (Some(s), None, Some(o)) => {
            let (tx, rx) = channel::bounded(channel_capacity);
            let (s2, o2) = (s.clone(), o.clone());
            let producer = std::thread::spawn(move || {
                g.predicates_for_subject_and_object(&s2, &o2, &lo_owned, &producer_cancel, tx)
            });
            drain_rows(rx, producer, &cancel, &table, clause, |p| {
                Triple::new(s.clone(), p, o.clone())
            })?;
        }
        (Some(s), None, None) => {
            let (tx, rx) = channel::bounded::<Triple>(channel_capacity);
            let s2 = s.clone();
            let producer = std::thread::spawn(move || {
                g.triples_for_subject(&s2, &lo_owned, &producer_cancel, tx)
            });
            drain_rows(rx, producer, &cancel, &table, clause, |t| t)?;
        }
        (None, Some(p), None) => {
            let (tx, rx) = channel::bounded::<Triple>(channel_capacity);
            let p2 = p.clone();
            let producer = std::thread::spawn(move || {
                g.triples_for_predicate(&p2, &lo_owned, &producer_cancel, tx)
            });
            drain_rows(rx, producer, &cancel, &table, clause, |t| t)?;
        }
        (None, None, Some(o)) => {
            let (tx, rx) = channel::bounded::<Triple>(channel_capacity);
            let o2 = o.clone();
            let producer = std::thread::spawn(move || {
                g.triples_for_object(&o2, &lo_owned, &producer_cancel, tx)
            });
            drain_rows(rx, producer, &cancel, &table, clause, |t| t)?;
        }
        // Nothing concrete: full scan.
        (None, None, None) => {
            let (tx, rx) = channel::bounded::<Triple>(channel_capacity);
            let producer =
                std::thread::spawn(move || g.triples(&lo_owned, &producer_cancel, tx));
            drain_rows(rx, producer, &cancel, &table, clause, |t| t)?;
        }
    }
    Ok(table)
}

/// Probes whether a concrete candidate triple satisfies the clause.
///
/// Returns `(unfeasible, table)`: unfeasible when the candidate is absent
/// from the graph, along with an empty table over the clause's bindings.
pub fn simple_exist(
    graph: &Arc<dyn Graph>,
    clause: &GraphClause,
    t: &Triple,
) -> PlannerResult<(bool, Table)> {
    let table = Table::new(clause.bindings())?;
    let exists = graph.exist(t)?;
    Ok((!exists, table))
}

/// Drains a producer stream into the table, converting each item through
/// `to_triple` and [`triple_to_row`]. Skippable rows are dropped; other
/// conversion errors cancel the producer, which is always joined so the
/// sink closes before returning.
fn drain_rows<T, F>(
    rx: Receiver<T>,
    producer: JoinHandle<StorageResult<()>>,
    cancel: &Cancellation,
    table: &Table,
    clause: &GraphClause,
    to_triple: F,
) -> PlannerResult<()>
where
    F: Fn(T) -> Triple,
{
    let mut failure: Option<PlannerError> = None;
    for item in rx.iter() {
        if failure.is_some() {
            // Keep draining so the producer unblocks and exits.
            continue;
        }
        let t = to_triple(item);
        match triple_to_row(&t, clause) {
            Ok(Some(row)) => table.add_row(row),
            Ok(None) => {}
            Err(PlannerError::SkippableRow(_)) => {}
            Err(e) => {
                failure = Some(e);
                cancel.cancel();
            }
        }
    }
    let produced = producer
        .join()
        .map_err(|_| PlannerError::Internal("fetch producer panicked".to_string()))?;
    if let Some(e) = failure {
        return Err(e);
    }
    produced?;
    Ok(())
}

/// Converts one existence-probe hit into a row.
fn append_row(table: &Table, t: &Triple, clause: &GraphClause) -> PlannerResult<()> {
    match triple_to_row(t, clause) {
        Ok(Some(row)) => {
            table.add_row(row);
            Ok(())
        }
        Ok(None) | Err(PlannerError::SkippableRow(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Inserts a cell under an optional name, treating repeated names as
/// equality filters: landing a *different* value on an occupied name
/// vetoes the whole row.
fn bind(row: &mut Row, name: Option<&String>, cell: Cell) -> bool {
    let Some(name) = name else {
        return true;
    };
    if let Some(existing) = row.get(name) {
        if *existing != cell {
            return false;
        }
    }
    row.insert(name.clone(), cell);
    true
}

/// Builds the row a triple contributes under a clause.
///
/// `Ok(None)` drops the triple without error (a binding collision acted as
/// a filter); a `SkippableRow` error drops it because a requested cell
/// cannot be supplied (anchor of an immutable predicate, type/id/anchor of
/// a literal) and the clause is not optional.
pub(crate) fn triple_to_row(t: &Triple, cls: &GraphClause) -> PlannerResult<Option<Row>> {
    let mut row = Row::new();

    // Subject position.
    let s = t.subject();
    let subject_ok = bind(&mut row, cls.subject_binding.as_ref(), Cell::Node(s.clone()))
        && bind(&mut row, cls.subject_alias.as_ref(), Cell::Node(s.clone()))
        && bind(
            &mut row,
            cls.subject_type_alias.as_ref(),
            Cell::Text(s.node_type().to_string()),
        )
        && bind(
            &mut row,
            cls.subject_id_alias.as_ref(),
            Cell::Text(s.id().to_string()),
        );
    if !subject_ok {
        return Ok(None);
    }

    // Predicate position.
    let p = t.predicate();
    let predicate_ok = bind(
        &mut row,
        cls.predicate_binding.as_ref(),
        Cell::Predicate(p.clone()),
    ) && bind(
        &mut row,
        cls.predicate_alias.as_ref(),
        Cell::Predicate(p.clone()),
    ) && bind(
        &mut row,
        cls.predicate_id_alias.as_ref(),
        Cell::Text(p.id().to_string()),
    );
    if !predicate_ok {
        return Ok(None);
    }
    if cls.wants_predicate_anchor() {
        let anchor_cell = match p.anchor() {
            Some(anchor) => Cell::Time(*anchor),
            None if cls.optional => Cell::Empty,
            None => {
                return Err(PlannerError::SkippableRow(format!(
                    "predicate {p} has no anchor"
                )))
            }
        };
        if !bind(&mut row, cls.predicate_anchor_binding.as_ref(), anchor_cell.clone())
            || !bind(&mut row, cls.predicate_anchor_alias.as_ref(), anchor_cell)
        {
            return Ok(None);
        }
    }

    // Object position, branching on the variant.
    match t.object() {
        Object::Node(n) => {
            if cls.wants_object_anchor() {
                if !cls.optional {
                    return Err(PlannerError::SkippableRow(format!(
                        "node object {n} has no anchor"
                    )));
                }
                if !bind(&mut row, cls.object_anchor_binding.as_ref(), Cell::Empty)
                    || !bind(&mut row, cls.object_anchor_alias.as_ref(), Cell::Empty)
                {
                    return Ok(None);
                }
            }
            let ok = bind(&mut row, cls.object_binding.as_ref(), Cell::Node(n.clone()))
                && bind(&mut row, cls.object_alias.as_ref(), Cell::Node(n.clone()))
                && bind(
                    &mut row,
                    cls.object_type_alias.as_ref(),
                    Cell::Text(n.node_type().to_string()),
                )
                && bind(
                    &mut row,
                    cls.object_id_alias.as_ref(),
                    Cell::Text(n.id().to_string()),
                );
            if !ok {
                return Ok(None);
            }
        }
        Object::Predicate(op) => {
            if cls.object_type_alias.is_some() {
                if !cls.optional {
                    return Err(PlannerError::SkippableRow(format!(
                        "predicate object {op} has no type"
                    )));
                }
                if !bind(&mut row, cls.object_type_alias.as_ref(), Cell::Empty) {
                    return Ok(None);
                }
            }
            let ok = bind(
                &mut row,
                cls.object_binding.as_ref(),
                Cell::Predicate(op.clone()),
            ) && bind(
                &mut row,
                cls.object_alias.as_ref(),
                Cell::Predicate(op.clone()),
            ) && bind(
                &mut row,
                cls.object_id_alias.as_ref(),
                Cell::Text(op.id().to_string()),
            );
            if !ok {
                return Ok(None);
            }
            if cls.wants_object_anchor() {
                let anchor_cell = match op.anchor() {
                    Some(anchor) => Cell::Time(*anchor),
                    None if cls.optional => Cell::Empty,
                    None => {
                        return Err(PlannerError::SkippableRow(format!(
                            "predicate object {op} has no anchor"
                        )))
                    }
                };
                if !bind(&mut row, cls.object_anchor_binding.as_ref(), anchor_cell.clone())
                    || !bind(&mut row, cls.object_anchor_alias.as_ref(), anchor_cell)
                {
                    return Ok(None);
                }
            }
        }
        Object::Literal(l) => {
            let unsupplied = cls.object_type_alias.is_some()
                || cls.object_id_alias.is_some()
                || cls.wants_object_anchor();
            if unsupplied {
                if !cls.optional {
                    return Err(PlannerError::SkippableRow(format!(
                        "literal object {l} has no type, id, or anchor"
                    )));
                }
                for name in [
                    cls.object_type_alias.as_ref(),
                    cls.object_id_alias.as_ref(),
                    cls.object_anchor_binding.as_ref(),
                    cls.object_anchor_alias.as_ref(),
                ] {
                    if !bind(&mut row, name, Cell::Empty) {
                        return Ok(None);
                    }
                }
            }
            let ok = bind(
                &mut row,
                cls.object_binding.as_ref(),
                Cell::Literal(l.clone()),
            ) && bind(&mut row, cls.object_alias.as_ref(), Cell::Literal(l.clone()));
            if !ok {
                return Ok(None);
            }
        }
    }

    Ok(Some(row))
}
