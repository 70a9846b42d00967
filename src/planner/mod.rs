//! Query Planner - Statements Over Binding Tables
//!
//! Translates resolved statements into driver calls and table-algebra
//! pipelines:
//!
//! ```text
//! resolved clauses
//!     |
//! [Data access (simple_fetch)]   -> per-clause tables (one per graph, unioned)
//!     |
//! [Clause fold]                  -> natural join, or left-outer when OPTIONAL
//!     |
//! [WHERE residual filters]
//!     |
//! [GROUP BY -> reduce] -> [HAVING -> filter] -> [ORDER BY -> sort] -> [LIMIT]
//!     |
//! [Projection]
//!     |
//! final table
//! ```
//!
//! The query-language grammar and parser are external; this module consumes
//! their resolved output ([`Statement`]) and owns execution semantics only.

pub mod clause;
mod expression;
mod fetch;

pub use clause::GraphClause;
pub use expression::{ComparisonOp, Expression};
pub use fetch::{simple_exist, simple_fetch};

use crossbeam_channel as channel;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::storage::{
    Cancellation, Graph, MemoizedStore, StorageError, StorageResult, Store,
};
use crate::table::{
    Accumulator, Cell, Count, CountDistinct, Row, SortConfig, SortKey, SumFloat64, SumInt64,
    ReduceSpec, Table, TableError,
};
use crate::triple::{Triple, TripleError};

/// Planner errors.
#[derive(Error, Debug)]
pub enum PlannerError {
    /// A row asked for data its triple cannot supply; the data-access
    /// stage drops the triple and continues
    #[error("row skipped: {0}")]
    SkippableRow(String),

    /// An expression referenced a binding the row does not carry
    #[error("unknown binding in expression: {0}")]
    MissingBinding(String),

    /// An expression operand was an empty cell
    #[error("empty binding in expression: {0}")]
    EmptyBinding(String),

    /// Storage driver error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Table algebra error
    #[error(transparent)]
    Table(#[from] TableError),

    /// Data model error
    #[error(transparent)]
    Triple(#[from] TripleError),

    /// A producer thread died without reporting a result
    #[error("internal planner failure: {0}")]
    Internal(String),
}

/// Result type for planner operations.
pub type PlannerResult<T> = Result<T, PlannerError>;

// ============================================================================
// Statements
// ============================================================================

/// Aggregation applied to a projected binding under GROUP BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Count,
    CountDistinct,
    SumInt64,
    SumFloat64,
}

impl Aggregation {
    fn accumulator(self) -> Box<dyn Accumulator> {
        match self {
            Aggregation::Count => Box::new(Count::new()),
            Aggregation::CountDistinct => Box::new(CountDistinct::new()),
            Aggregation::SumInt64 => Box::new(SumInt64::new(0)),
            Aggregation::SumFloat64 => Box::new(SumFloat64::new(0.0)),
        }
    }
}

/// One projected output of a SELECT.
#[derive(Debug, Clone)]
pub struct Projection {
    /// The input binding.
    pub binding: String,
    /// Output name; defaults to the input binding.
    pub alias: Option<String>,
    /// Aggregation to fold the binding with, if any.
    pub aggregation: Option<Aggregation>,
}

impl Projection {
    pub fn binding(name: &str) -> Projection {
        Projection {
            binding: name.to_string(),
            alias: None,
            aggregation: None,
        }
    }

    pub fn aliased(binding: &str, alias: &str) -> Projection {
        Projection {
            binding: binding.to_string(),
            alias: Some(alias.to_string()),
            aggregation: None,
        }
    }

    pub fn aggregated(binding: &str, alias: &str, aggregation: Aggregation) -> Projection {
        Projection {
            binding: binding.to_string(),
            alias: Some(alias.to_string()),
            aggregation: Some(aggregation),
        }
    }

    fn output(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.binding.clone())
    }
}

/// A resolved SELECT statement.
#[derive(Debug, Clone, Default)]
pub struct SelectStatement {
    /// Graphs named in the FROM clause.
    pub graphs: Vec<String>,
    /// Graph patterns of the WHERE block, in source order.
    pub clauses: Vec<GraphClause>,
    /// Residual WHERE predicates applied after the clause fold.
    pub filters: Vec<Expression>,
    /// GROUP BY bindings.
    pub group_by: Vec<String>,
    /// HAVING predicate over the reduced table.
    pub having: Option<Expression>,
    /// ORDER BY keys.
    pub order_by: SortConfig,
    /// LIMIT row cap.
    pub limit: Option<u64>,
    /// Projected outputs, in SELECT order.
    pub projection: Vec<Projection>,
}

/// Data mutation over one or more graphs.
#[derive(Debug, Clone)]
pub struct MutationStatement {
    pub graphs: Vec<String>,
    pub triples: Vec<Triple>,
}

/// A resolved statement, as produced by the external parser.
#[derive(Debug)]
pub enum Statement {
    Select(SelectStatement),
    Insert(MutationStatement),
    Delete(MutationStatement),
    CreateGraphs(Vec<String>),
    DropGraphs(Vec<String>),
    ShowGraphs,
}

// ============================================================================
// Planner
// ============================================================================

/// Executes resolved statements against a store.
pub struct Planner {
    store: Arc<dyn Store>,
    config: EngineConfig,
}

impl Planner {
    /// Creates a planner over `store`. With `config.memoize` set, lookups
    /// run through the memoization decorator.
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Planner {
        let store: Arc<dyn Store> = if config.memoize {
            Arc::new(MemoizedStore::new(store))
        } else {
            store
        };
        Planner { store, config }
    }

    /// Executes one statement, returning its result table (empty for
    /// mutations and graph management).
    pub fn execute(&self, statement: &Statement) -> PlannerResult<Table> {
        match statement {
            Statement::Select(q) => self.execute_select(q),
            Statement::Insert(m) => self.execute_mutation(m, true),
            Statement::Delete(m) => self.execute_mutation(m, false),
            Statement::CreateGraphs(ids) => {
                for id in ids {
                    self.store.new_graph(id)?;
                }
                Ok(Table::new(vec![])?)
            }
            Statement::DropGraphs(ids) => {
                for id in ids {
                    self.store.delete_graph(id)?;
                }
                Ok(Table::new(vec![])?)
            }
            Statement::ShowGraphs => self.execute_show_graphs(),
        }
    }

    fn execute_mutation(&self, m: &MutationStatement, insert: bool) -> PlannerResult<Table> {
        for id in &m.graphs {
            let graph = self.store.graph(id)?;
            if insert {
                graph.add_triples(&m.triples)?;
            } else {
                graph.remove_triples(&m.triples)?;
            }
        }
        tracing::debug!(
            graphs = ?m.graphs,
            n = m.triples.len(),
            insert,
            "mutation_executed"
        );
        Ok(Table::new(vec![])?)
    }

    fn execute_show_graphs(&self) -> PlannerResult<Table> {
        let table = Table::new(vec!["?graph".to_string()])?;
        let (tx, rx) = channel::bounded(self.config.channel_capacity);
        let cancel = Cancellation::new();
        let store = Arc::clone(&self.store);
        let producer_cancel = cancel.clone();
        let producer: thread::JoinHandle<StorageResult<()>> =
            thread::spawn(move || store.graph_names(&producer_cancel, tx));
        for name in rx {
            let mut row = Row::new();
            row.insert("?graph".to_string(), Cell::Text(name));
            table.add_row(row);
        }
        producer
            .join()
            .map_err(|_| PlannerError::Internal("graph name producer panicked".to_string()))??;
        Ok(table)
    }

    fn execute_select(&self, q: &SelectStatement) -> PlannerResult<Table> {
        let graphs = q
            .graphs
            .iter()
            .map(|id| self.store.graph(id))
            .collect::<StorageResult<Vec<_>>>()?;

        // Per-clause data access, folded left to right.
        let mut running: Option<Table> = None;
        for clause in &q.clauses {
            let clause_table = Table::new(clause.bindings())?;
            for graph in &graphs {
                let fetched =
                    simple_fetch(graph, clause, &clause.lookup, self.config.channel_capacity)?;
                clause_table.append_table(&fetched)?;
            }
            running = match running {
                None => Some(clause_table),
                Some(table) => {
                    if clause.optional {
                        table.left_optional_join(&clause_table)?;
                    } else {
                        table.inner_join(&clause_table)?;
                    }
                    Some(table)
                }
            };
        }
        let mut table = match running {
            Some(table) => table,
            None => Table::new(vec![])?,
        };

        // Residual WHERE predicates: keep the rows the expression accepts.
        for expr in &q.filters {
            table.try_filter(|row| Ok::<bool, PlannerError>(!expr.evaluate(row)?))?;
        }

        // Grouping collapses the table through reduce; the projection
        // inputs become the visible schema first so the specs cover it
        // exactly.
        let needs_reduce =
            !q.group_by.is_empty() || q.projection.iter().any(|p| p.aggregation.is_some());
        if needs_reduce {
            let inputs: Vec<String> = q.projection.iter().map(|p| p.binding.clone()).collect();
            table.project(&inputs)?;
            let sort_cfg: SortConfig = q.group_by.iter().map(|b| SortKey::asc(b)).collect();
            let specs: Vec<ReduceSpec> = q
                .projection
                .iter()
                .map(|p| match p.aggregation {
                    None => ReduceSpec::pass(&p.binding, &p.output()),
                    Some(agg) => ReduceSpec::fold(&p.binding, &p.output(), agg.accumulator()),
                })
                .collect();
            table.reduce(&sort_cfg, specs)?;
        }

        if let Some(having) = &q.having {
            table.try_filter(|row| Ok::<bool, PlannerError>(!having.evaluate(row)?))?;
        }

        if !q.order_by.is_empty() {
            table.sort(&q.order_by);
        }

        if let Some(n) = q.limit {
            table.limit(n);
        }

        // Plain projection (the reduce path already renamed its outputs).
        if !needs_reduce && !q.projection.is_empty() {
            if q.projection.iter().any(|p| p.alias.is_some()) {
                let outputs: Vec<String> = q.projection.iter().map(Projection::output).collect();
                let renamed = Table::new(outputs)?;
                for row in table.rows() {
                    let mut new_row = Row::new();
                    for p in &q.projection {
                        new_row.insert(
                            p.output(),
                            row.get(&p.binding).cloned().unwrap_or_default(),
                        );
                    }
                    renamed.add_row(new_row);
                }
                table = renamed;
            } else {
                let inputs: Vec<String> =
                    q.projection.iter().map(|p| p.binding.clone()).collect();
                table.project(&inputs)?;
            }
        }

        tracing::debug!(
            graphs = ?q.graphs,
            clauses = q.clauses.len(),
            rows = table.num_rows(),
            "select_executed"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::triple::{Node, Object, Predicate};

    fn planner() -> Planner {
        Planner::new(Arc::new(MemoryStore::new()), EngineConfig::default())
    }

    fn knows(s: &str, o: &str) -> Triple {
        Triple::new(
            Node::new("/u", s).unwrap(),
            Predicate::immutable("knows"),
            Object::Node(Node::new("/u", o).unwrap()),
        )
    }

    #[test]
    fn test_graph_management_statements() {
        let p = planner();
        p.execute(&Statement::CreateGraphs(vec!["?a".to_string(), "?b".to_string()]))
            .unwrap();
        let shown = p.execute(&Statement::ShowGraphs).unwrap();
        assert_eq!(shown.bindings(), vec!["?graph"]);
        assert_eq!(shown.num_rows(), 2);
        p.execute(&Statement::DropGraphs(vec!["?a".to_string()]))
            .unwrap();
        assert_eq!(p.execute(&Statement::ShowGraphs).unwrap().num_rows(), 1);
        assert!(p
            .execute(&Statement::DropGraphs(vec!["?a".to_string()]))
            .is_err());
    }

    #[test]
    fn test_insert_then_select_all() {
        let p = planner();
        p.execute(&Statement::CreateGraphs(vec!["?g".to_string()]))
            .unwrap();
        p.execute(&Statement::Insert(MutationStatement {
            graphs: vec!["?g".to_string()],
            triples: vec![knows("john", "mary"), knows("mary", "alice")],
        }))
        .unwrap();

        let q = SelectStatement {
            graphs: vec!["?g".to_string()],
            clauses: vec![GraphClause {
                subject_binding: Some("?s".to_string()),
                predicate_binding: Some("?p".to_string()),
                object_binding: Some("?o".to_string()),
                ..GraphClause::default()
            }],
            projection: vec![
                Projection::binding("?s"),
                Projection::binding("?p"),
                Projection::binding("?o"),
            ],
            ..SelectStatement::default()
        };
        let result = p.execute(&Statement::Select(q)).unwrap();
        assert_eq!(result.bindings(), vec!["?s", "?p", "?o"]);
        assert_eq!(result.num_rows(), 2);
    }

    #[test]
    fn test_delete_removes_rows() {
        let p = planner();
        p.execute(&Statement::CreateGraphs(vec!["?g".to_string()]))
            .unwrap();
        let t = knows("john", "mary");
        p.execute(&Statement::Insert(MutationStatement {
            graphs: vec!["?g".to_string()],
            triples: vec![t.clone()],
        }))
        .unwrap();
        p.execute(&Statement::Delete(MutationStatement {
            graphs: vec!["?g".to_string()],
            triples: vec![t],
        }))
        .unwrap();

        let q = SelectStatement {
            graphs: vec!["?g".to_string()],
            clauses: vec![GraphClause {
                subject_binding: Some("?s".to_string()),
                ..GraphClause::default()
            }],
            projection: vec![Projection::binding("?s")],
            ..SelectStatement::default()
        };
        assert_eq!(p.execute(&Statement::Select(q)).unwrap().num_rows(), 0);
    }
}
