//! # Chronograph - Temporal Graph Store & Query Engine
//!
//! Chronograph stores quads - subject/predicate/object triples whose
//! predicates optionally carry a time anchor - and answers declarative
//! graph queries by compiling resolved SELECT statements into
//! relational-style plans over in-memory binding tables.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! Resolved Statement (external parser)
//!     |
//! [Planner]                -> statement dispatch
//!     |
//! [Data access stage]      -> simple_fetch / simple_exist over the driver
//!     |
//! [Storage driver]         -> seven-index in-memory engine (+ memoization)
//!     |
//! [Binding table algebra]  -> joins, reduce, sort, filter, limit, project
//!     |
//! Result Table
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use chronograph::planner::{Planner, Statement, MutationStatement};
//! use chronograph::storage::MemoryStore;
//! use chronograph::triple::Triple;
//! use chronograph::config::EngineConfig;
//! use std::sync::Arc;
//!
//! let planner = Planner::new(Arc::new(MemoryStore::new()), EngineConfig::default());
//! planner.execute(&Statement::CreateGraphs(vec!["?family".to_string()])).unwrap();
//!
//! let t = Triple::parse("/u<john>\t\"knows\"@[]\t/u<mary>").unwrap();
//! planner.execute(&Statement::Insert(MutationStatement {
//!     graphs: vec!["?family".to_string()],
//!     triples: vec![t],
//! })).unwrap();
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `triple` | Quad data model: nodes, predicates, literals, objects, triples |
//! | `table` | Binding-table algebra and accumulators |
//! | `storage` | Driver traits, lookup options, in-memory engine, memoization |
//! | `planner` | Statement execution over the driver and the table algebra |
//! | `config` | Hierarchical configuration |

// Quad data model
pub mod triple;

// Binding tables (the planner's currency)
pub mod table;

// Storage drivers: traits, in-memory engine, memoization decorator
pub mod storage;

// Statement planner and data-access stage
pub mod planner;

// Configuration system
pub mod config;

// Re-export the working set for convenience
pub use config::{Config, EngineConfig};
pub use planner::{
    Aggregation, Expression, GraphClause, MutationStatement, Planner, PlannerError, PlannerResult,
    Projection, SelectStatement, Statement,
};
pub use storage::{
    default_store, Cancellation, FilterField, FilterOperation, FilterOptions, Graph,
    LookupOptions, MemoizedStore, MemoryStore, StorageError, StorageResult, Store,
};
pub use table::{
    Accumulator, AccumulatorValue, Cell, Row, SortConfig, SortKey, Table, TableError, TableResult,
};
pub use triple::{
    Literal, LiteralBuilder, Node, Object, Predicate, Triple, TripleError, TripleResult,
};
