//! Storage Drivers - Multi-Graph Triple Stores
//!
//! Provides:
//! - The [`Store`] / [`Graph`] driver traits the planner consumes
//! - Streaming lookup options with temporal filtering ([`LookupOptions`])
//! - The in-memory engine with its seven quad indices ([`MemoryStore`])
//! - A memoization decorator over any driver ([`MemoizedStore`])
//!
//! ## Streaming model
//!
//! Every lookup writes its results into a caller-provided sink (a bounded
//! `crossbeam_channel` sender) and closes it on return by dropping it; the
//! engine never spawns tasks of its own. Callers that want concurrency run
//! the producer in a background thread and drain the receiver on the
//! foreground:
//!
//! ```text
//! caller thread                      producer thread
//! -------------                      ---------------
//! (tx, rx) = bounded(cap)
//! spawn ----------------------------> graph.triples(&lo, &cancel, tx)
//! for t in rx { ... }                 ... sends until done, drops tx
//! join
//! ```
//!
//! A [`Cancellation`] token is observed on every sink send; cancelled
//! producers abort early and still close the sink on the way out.

mod error;
mod lookup;
pub mod memoization;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use lookup::{FilterField, FilterOperation, FilterOptions, LookupOptions};
pub use memoization::{MemoizedGraph, MemoizedStore};
pub use memory::{default_store, MemoryGraph, MemoryStore};

pub(crate) use lookup::{apply_filter, Checker};

use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::triple::{Node, Object, Predicate, Triple};

// ============================================================================
// Cancellation
// ============================================================================

/// A clonable cooperative-cancellation token.
///
/// Producers check it on every sink send and abort promptly once it fires.
/// Cancelling does not unblock a send already parked on a full sink; drop
/// the receiver as well to release it (a disconnected sink is reported as
/// `Cancelled` too).
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation::default()
    }

    /// Signals every holder of this token to stop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Sends one item into a sink, honoring cancellation.
///
/// A fired token or a disconnected receiver both surface as `Cancelled`.
pub(crate) fn send_or_cancel<T>(
    sink: &Sender<T>,
    item: T,
    cancel: &Cancellation,
) -> StorageResult<()> {
    if cancel.is_cancelled() {
        return Err(StorageError::Cancelled);
    }
    sink.send(item).map_err(|_| StorageError::Cancelled)
}

// ============================================================================
// Driver traits
// ============================================================================

/// A store holds uniquely named graphs.
///
/// Implementations beyond the in-memory engine (persistent backends,
/// remote drivers) implement this same pair of traits.
pub trait Store: Send + Sync {
    /// Identification string of the driver.
    fn name(&self) -> String;

    /// Version string of the driver.
    fn version(&self) -> String;

    /// Creates a graph; fails with `GraphExists` when `id` is taken.
    fn new_graph(&self, id: &str) -> StorageResult<Arc<dyn Graph>>;

    /// Returns an existing graph; fails with `GraphMissing` when absent.
    fn graph(&self, id: &str) -> StorageResult<Arc<dyn Graph>>;

    /// Deletes a graph; fails with `GraphMissing` when absent.
    fn delete_graph(&self, id: &str) -> StorageResult<()>;

    /// Streams all current graph names into the sink, then closes it.
    fn graph_names(&self, cancel: &Cancellation, sink: Sender<String>) -> StorageResult<()>;
}

/// A named collection of triples with streaming, index-backed lookups.
///
/// Streaming operations write into the caller's sink and close it on every
/// exit path; mutations block lookups (and vice versa) through the graph's
/// reader/writer lock.
pub trait Graph: Send + Sync {
    /// The graph's id within its store.
    fn id(&self) -> String;

    /// Adds triples to the graph. Repeated inserts are idempotent.
    fn add_triples(&self, triples: &[Triple]) -> StorageResult<()>;

    /// Removes triples from the graph, evicting them from all indices.
    fn remove_triples(&self, triples: &[Triple]) -> StorageResult<()>;

    /// Streams the objects of all triples matching subject and predicate.
    fn objects(
        &self,
        s: &Node,
        p: &Predicate,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Object>,
    ) -> StorageResult<()>;

    /// Streams the subjects of all triples matching predicate and object.
    fn subjects(
        &self,
        p: &Predicate,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Node>,
    ) -> StorageResult<()>;

    /// Streams the predicates of all triples with the given subject.
    fn predicates_for_subject(
        &self,
        s: &Node,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Predicate>,
    ) -> StorageResult<()>;

    /// Streams the predicates of all triples with the given object.
    fn predicates_for_object(
        &self,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Predicate>,
    ) -> StorageResult<()>;

    /// Streams the predicates linking the given subject and object.
    fn predicates_for_subject_and_object(
        &self,
        s: &Node,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Predicate>,
    ) -> StorageResult<()>;

    /// Streams all triples with the given subject.
    fn triples_for_subject(
        &self,
        s: &Node,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()>;

    /// Streams all triples whose predicate id matches `p`.
    ///
    /// The index keys on the partial UUID, so an immutable `p` reaches
    /// every temporal instance of the id; a temporal `p` pins lookups to
    /// its exact anchor.
    fn triples_for_predicate(
        &self,
        p: &Predicate,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()>;

    /// Streams all triples with the given object.
    fn triples_for_object(
        &self,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()>;

    /// Streams all triples matching subject and predicate.
    fn triples_for_subject_and_predicate(
        &self,
        s: &Node,
        p: &Predicate,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()>;

    /// Streams all triples matching predicate and object.
    fn triples_for_predicate_and_object(
        &self,
        p: &Predicate,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()>;

    /// Whether the exact triple is present.
    fn exist(&self, t: &Triple) -> StorageResult<bool>;

    /// Streams every triple in the graph.
    fn triples(
        &self,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()>;
}
