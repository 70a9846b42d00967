//! In-Memory Storage Engine
//!
//! A volatile multi-graph store. Each graph maintains seven indices, all
//! keyed by byte-encoded UUIDs and all agreeing on membership after every
//! mutation:
//!
//! ```text
//! MemoryGraph
//!   |-- by_triple              triple uuid          -> triple
//!   |-- by_subject             s uuid               -> {triple uuid -> triple}
//!   |-- by_predicate           p partial uuid       -> {triple uuid -> triple}
//!   |-- by_object              o uuid               -> {triple uuid -> triple}
//!   |-- by_subject_predicate   (s, p partial) uuids -> {triple uuid -> triple}
//!   |-- by_predicate_object    (p partial, o) uuids -> {triple uuid -> triple}
//!   `-- by_subject_object      (s, o) uuids         -> {triple uuid -> triple}
//! ```
//!
//! Predicate keys use the partial UUID, so every temporal instance of an id
//! lands in one bucket and temporal range queries stay index-backed; the
//! time bounds and filters are applied post-lookup by the checker.
//!
//! ## Concurrency
//!
//! One reader/writer lock per graph. Mutations hold the write lock for the
//! whole batch; lookups hold the read lock for the duration of iteration
//! into the sink, so a lookup draining slowly blocks writers until done.
//! Call streaming operations from a separate thread when the consumer is
//! the same task.

use crossbeam_channel::Sender;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use uuid::Uuid;

use crate::triple::{Node, Object, Predicate, Triple};

use super::{
    apply_filter, send_or_cancel, Cancellation, Checker, Graph, LookupOptions, StorageError,
    StorageResult, Store,
};

/// The process-wide default in-memory store, initialized lazily.
static DEFAULT_STORE: Lazy<MemoryStore> = Lazy::new(MemoryStore::new);

/// The process-wide default volatile store.
pub fn default_store() -> &'static MemoryStore {
    &DEFAULT_STORE
}

// ============================================================================
// Store
// ============================================================================

/// A volatile store holding named in-memory graphs.
#[derive(Default)]
pub struct MemoryStore {
    graphs: RwLock<HashMap<String, Arc<MemoryGraph>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl Store for MemoryStore {
    fn name(&self) -> String {
        "volatile".to_string()
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn new_graph(&self, id: &str) -> StorageResult<Arc<dyn Graph>> {
        let mut graphs = self.graphs.write();
        if graphs.contains_key(id) {
            return Err(StorageError::GraphExists(id.to_string()));
        }
        let graph = Arc::new(MemoryGraph {
            id: id.to_string(),
            state: RwLock::new(Indices::default()),
        });
        graphs.insert(id.to_string(), Arc::clone(&graph));
        tracing::debug!(graph = %id, "graph_created");
        Ok(graph)
    }

    fn graph(&self, id: &str) -> StorageResult<Arc<dyn Graph>> {
        self.graphs
            .read()
            .get(id)
            .map(|g| Arc::clone(g) as Arc<dyn Graph>)
            .ok_or_else(|| StorageError::GraphMissing(id.to_string()))
    }

    fn delete_graph(&self, id: &str) -> StorageResult<()> {
        let mut graphs = self.graphs.write();
        if graphs.remove(id).is_none() {
            return Err(StorageError::GraphMissing(id.to_string()));
        }
        tracing::debug!(graph = %id, "graph_deleted");
        Ok(())
    }

    fn graph_names(&self, cancel: &Cancellation, sink: Sender<String>) -> StorageResult<()> {
        let graphs = self.graphs.read();
        for name in graphs.keys() {
            send_or_cancel(&sink, name.clone(), cancel)?;
        }
        Ok(())
    }
}

// ============================================================================
// Graph
// ============================================================================

#[derive(Default)]
struct Indices {
    by_triple: HashMap<Uuid, Arc<Triple>>,
    by_subject: HashMap<Uuid, HashMap<Uuid, Arc<Triple>>>,
    by_predicate: HashMap<Uuid, HashMap<Uuid, Arc<Triple>>>,
    by_object: HashMap<Uuid, HashMap<Uuid, Arc<Triple>>>,
    by_subject_predicate: HashMap<(Uuid, Uuid), HashMap<Uuid, Arc<Triple>>>,
    by_predicate_object: HashMap<(Uuid, Uuid), HashMap<Uuid, Arc<Triple>>>,
    by_subject_object: HashMap<(Uuid, Uuid), HashMap<Uuid, Arc<Triple>>>,
}

fn bucket_insert<K: Eq + Hash>(
    index: &mut HashMap<K, HashMap<Uuid, Arc<Triple>>>,
    key: K,
    triple_uuid: Uuid,
    triple: &Arc<Triple>,
) {
    index
        .entry(key)
        .or_default()
        .insert(triple_uuid, Arc::clone(triple));
}

fn bucket_remove<K: Eq + Hash>(
    index: &mut HashMap<K, HashMap<Uuid, Arc<Triple>>>,
    key: &K,
    triple_uuid: &Uuid,
) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.remove(triple_uuid);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

/// One in-memory graph with its seven indices behind a single RwLock.
pub struct MemoryGraph {
    id: String,
    state: RwLock<Indices>,
}

/// Streams a candidate bucket through the checker pipeline: time bounds
/// first, then the filter operation, then the emission cap.
fn stream<T>(
    candidates: Vec<&Arc<Triple>>,
    lo: &LookupOptions,
    pin: Option<&Predicate>,
    cancel: &Cancellation,
    sink: &Sender<T>,
    project: impl Fn(&Triple) -> T,
) -> StorageResult<()> {
    let mut checker = Checker::new(lo, pin);
    let bounded: Vec<&Arc<Triple>> = candidates
        .into_iter()
        .filter(|t| checker.passes_time_bounds(t.predicate()))
        .collect();
    let selected = match &lo.filter {
        None => bounded,
        Some(filter) => apply_filter(filter, bounded),
    };
    for t in selected {
        if !checker.allow_and_update() {
            break;
        }
        send_or_cancel(sink, project(t), cancel)?;
    }
    Ok(())
}

impl Graph for MemoryGraph {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn add_triples(&self, triples: &[Triple]) -> StorageResult<()> {
        let mut state = self.state.write();
        for t in triples {
            let tu = t.uuid();
            let su = t.subject().uuid();
            let pu = t.predicate().partial_uuid();
            let ou = t.object().uuid();
            let arc = Arc::new(t.clone());
            state.by_triple.insert(tu, Arc::clone(&arc));
            bucket_insert(&mut state.by_subject, su, tu, &arc);
            bucket_insert(&mut state.by_predicate, pu, tu, &arc);
            bucket_insert(&mut state.by_object, ou, tu, &arc);
            bucket_insert(&mut state.by_subject_predicate, (su, pu), tu, &arc);
            bucket_insert(&mut state.by_predicate_object, (pu, ou), tu, &arc);
            bucket_insert(&mut state.by_subject_object, (su, ou), tu, &arc);
        }
        tracing::debug!(graph = %self.id, n = triples.len(), "triples_added");
        Ok(())
    }

    fn remove_triples(&self, triples: &[Triple]) -> StorageResult<()> {
        let mut state = self.state.write();
        for t in triples {
            let tu = t.uuid();
            let su = t.subject().uuid();
            let pu = t.predicate().partial_uuid();
            let ou = t.object().uuid();
            state.by_triple.remove(&tu);
            bucket_remove(&mut state.by_subject, &su, &tu);
            bucket_remove(&mut state.by_predicate, &pu, &tu);
            bucket_remove(&mut state.by_object, &ou, &tu);
            bucket_remove(&mut state.by_subject_predicate, &(su, pu), &tu);
            bucket_remove(&mut state.by_predicate_object, &(pu, ou), &tu);
            bucket_remove(&mut state.by_subject_object, &(su, ou), &tu);
        }
        tracing::debug!(graph = %self.id, n = triples.len(), "triples_removed");
        Ok(())
    }

    fn objects(
        &self,
        s: &Node,
        p: &Predicate,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Object>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state
            .by_subject_predicate
            .get(&(s.uuid(), p.partial_uuid()))
            .map(|b| b.values().collect())
            .unwrap_or_default();
        stream(candidates, &lo, Some(p), cancel, &sink, |t| {
            t.object().clone()
        })
    }

    fn subjects(
        &self,
        p: &Predicate,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Node>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state
            .by_predicate_object
            .get(&(p.partial_uuid(), o.uuid()))
            .map(|b| b.values().collect())
            .unwrap_or_default();
        stream(candidates, &lo, Some(p), cancel, &sink, |t| {
            t.subject().clone()
        })
    }

    fn predicates_for_subject(
        &self,
        s: &Node,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Predicate>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state
            .by_subject
            .get(&s.uuid())
            .map(|b| b.values().collect())
            .unwrap_or_default();
        stream(candidates, &lo, None, cancel, &sink, |t| {
            t.predicate().clone()
        })
    }

    fn predicates_for_object(
        &self,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Predicate>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state
            .by_object
            .get(&o.uuid())
            .map(|b| b.values().collect())
            .unwrap_or_default();
        stream(candidates, &lo, None, cancel, &sink, |t| {
            t.predicate().clone()
        })
    }

    fn predicates_for_subject_and_object(
        &self,
        s: &Node,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Predicate>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state
            .by_subject_object
            .get(&(s.uuid(), o.uuid()))
            .map(|b| b.values().collect())
            .unwrap_or_default();
        stream(candidates, &lo, None, cancel, &sink, |t| {
            t.predicate().clone()
        })
    }

    fn triples_for_subject(
        &self,
        s: &Node,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state
            .by_subject
            .get(&s.uuid())
            .map(|b| b.values().collect())
            .unwrap_or_default();
        stream(candidates, &lo, None, cancel, &sink, |t| t.clone())
    }

    fn triples_for_predicate(
        &self,
        p: &Predicate,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state
            .by_predicate
            .get(&p.partial_uuid())
            .map(|b| b.values().collect())
            .unwrap_or_default();
        stream(candidates, &lo, Some(p), cancel, &sink, |t| t.clone())
    }

    fn triples_for_object(
        &self,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state
            .by_object
            .get(&o.uuid())
            .map(|b| b.values().collect())
            .unwrap_or_default();
        stream(candidates, &lo, None, cancel, &sink, |t| t.clone())
    }

    fn triples_for_subject_and_predicate(
        &self,
        s: &Node,
        p: &Predicate,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state
            .by_subject_predicate
            .get(&(s.uuid(), p.partial_uuid()))
            .map(|b| b.values().collect())
            .unwrap_or_default();
        stream(candidates, &lo, Some(p), cancel, &sink, |t| t.clone())
    }

    fn triples_for_predicate_and_object(
        &self,
        p: &Predicate,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state
            .by_predicate_object
            .get(&(p.partial_uuid(), o.uuid()))
            .map(|b| b.values().collect())
            .unwrap_or_default();
        stream(candidates, &lo, Some(p), cancel, &sink, |t| t.clone())
    }

    fn exist(&self, t: &Triple) -> StorageResult<bool> {
        Ok(self.state.read().by_triple.contains_key(&t.uuid()))
    }

    fn triples(
        &self,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let lo = lo.effective()?;
        let state = self.state.read();
        let candidates = state.by_triple.values().collect();
        stream(candidates, &lo, None, cancel, &sink, |t| t.clone())
    }
}
