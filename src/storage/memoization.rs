//! Memoization Decorator
//!
//! Wraps any [`Store`]/[`Graph`] pair with per-graph result caches. Each
//! graph keeps four recorded-stream maps (nodes, predicates, objects,
//! triples) plus a boolean cache for `exist`, keyed on
//! `op_name:lookup_options_uuid:arg_uuid...`.
//!
//! - **Hit**: the recorded stream replays into the caller's sink in
//!   recorded order.
//! - **Miss**: the inner operation runs in a producer thread; every item
//!   tees into both the caller's sink and a buffer, which installs into
//!   the cache only on clean completion.
//! - **Mutation**: `add_triples`/`remove_triples` pass through and
//!   invalidate every cache of that graph.
//!
//! `exist` composes its key from the default lookup options regardless of
//! the caller's intent.

use crossbeam_channel::{self as channel, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

use crate::triple::{Node, Object, Predicate, Triple};

use super::{
    send_or_cancel, Cancellation, Graph, LookupOptions, StorageError, StorageResult, Store,
};

/// Buffer size of the internal tee channel between the inner producer and
/// the recording drain.
const TEE_CHANNEL_CAPACITY: usize = 256;

fn cache_key(op: &str, lo: &LookupOptions, args: &[Uuid]) -> String {
    let mut key = format!("{op}:{}", lo.uuid());
    for arg in args {
        key.push(':');
        key.push_str(&arg.to_string());
    }
    key
}

// ============================================================================
// Store decorator
// ============================================================================

/// A store decorator handing out memoized graphs.
pub struct MemoizedStore {
    inner: Arc<dyn Store>,
    graphs: RwLock<HashMap<String, Arc<MemoizedGraph>>>,
}

impl MemoizedStore {
    pub fn new(inner: Arc<dyn Store>) -> MemoizedStore {
        MemoizedStore {
            inner,
            graphs: RwLock::new(HashMap::new()),
        }
    }

    fn wrap(&self, id: &str, inner: Arc<dyn Graph>) -> Arc<MemoizedGraph> {
        let wrapped = Arc::new(MemoizedGraph {
            inner,
            cache: RwLock::new(GraphCache::default()),
        });
        self.graphs
            .write()
            .insert(id.to_string(), Arc::clone(&wrapped));
        wrapped
    }
}

impl Store for MemoizedStore {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn version(&self) -> String {
        self.inner.version()
    }

    fn new_graph(&self, id: &str) -> StorageResult<Arc<dyn Graph>> {
        let inner = self.inner.new_graph(id)?;
        Ok(self.wrap(id, inner))
    }

    fn graph(&self, id: &str) -> StorageResult<Arc<dyn Graph>> {
        if let Some(wrapped) = self.graphs.read().get(id) {
            return Ok(Arc::clone(wrapped) as Arc<dyn Graph>);
        }
        let inner = self.inner.graph(id)?;
        Ok(self.wrap(id, inner))
    }

    fn delete_graph(&self, id: &str) -> StorageResult<()> {
        self.inner.delete_graph(id)?;
        self.graphs.write().remove(id);
        Ok(())
    }

    fn graph_names(&self, cancel: &Cancellation, sink: Sender<String>) -> StorageResult<()> {
        self.inner.graph_names(cancel, sink)
    }
}

// ============================================================================
// Graph decorator
// ============================================================================

#[derive(Default)]
struct GraphCache {
    nodes: HashMap<String, Vec<Node>>,
    predicates: HashMap<String, Vec<Predicate>>,
    objects: HashMap<String, Vec<Object>>,
    triples: HashMap<String, Vec<Triple>>,
    exist: HashMap<String, bool>,
}

/// A graph decorator that records and replays lookup streams.
pub struct MemoizedGraph {
    inner: Arc<dyn Graph>,
    cache: RwLock<GraphCache>,
}

impl MemoizedGraph {
    /// Replays a recorded stream, or runs the inner operation while teeing
    /// its output into the cache.
    fn replay_or_run<T>(
        &self,
        key: String,
        select: impl Fn(&GraphCache) -> &HashMap<String, Vec<T>>,
        select_mut: impl Fn(&mut GraphCache) -> &mut HashMap<String, Vec<T>>,
        cancel: &Cancellation,
        sink: Sender<T>,
        run: impl FnOnce(Sender<T>) -> StorageResult<()> + Send + 'static,
    ) -> StorageResult<()>
    where
        T: Clone + Send + 'static,
    {
        if let Some(recorded) = select(&self.cache.read()).get(&key) {
            tracing::debug!(graph = %self.inner.id(), key = %key, "memoization_hit");
            for item in recorded {
                send_or_cancel(&sink, item.clone(), cancel)?;
            }
            return Ok(());
        }

        tracing::debug!(graph = %self.inner.id(), key = %key, "memoization_miss");
        let (tx, rx) = channel::bounded::<T>(TEE_CHANNEL_CAPACITY);
        let producer = thread::spawn(move || run(tx));

        let mut recorded = Vec::new();
        let mut downstream: StorageResult<()> = Ok(());
        for item in rx {
            recorded.push(item.clone());
            if downstream.is_ok() {
                // A failed caller sink cancels the record; keep draining so
                // the producer can exit and report its own result.
                downstream = send_or_cancel(&sink, item, cancel);
            }
        }
        let produced = producer
            .join()
            .map_err(|_| StorageError::Internal("memoization producer panicked".to_string()))?;
        produced?;
        downstream?;

        select_mut(&mut self.cache.write()).insert(key, recorded);
        Ok(())
    }

    fn invalidate(&self) {
        let mut cache = self.cache.write();
        *cache = GraphCache::default();
        tracing::debug!(graph = %self.inner.id(), "memoization_invalidated");
    }
}

impl Graph for MemoizedGraph {
    fn id(&self) -> String {
        self.inner.id()
    }

    fn add_triples(&self, triples: &[Triple]) -> StorageResult<()> {
        self.inner.add_triples(triples)?;
        self.invalidate();
        Ok(())
    }

    fn remove_triples(&self, triples: &[Triple]) -> StorageResult<()> {
        self.inner.remove_triples(triples)?;
        self.invalidate();
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
        let key = cache_key("objects", lo, &[s.uuid(), p.uuid()]);
        let inner = Arc::clone(&self.inner);
        let (s, p, lo, inner_cancel) = (s.clone(), p.clone(), lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.objects,
            |c| &mut c.objects,
            cancel,
            sink,
            move |tx| inner.objects(&s, &p, &lo, &inner_cancel, tx),
        )
    }

    fn subjects(
        &self,
        p: &Predicate,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Node>,
    ) -> StorageResult<()> {
        let key = cache_key("subjects", lo, &[p.uuid(), o.uuid()]);
        let inner = Arc::clone(&self.inner);
        let (p, o, lo, inner_cancel) = (p.clone(), o.clone(), lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.nodes,
            |c| &mut c.nodes,
            cancel,
            sink,
            move |tx| inner.subjects(&p, &o, &lo, &inner_cancel, tx),
        )
    }

    fn predicates_for_subject(
        &self,
        s: &Node,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Predicate>,
    ) -> StorageResult<()> {
        let key = cache_key("predicates_for_subject", lo, &[s.uuid()]);
        let inner = Arc::clone(&self.inner);
        let (s, lo, inner_cancel) = (s.clone(), lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.predicates,
            |c| &mut c.predicates,
            cancel,
            sink,
            move |tx| inner.predicates_for_subject(&s, &lo, &inner_cancel, tx),
        )
    }

    fn predicates_for_object(
        &self,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Predicate>,
    ) -> StorageResult<()> {
        let key = cache_key("predicates_for_object", lo, &[o.uuid()]);
        let inner = Arc::clone(&self.inner);
        let (o, lo, inner_cancel) = (o.clone(), lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.predicates,
            |c| &mut c.predicates,
            cancel,
            sink,
            move |tx| inner.predicates_for_object(&o, &lo, &inner_cancel, tx),
        )
    }

    fn predicates_for_subject_and_object(
        &self,
        s: &Node,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Predicate>,
    ) -> StorageResult<()> {
        let key = cache_key("predicates_for_subject_and_object", lo, &[s.uuid(), o.uuid()]);
        let inner = Arc::clone(&self.inner);
        let (s, o, lo, inner_cancel) = (s.clone(), o.clone(), lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.predicates,
            |c| &mut c.predicates,
            cancel,
            sink,
            move |tx| inner.predicates_for_subject_and_object(&s, &o, &lo, &inner_cancel, tx),
        )
    }

    fn triples_for_subject(
        &self,
        s: &Node,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let key = cache_key("triples_for_subject", lo, &[s.uuid()]);
        let inner = Arc::clone(&self.inner);
        let (s, lo, inner_cancel) = (s.clone(), lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.triples,
            |c| &mut c.triples,
            cancel,
            sink,
            move |tx| inner.triples_for_subject(&s, &lo, &inner_cancel, tx),
        )
    }

    fn triples_for_predicate(
        &self,
        p: &Predicate,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let key = cache_key("triples_for_predicate", lo, &[p.uuid()]);
        let inner = Arc::clone(&self.inner);
        let (p, lo, inner_cancel) = (p.clone(), lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.triples,
            |c| &mut c.triples,
            cancel,
            sink,
            move |tx| inner.triples_for_predicate(&p, &lo, &inner_cancel, tx),
        )
    }

    fn triples_for_object(
        &self,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let key = cache_key("triples_for_object", lo, &[o.uuid()]);
        let inner = Arc::clone(&self.inner);
        let (o, lo, inner_cancel) = (o.clone(), lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.triples,
            |c| &mut c.triples,
            cancel,
            sink,
            move |tx| inner.triples_for_object(&o, &lo, &inner_cancel, tx),
        )
    }

    fn triples_for_subject_and_predicate(
        &self,
        s: &Node,
        p: &Predicate,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let key = cache_key("triples_for_subject_and_predicate", lo, &[s.uuid(), p.uuid()]);
        let inner = Arc::clone(&self.inner);
        let (s, p, lo, inner_cancel) = (s.clone(), p.clone(), lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.triples,
            |c| &mut c.triples,
            cancel,
            sink,
            move |tx| inner.triples_for_subject_and_predicate(&s, &p, &lo, &inner_cancel, tx),
        )
    }

    fn triples_for_predicate_and_object(
        &self,
        p: &Predicate,
        o: &Object,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let key = cache_key("triples_for_predicate_and_object", lo, &[p.uuid(), o.uuid()]);
        let inner = Arc::clone(&self.inner);
        let (p, o, lo, inner_cancel) = (p.clone(), o.clone(), lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.triples,
            |c| &mut c.triples,
            cancel,
            sink,
            move |tx| inner.triples_for_predicate_and_object(&p, &o, &lo, &inner_cancel, tx),
        )
    }

    fn exist(&self, t: &Triple) -> StorageResult<bool> {
        // Keyed on the default lookup options, whatever the caller's
        // surrounding query asked for.
        let key = cache_key("exist", &LookupOptions::default(), &[t.uuid()]);
        if let Some(cached) = self.cache.read().exist.get(&key) {
            return Ok(*cached);
        }
        let value = self.inner.exist(t)?;
        self.cache.write().exist.insert(key, value);
        Ok(value)
    }

    fn triples(
        &self,
        lo: &LookupOptions,
        cancel: &Cancellation,
        sink: Sender<Triple>,
    ) -> StorageResult<()> {
        let key = cache_key("triples", lo, &[]);
        let inner = Arc::clone(&self.inner);
        let (lo, inner_cancel) = (lo.clone(), cancel.clone());
        self.replay_or_run(
            key,
            |c| &c.triples,
            |c| &mut c.triples,
            cancel,
            sink,
            move |tx| inner.triples(&lo, &inner_cancel, tx),
        )
    }
}
