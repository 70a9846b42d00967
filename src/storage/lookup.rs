//! Lookup options, filters, and the per-lookup checker.
//!
//! Every streaming lookup takes a [`LookupOptions`] value that narrows the
//! result set in three stages, applied in order:
//!
//! 1. **Time bounds** (`lower_anchor`/`upper_anchor`, plus the pin
//!    predicate of by-predicate operations) narrow the candidate set.
//! 2. The **filter operation** transforms what is left (`Latest`,
//!    `IsImmutable`, `IsTemporal`).
//! 3. **`max_elements`** caps emission into the sink.
//!
//! `latest_anchor` is sugar: the engine rewrites it into a
//! `{Latest, Predicate}` filter on entry. Setting it together with an
//! explicit filter is a contradiction and fails with `ConflictingLookup`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::triple::{format_anchor, Object, Predicate, Triple, ID_NAMESPACE};

use super::{StorageError, StorageResult};

/// What a filter operation does to the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperation {
    /// Keep only max-anchor triples per partial-predicate-UUID group
    Latest,
    /// Keep only triples whose inspected predicate is immutable
    IsImmutable,
    /// Keep only triples whose inspected predicate is temporal
    IsTemporal,
}

/// Which predicate a filter operation inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterField {
    /// The triple's own predicate
    Predicate,
    /// The predicate boxed in the triple's object; triples with other
    /// object variants are dropped
    Object,
}

/// A storage-level filter: an operation applied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub operation: FilterOperation,
    pub field: FilterField,
}

/// Options narrowing a single streaming lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOptions {
    /// Maximum number of elements emitted; 0 means unbounded.
    pub max_elements: usize,
    /// Inclusive lower bound on temporal anchors.
    pub lower_anchor: Option<DateTime<Utc>>,
    /// Inclusive upper bound on temporal anchors.
    pub upper_anchor: Option<DateTime<Utc>>,
    /// Keep only the latest temporal instance per predicate id.
    /// Mutually exclusive with an explicit `filter`.
    pub latest_anchor: bool,
    /// Storage-level filter applied after the time bounds.
    pub filter: Option<FilterOptions>,
}

impl LookupOptions {
    /// Stable UUID over the canonical encoding of these options, used to
    /// compose memoization cache keys.
    pub fn uuid(&self) -> Uuid {
        let encoded = format!(
            "max={};lower={};upper={};latest={};filter={}",
            self.max_elements,
            self.lower_anchor.map(|t| format_anchor(&t)).unwrap_or_default(),
            self.upper_anchor.map(|t| format_anchor(&t)).unwrap_or_default(),
            self.latest_anchor,
            self.filter
                .map(|f| format!("{:?}:{:?}", f.operation, f.field))
                .unwrap_or_default(),
        );
        Uuid::new_v5(&ID_NAMESPACE, encoded.as_bytes())
    }

    /// Resolves `latest_anchor` into the synthesized `{Latest, Predicate}`
    /// filter, leaving the caller's value untouched. Fails with
    /// `ConflictingLookup` when an explicit filter is also set.
    pub(crate) fn effective(&self) -> StorageResult<LookupOptions> {
        if !self.latest_anchor {
            return Ok(self.clone());
        }
        if let Some(filter) = &self.filter {
            return Err(StorageError::ConflictingLookup(format!(
                "latest_anchor cannot be combined with explicit filter {filter:?}"
            )));
        }
        let mut lo = self.clone();
        lo.latest_anchor = false;
        lo.filter = Some(FilterOptions {
            operation: FilterOperation::Latest,
            field: FilterField::Predicate,
        });
        Ok(lo)
    }
}

// ============================================================================
// Checker
// ============================================================================

/// Per-lookup admission control: global time bounds plus the emission cap.
///
/// By-predicate operations pin the looked-up predicate; when the pin is
/// temporal, only exact-anchor matches pass. Immutable predicates always
/// pass the time-bound check.
pub(crate) struct Checker {
    lower: Option<DateTime<Utc>>,
    upper: Option<DateTime<Utc>>,
    pin_anchor: Option<DateTime<Utc>>,
    remaining: Option<usize>,
}

impl Checker {
    pub(crate) fn new(lo: &LookupOptions, pin: Option<&Predicate>) -> Checker {
        Checker {
            lower: lo.lower_anchor,
            upper: lo.upper_anchor,
            pin_anchor: pin.and_then(|p| p.anchor().copied()),
            remaining: (lo.max_elements > 0).then_some(lo.max_elements),
        }
    }

    /// Global time bounds, inclusive on both ends.
    pub(crate) fn passes_time_bounds(&self, p: &Predicate) -> bool {
        let Some(anchor) = p.anchor() else {
            return true;
        };
        if let Some(pin) = &self.pin_anchor {
            if anchor != pin {
                return false;
            }
        }
        if let Some(lower) = &self.lower {
            if anchor < lower {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            if anchor > upper {
                return false;
            }
        }
        true
    }

    /// Limit-and-update: admits candidates until `max_elements` runs out.
    pub(crate) fn allow_and_update(&mut self) -> bool {
        match &mut self.remaining {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

// ============================================================================
// Filter application
// ============================================================================

/// The predicate a filter field inspects, if the triple has one.
fn inspected_predicate<'a>(t: &'a Triple, field: FilterField) -> Option<&'a Predicate> {
    match field {
        FilterField::Predicate => Some(t.predicate()),
        FilterField::Object => match t.object() {
            Object::Predicate(p) => Some(p),
            _ => None,
        },
    }
}

/// Applies a filter operation to a time-bounded candidate set.
pub(crate) fn apply_filter<'a>(
    filter: &FilterOptions,
    candidates: Vec<&'a Arc<Triple>>,
) -> Vec<&'a Arc<Triple>> {
    match filter.operation {
        FilterOperation::IsImmutable => candidates
            .into_iter()
            .filter(|t| inspected_predicate(t, filter.field).is_some_and(Predicate::is_immutable))
            .collect(),
        FilterOperation::IsTemporal => candidates
            .into_iter()
            .filter(|t| inspected_predicate(t, filter.field).is_some_and(Predicate::is_temporal))
            .collect(),
        FilterOperation::Latest => {
            // Latest anchor per partial-predicate-UUID group; immutable
            // predicates carry no anchor and pass untouched.
            let mut max_anchor: std::collections::HashMap<Uuid, DateTime<Utc>> =
                std::collections::HashMap::new();
            for t in &candidates {
                if let Some(p) = inspected_predicate(t, filter.field) {
                    if let Some(anchor) = p.anchor() {
                        let entry = max_anchor.entry(p.partial_uuid()).or_insert(*anchor);
                        if *anchor > *entry {
                            *entry = *anchor;
                        }
                    }
                }
            }
            candidates
                .into_iter()
                .filter(|t| match inspected_predicate(t, filter.field) {
                    None => false,
                    Some(p) => match p.anchor() {
                        None => true,
                        Some(anchor) => max_anchor.get(&p.partial_uuid()) == Some(anchor),
                    },
                })
                .collect()
        }
    }
}
