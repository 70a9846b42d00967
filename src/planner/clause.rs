//! Resolved graph-pattern clauses.
//!
//! The query-language parser lives outside this crate; what reaches the
//! planner is a resolved, validated [`GraphClause`] per pattern in the
//! WHERE block. A clause carries up to three concrete matchers (fixing the
//! subject, predicate, or object), the bindings and aliases each position
//! populates, an `optional` flag, and the lookup options scoped to the
//! clause.

use crate::storage::LookupOptions;
use crate::triple::{Node, Object, Predicate};

/// One resolved graph pattern of a WHERE block.
///
/// Concrete matchers narrow the index lookup; bindings and aliases say
/// which cells each streamed triple contributes to the clause's table.
/// A concrete immutable predicate matcher reaches every temporal instance
/// of its id (the index keys on the partial UUID), which is how patterns
/// with a free anchor binding are expressed.
#[derive(Debug, Clone, Default)]
pub struct GraphClause {
    /// Concrete subject matcher.
    pub subject: Option<Node>,
    /// Concrete predicate matcher.
    pub predicate: Option<Predicate>,
    /// Concrete object matcher.
    pub object: Option<Object>,

    /// Binding receiving the subject node.
    pub subject_binding: Option<String>,
    /// Alias receiving the subject node.
    pub subject_alias: Option<String>,
    /// Alias receiving the subject's type as text.
    pub subject_type_alias: Option<String>,
    /// Alias receiving the subject's id as text.
    pub subject_id_alias: Option<String>,

    /// Binding receiving the predicate.
    pub predicate_binding: Option<String>,
    /// Alias receiving the predicate.
    pub predicate_alias: Option<String>,
    /// Alias receiving the predicate's id as text.
    pub predicate_id_alias: Option<String>,
    /// Binding receiving the predicate's time anchor.
    pub predicate_anchor_binding: Option<String>,
    /// Alias receiving the predicate's time anchor.
    pub predicate_anchor_alias: Option<String>,

    /// Binding receiving the object.
    pub object_binding: Option<String>,
    /// Alias receiving the object.
    pub object_alias: Option<String>,
    /// Alias receiving a node object's type as text.
    pub object_type_alias: Option<String>,
    /// Alias receiving a node or predicate object's id as text.
    pub object_id_alias: Option<String>,
    /// Binding receiving a predicate object's time anchor.
    pub object_anchor_binding: Option<String>,
    /// Alias receiving a predicate object's time anchor.
    pub object_anchor_alias: Option<String>,

    /// Whether the clause is OPTIONAL: unpopulated cells become empty
    /// instead of dropping the row, and the clause folds in with a
    /// left-outer join.
    pub optional: bool,

    /// Lookup options scoped to this clause.
    pub lookup: LookupOptions,
}

impl GraphClause {
    /// All binding and alias names this clause populates, unique, in
    /// subject/predicate/object position order.
    pub fn bindings(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in [
            &self.subject_binding,
            &self.subject_alias,
            &self.subject_type_alias,
            &self.subject_id_alias,
            &self.predicate_binding,
            &self.predicate_alias,
            &self.predicate_id_alias,
            &self.predicate_anchor_binding,
            &self.predicate_anchor_alias,
            &self.object_binding,
            &self.object_alias,
            &self.object_type_alias,
            &self.object_id_alias,
            &self.object_anchor_binding,
            &self.object_anchor_alias,
        ]
        .into_iter()
        .flatten()
        {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }

    /// Whether any predicate-anchor cell is requested.
    pub(crate) fn wants_predicate_anchor(&self) -> bool {
        self.predicate_anchor_binding.is_some() || self.predicate_anchor_alias.is_some()
    }

    /// Whether any object-anchor cell is requested.
    pub(crate) fn wants_object_anchor(&self) -> bool {
        self.object_anchor_binding.is_some() || self.object_anchor_alias.is_some()
    }
}
