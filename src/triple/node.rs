//! Graph nodes.
//!
//! A node is a `(type, id)` pair. The type is a path-like label (`/person`,
//! `/item/book`) and the id is free text that identifies one entity of that
//! type. The canonical string form is `type<id>`, e.g. `/u<mary>`.
//!
//! Blank nodes live under the reserved type `/_` and carry process-unique
//! ids, so two blank nodes minted in the same process never collide.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{TripleError, TripleResult, ID_NAMESPACE};

/// Reserved type for blank nodes.
pub const BLANK_NODE_TYPE: &str = "/_";

/// Path-like type grammar: one or more `/segment` parts, where a segment
/// carries no whitespace, no `/`, and no angle brackets. The pattern also
/// rules out a trailing `/` since every `/` must open a new segment.
static NODE_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(/[^\s/<>]+)+$").expect("node type pattern must compile")
});

/// A typed graph node.
///
/// Nodes are value types: immutable after construction and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    node_type: String,
    id: String,
}

impl Node {
    /// Creates a node, validating both components.
    ///
    /// The type must be path-like (`/a/b`, no trailing slash, no whitespace)
    /// and the id must be non-empty and free of `<` and `>`.
    pub fn new(node_type: &str, id: &str) -> TripleResult<Node> {
        if !NODE_TYPE_RE.is_match(node_type) {
            return Err(TripleError::InvalidNode(format!(
                "invalid type {node_type:?}; want a path-like label such as /person"
            )));
        }
        if id.is_empty() {
            return Err(TripleError::InvalidNode("empty id".to_string()));
        }
        if id.contains('<') || id.contains('>') {
            return Err(TripleError::InvalidNode(format!(
                "id {id:?} may not contain '<' or '>'"
            )));
        }
        Ok(Node {
            node_type: node_type.to_string(),
            id: id.to_string(),
        })
    }

    /// Mints a fresh blank node with a process-unique id.
    pub fn blank() -> Node {
        Node {
            node_type: BLANK_NODE_TYPE.to_string(),
            id: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Parses the canonical form `type<id>`.
    pub fn parse(s: &str) -> TripleResult<Node> {
        if s.is_empty() {
            return Err(TripleError::InvalidNode("empty input".to_string()));
        }
        let open = s.find('<').ok_or_else(|| {
            TripleError::InvalidNode(format!("missing '<' in {s:?}"))
        })?;
        if !s.ends_with('>') {
            return Err(TripleError::InvalidNode(format!("missing closing '>' in {s:?}")));
        }
        let node_type = &s[..open];
        let id = &s[open + 1..s.len() - 1];
        Node::new(node_type, id)
    }

    /// The path-like type label.
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// The id within the type.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this node lives under the reserved blank type.
    pub fn is_blank(&self) -> bool {
        self.node_type == BLANK_NODE_TYPE
    }

    /// Stable content-derived UUID over the canonical string form.
    pub fn uuid(&self) -> Uuid {
        Uuid::new_v5(&ID_NAMESPACE, self.to_string().as_bytes())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.node_type, self.id)
    }
}

impl FromStr for Node {
    type Err = TripleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Node::parse(s)
    }
}
