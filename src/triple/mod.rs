//! Quad data model: nodes, predicates, literals, objects and triples.
//!
//! A triple binds a subject [`Node`], a [`Predicate`] (optionally anchored
//! in time) and an [`Object`], where the object is a tagged sum over nodes,
//! predicates and literals. Every entity exposes a stable content-derived
//! UUID over its canonical string form; predicates additionally expose a
//! partial UUID over the id alone.
//!
//! Canonical forms:
//!
//! ```text
//! node       /u<mary>
//! predicate  "knows"@[]  |  "met"@[2015-04-10T04:21:00.000000000Z]
//! literal    "true"^^type:bool
//! triple     SUBJECT\tPREDICATE\tOBJECT
//! ```

mod literal;
mod node;
mod predicate;

pub use literal::{Literal, LiteralBuilder};
pub use node::{Node, BLANK_NODE_TYPE};
pub use predicate::{format_anchor, parse_anchor, Predicate};

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Namespace for all content-derived v5 UUIDs minted by this crate.
pub(crate) const ID_NAMESPACE: Uuid = Uuid::from_u128(0x8c1d_1fbe_aa2c_44e1_9b6e_3d1f_52a7_90cd);

/// Errors raised by the quad data model.
#[derive(Error, Debug)]
pub enum TripleError {
    /// Node construction or parsing failed
    #[error("invalid node: {0}")]
    InvalidNode(String),

    /// Predicate construction or parsing failed
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    /// Literal construction or parsing failed
    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    /// Triple parsing failed
    #[error("invalid triple: {0}")]
    InvalidTriple(String),

    /// Time anchor is not a valid RFC 3339 timestamp
    #[error("invalid time anchor: {0}")]
    InvalidTimeAnchor(String),

    /// Bounded literal builder rejected an oversized value
    #[error("literal of {size} bytes exceeds the configured cap of {cap} bytes")]
    LiteralTooLarge { size: usize, cap: usize },

    /// A checked object getter was asked for the wrong variant
    #[error("object is not a {0}")]
    WrongObjectVariant(&'static str),
}

/// Result type for data-model operations.
pub type TripleResult<T> = Result<T, TripleError>;

// ============================================================================
// Object
// ============================================================================

/// The object position of a triple: a node, a predicate, or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Node(Node),
    Predicate(Predicate),
    Literal(Literal),
}

impl Object {
    /// Returns the boxed node, or an error for other variants.
    pub fn node(&self) -> TripleResult<&Node> {
        match self {
            Object::Node(n) => Ok(n),
            _ => Err(TripleError::WrongObjectVariant("node")),
        }
    }

    /// Returns the boxed predicate, or an error for other variants.
    pub fn predicate(&self) -> TripleResult<&Predicate> {
        match self {
            Object::Predicate(p) => Ok(p),
            _ => Err(TripleError::WrongObjectVariant("predicate")),
        }
    }

    /// Returns the boxed literal, or an error for other variants.
    pub fn literal(&self) -> TripleResult<&Literal> {
        match self {
            Object::Literal(l) => Ok(l),
            _ => Err(TripleError::WrongObjectVariant("literal")),
        }
    }

    /// Parses an object from its canonical form.
    ///
    /// Literal and predicate forms are unambiguous; anything else must parse
    /// as a node.
    pub fn parse(s: &str) -> TripleResult<Object> {
        if let Ok(l) = Literal::parse(s) {
            return Ok(Object::Literal(l));
        }
        if s.starts_with('"') {
            return Predicate::parse(s).map(Object::Predicate);
        }
        Node::parse(s).map(Object::Node)
    }

    /// Stable content-derived UUID of the boxed entity.
    pub fn uuid(&self) -> Uuid {
        match self {
            Object::Node(n) => n.uuid(),
            Object::Predicate(p) => p.uuid(),
            Object::Literal(l) => l.uuid(),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Node(n) => n.fmt(f),
            Object::Predicate(p) => p.fmt(f),
            Object::Literal(l) => l.fmt(f),
        }
    }
}

impl FromStr for Object {
    type Err = TripleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Object::parse(s)
    }
}

// ============================================================================
// Triple
// ============================================================================

/// Reification predicate ids.
const REIFY_SUBJECT: &str = "_subject";
const REIFY_PREDICATE: &str = "_predicate";
const REIFY_OBJECT: &str = "_object";

/// A subject/predicate/object statement.
///
/// All three components are present by construction; the parser enforces
/// the same for textual input.
#[derive(Debug, Clone, PartialEq)]
pub struct Triple {
    subject: Node,
    predicate: Predicate,
    object: Object,
}

impl Triple {
    /// Assembles a triple from its components.
    pub fn new(subject: Node, predicate: Predicate, object: Object) -> Triple {
        Triple {
            subject,
            predicate,
            object,
        }
    }

    /// Parses the canonical tab-separated form `SUBJECT\tPREDICATE\tOBJECT`.
    pub fn parse(s: &str) -> TripleResult<Triple> {
        let mut parts = s.splitn(3, '\t');
        let (Some(st), Some(pt), Some(ot)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TripleError::InvalidTriple(format!(
                "want three tab-separated components, got {s:?}"
            )));
        };
        Ok(Triple {
            subject: Node::parse(st)?,
            predicate: Predicate::parse(pt)?,
            object: Object::parse(ot)?,
        })
    }

    pub fn subject(&self) -> &Node {
        &self.subject
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn object(&self) -> &Object {
        &self.object
    }

    /// Stable UUID over the concatenated component UUIDs.
    pub fn uuid(&self) -> Uuid {
        let mut bytes = Vec::with_capacity(48);
        bytes.extend_from_slice(self.subject.uuid().as_bytes());
        bytes.extend_from_slice(self.predicate.uuid().as_bytes());
        bytes.extend_from_slice(self.object.uuid().as_bytes());
        Uuid::new_v5(&ID_NAMESPACE, &bytes)
    }

    /// Reifies the triple into a statement anchored on a fresh blank node.
    ///
    /// Returns four triples - the original plus one per component hung off
    /// the blank node - and the blank node itself. The reification
    /// predicates inherit the original predicate's anchor when it is
    /// temporal, so temporal statements stay temporal.
    pub fn reify(&self) -> (Vec<Triple>, Node) {
        let blank = Node::blank();
        let reify_predicate = |id: &str| match self.predicate.anchor() {
            None => Predicate::immutable(id),
            Some(anchor) => Predicate::temporal(id, *anchor),
        };
        let triples = vec![
            self.clone(),
            Triple::new(
                blank.clone(),
                reify_predicate(REIFY_SUBJECT),
                Object::Node(self.subject.clone()),
            ),
            Triple::new(
                blank.clone(),
                reify_predicate(REIFY_PREDICATE),
                Object::Predicate(self.predicate.clone()),
            ),
            Triple::new(
                blank.clone(),
                reify_predicate(REIFY_OBJECT),
                self.object.clone(),
            ),
        ];
        (triples, blank)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.subject, self.predicate, self.object)
    }
}

impl FromStr for Triple {
    type Err = TripleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Triple::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_triple() -> Triple {
        Triple::new(
            Node::new("/u", "john").unwrap(),
            Predicate::immutable("knows"),
            Object::Node(Node::new("/u", "mary").unwrap()),
        )
    }

    #[test]
    fn test_object_checked_getters() {
        let o = Object::Node(Node::new("/u", "mary").unwrap());
        assert!(o.node().is_ok());
        assert!(matches!(o.predicate(), Err(TripleError::WrongObjectVariant("predicate"))));
        assert!(matches!(o.literal(), Err(TripleError::WrongObjectVariant("literal"))));
    }

    #[test]
    fn test_object_parse_disambiguates() {
        assert!(matches!(Object::parse("\"1\"^^type:int64").unwrap(), Object::Literal(_)));
        assert!(matches!(Object::parse("\"knows\"@[]").unwrap(), Object::Predicate(_)));
        assert!(matches!(Object::parse("/u<mary>").unwrap(), Object::Node(_)));
        assert!(Object::parse("garbage").is_err());
    }

    #[test]
    fn test_triple_canonical_form_is_tab_separated() {
        assert_eq!(sample_triple().to_string(), "/u<john>\t\"knows\"@[]\t/u<mary>");
    }

    #[test]
    fn test_triple_parse_round_trip() {
        let t = sample_triple();
        assert_eq!(Triple::parse(&t.to_string()).unwrap(), t);
    }

    #[test]
    fn test_triple_parse_rejects_short_lines() {
        assert!(Triple::parse("/u<john>\t\"knows\"@[]").is_err());
        assert!(Triple::parse("").is_err());
    }

    #[test]
    fn test_triple_uuid_tracks_content() {
        let a = sample_triple();
        let b = Triple::parse(&a.to_string()).unwrap();
        assert_eq!(a.uuid(), b.uuid());
        let c = Triple::new(
            a.subject().clone(),
            Predicate::immutable("likes"),
            a.object().clone(),
        );
        assert_ne!(a.uuid(), c.uuid());
    }

    #[test]
    fn test_reify_immutable() {
        let t = sample_triple();
        let (triples, blank) = t.reify();
        assert_eq!(triples.len(), 4);
        assert_eq!(triples[0], t);
        assert!(blank.is_blank());
        for aux in &triples[1..] {
            assert_eq!(aux.subject(), &blank);
            assert!(aux.predicate().is_immutable());
        }
        assert_eq!(triples[1].object().node().unwrap(), t.subject());
        assert_eq!(triples[2].object().predicate().unwrap(), t.predicate());
        assert_eq!(triples[3].object(), t.object());
    }

    #[test]
    fn test_reify_preserves_temporality() {
        let anchor = Utc.with_ymd_and_hms(2015, 4, 10, 4, 21, 0).unwrap();
        let t = Triple::new(
            Node::new("/u", "john").unwrap(),
            Predicate::temporal("met", anchor),
            Object::Node(Node::new("/u", "mary").unwrap()),
        );
        let (triples, _) = t.reify();
        for aux in &triples[1..] {
            assert_eq!(aux.predicate().anchor(), Some(&anchor));
        }
    }
}
