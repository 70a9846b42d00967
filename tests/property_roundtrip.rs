//! Property-based round-trip tests (proptest).
//!
//! Parse/print laws for the data model: every canonical string form parses
//! back to the entity that produced it, and content hashes agree with
//! canonical-form equality.

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use chronograph::triple::{Literal, Node, Object, Predicate, Triple};

// ============================================================================
// Strategies
// ============================================================================

/// Path-like node types: 1-3 non-empty segments.
fn node_type_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9_]{0,7}", 1..=3)
        .prop_map(|segments| format!("/{}", segments.join("/")))
}

/// Node ids: printable, no angle brackets.
fn node_id_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.:-]{1,16}".prop_map(|s| s)
}

/// Predicate ids may contain quotes (escaped on serialization).
fn predicate_id_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 \"_.-]{1,16}".prop_map(|s| s)
}

/// Time anchors across a wide post-epoch range, with sub-second precision.
fn anchor_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
        DateTime::<Utc>::from_timestamp(secs, nanos).expect("in range")
    })
}

fn literal_strategy() -> impl Strategy<Value = Literal> {
    prop_oneof![
        any::<bool>().prop_map(Literal::Bool),
        any::<i64>().prop_map(Literal::Int64),
        any::<f64>()
            .prop_filter("finite floats only", |f| f.is_finite())
            .prop_map(Literal::Float64),
        "[a-zA-Z0-9 ,.!?'-]{0,24}".prop_map(Literal::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Literal::Blob),
    ]
}

fn predicate_strategy() -> impl Strategy<Value = Predicate> {
    (predicate_id_strategy(), prop::option::of(anchor_strategy())).prop_map(|(id, anchor)| {
        match anchor {
            None => Predicate::immutable(&id),
            Some(anchor) => Predicate::temporal(&id, anchor),
        }
    })
}

fn node_strategy() -> impl Strategy<Value = Node> {
    (node_type_strategy(), node_id_strategy())
        .prop_map(|(t, id)| Node::new(&t, &id).expect("strategy yields valid nodes"))
}

fn object_strategy() -> impl Strategy<Value = Object> {
    prop_oneof![
        node_strategy().prop_map(Object::Node),
        predicate_strategy().prop_map(Object::Predicate),
        literal_strategy().prop_map(Object::Literal),
    ]
}

// ============================================================================
// Round-Trip Laws
// ============================================================================

proptest! {
    #[test]
    fn prop_node_round_trips(node in node_strategy()) {
        let parsed = Node::parse(&node.to_string()).expect("canonical form parses");
        prop_assert_eq!(&parsed, &node);
        prop_assert_eq!(parsed.uuid(), node.uuid());
    }

    #[test]
    fn prop_predicate_round_trips(predicate in predicate_strategy()) {
        let parsed = Predicate::parse(&predicate.to_string()).expect("canonical form parses");
        prop_assert_eq!(&parsed, &predicate);
        prop_assert_eq!(parsed.uuid(), predicate.uuid());
        prop_assert_eq!(parsed.partial_uuid(), predicate.partial_uuid());
    }

    #[test]
    fn prop_literal_round_trips(literal in literal_strategy()) {
        let parsed = Literal::parse(&literal.to_string()).expect("canonical form parses");
        prop_assert_eq!(parsed, literal);
    }

    #[test]
    fn prop_object_round_trips(object in object_strategy()) {
        let parsed = Object::parse(&object.to_string()).expect("canonical form parses");
        prop_assert_eq!(parsed, object);
    }

    #[test]
    fn prop_triple_round_trips(
        subject in node_strategy(),
        predicate in predicate_strategy(),
        object in object_strategy(),
    ) {
        let triple = Triple::new(subject, predicate, object);
        let parsed = Triple::parse(&triple.to_string()).expect("canonical form parses");
        prop_assert_eq!(&parsed, &triple);
        prop_assert_eq!(parsed.uuid(), triple.uuid());
    }

    #[test]
    fn prop_partial_uuid_ignores_anchor(
        id in predicate_id_strategy(),
        a in anchor_strategy(),
        b in anchor_strategy(),
    ) {
        let pa = Predicate::temporal(&id, a);
        let pb = Predicate::temporal(&id, b);
        let pi = Predicate::immutable(&id);
        prop_assert_eq!(pa.partial_uuid(), pb.partial_uuid());
        prop_assert_eq!(pa.partial_uuid(), pi.partial_uuid());
    }

    #[test]
    fn prop_reify_preserves_shape_and_temporality(
        subject in node_strategy(),
        predicate in predicate_strategy(),
        object in object_strategy(),
    ) {
        let triple = Triple::new(subject, predicate, object);
        let (reified, blank) = triple.reify();
        prop_assert_eq!(reified.len(), 4);
        prop_assert_eq!(&reified[0], &triple);
        for aux in &reified[1..] {
            prop_assert_eq!(aux.subject(), &blank);
            prop_assert_eq!(aux.predicate().anchor(), triple.predicate().anchor());
        }
    }

    #[test]
    fn prop_int_literals_sort_numerically(a in any::<i64>(), b in any::<i64>()) {
        let fa = Literal::Int64(a).comparable_form();
        let fb = Literal::Int64(b).comparable_form();
        prop_assert_eq!(a.cmp(&b), fa.cmp(&fb));
    }
}
