//! Graph predicates.
//!
//! A predicate is an `(id, optional time anchor)` pair. With an anchor the
//! predicate is *temporal*; without one it is *immutable*. The canonical
//! string form is `"id"@[]` for immutable predicates and
//! `"id"@[RFC3339-with-nanoseconds]` for temporal ones. A `"` inside the id
//! is backslash-escaped on serialization.
//!
//! ## Identity
//!
//! Predicates expose two content hashes:
//!
//! - `uuid()` covers the full canonical form, anchor included.
//! - `partial_uuid()` covers the id only, so every temporal instance of
//!   `"follows"` collapses onto one key. The storage indices rely on this
//!   to keep temporal range lookups index-backed.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{TripleError, TripleResult, ID_NAMESPACE};

/// A graph predicate, optionally anchored in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    id: String,
    anchor: Option<DateTime<Utc>>,
}

impl Predicate {
    /// Creates an immutable predicate.
    pub fn immutable(id: &str) -> Predicate {
        Predicate {
            id: id.to_string(),
            anchor: None,
        }
    }

    /// Creates a temporal predicate anchored at `anchor`.
    pub fn temporal(id: &str, anchor: DateTime<Utc>) -> Predicate {
        Predicate {
            id: id.to_string(),
            anchor: Some(anchor),
        }
    }

    /// Parses the canonical form `"id"@[]` or `"id"@[anchor]`.
    ///
    /// The anchor, when present, must be a valid RFC 3339 timestamp;
    /// otherwise the parse fails with `InvalidTimeAnchor`.
    pub fn parse(s: &str) -> TripleResult<Predicate> {
        if s.is_empty() {
            return Err(TripleError::InvalidPredicate("empty input".to_string()));
        }
        if !s.starts_with('"') {
            return Err(TripleError::InvalidPredicate(format!(
                "missing opening '\"' in {s:?}"
            )));
        }
        if !s.ends_with(']') {
            return Err(TripleError::InvalidPredicate(format!(
                "missing closing ']' in {s:?}"
            )));
        }
        // The id may contain escaped quotes, so the id/anchor boundary is the
        // last occurrence of the `"@[` marker.
        let sep = s.rfind("\"@[").ok_or_else(|| {
            TripleError::InvalidPredicate(format!("missing '\"@[' separator in {s:?}"))
        })?;
        let id = s[1..sep].replace("\\\"", "\"");
        let anchor_text = &s[sep + 3..s.len() - 1];
        if anchor_text.is_empty() {
            return Ok(Predicate::immutable(&id));
        }
        let anchor = parse_anchor(anchor_text)?;
        Ok(Predicate::temporal(&id, anchor))
    }

    /// The predicate id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The time anchor, if this predicate is temporal.
    pub fn anchor(&self) -> Option<&DateTime<Utc>> {
        self.anchor.as_ref()
    }

    /// True when the predicate carries a time anchor.
    pub fn is_temporal(&self) -> bool {
        self.anchor.is_some()
    }

    /// True when the predicate carries no time anchor.
    pub fn is_immutable(&self) -> bool {
        self.anchor.is_none()
    }

    /// Stable content-derived UUID over the full canonical form.
    pub fn uuid(&self) -> Uuid {
        Uuid::new_v5(&ID_NAMESPACE, self.to_string().as_bytes())
    }

    /// Partial UUID over the id only, ignoring the anchor.
    ///
    /// Equal ids always hash equal here, whatever their anchors; partial
    /// equality says nothing about full-UUID equality.
    pub fn partial_uuid(&self) -> Uuid {
        Uuid::new_v5(&ID_NAMESPACE, self.id.as_bytes())
    }
}

/// Formats an anchor in the canonical RFC 3339 form with nanoseconds.
pub fn format_anchor(anchor: &DateTime<Utc>) -> String {
    anchor.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses an RFC 3339 timestamp into a UTC anchor.
pub fn parse_anchor(s: &str) -> TripleResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TripleError::InvalidTimeAnchor(format!("{s:?}: {e}")))
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id.replace('"', "\\\"");
        match &self.anchor {
            None => write!(f, "\"{id}\"@[]"),
            Some(anchor) => write!(f, "\"{id}\"@[{}]", format_anchor(anchor)),
        }
    }
}

impl FromStr for Predicate {
    type Err = TripleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Predicate::parse(s)
    }
}
