//! Typed literal values.
//!
//! A literal carries one value out of `{bool, int64, float64, text, blob}`.
//! The canonical string form is `"value"^^type:tag`, e.g. `"true"^^type:bool`
//! or `"[1 2 3]"^^type:blob` (blobs print as a space-separated decimal byte
//! list in square brackets).
//!
//! Literals are built through a [`LiteralBuilder`]: the default builder is
//! unbounded, the bounded builder rejects values whose canonical string form
//! exceeds a byte cap with `LiteralTooLarge`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{TripleError, TripleResult, ID_NAMESPACE};

static LITERAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)^"(.*)"\^\^type:(bool|int64|float64|text|blob)$"#)
        .expect("literal pattern must compile")
});

/// A typed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Literal {
    /// The type tag used in the canonical form.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Literal::Bool(_) => "bool",
            Literal::Int64(_) => "int64",
            Literal::Float64(_) => "float64",
            Literal::Text(_) => "text",
            Literal::Blob(_) => "blob",
        }
    }

    /// Parses the canonical form `"value"^^type:tag`.
    pub fn parse(s: &str) -> TripleResult<Literal> {
        let caps = LITERAL_RE.captures(s).ok_or_else(|| {
            TripleError::InvalidLiteral(format!("malformed literal {s:?}"))
        })?;
        let value = &caps[1];
        match &caps[2] {
            "bool" => value
                .parse::<bool>()
                .map(Literal::Bool)
                .map_err(|_| TripleError::InvalidLiteral(format!("bad bool {value:?}"))),
            "int64" => value
                .parse::<i64>()
                .map(Literal::Int64)
                .map_err(|_| TripleError::InvalidLiteral(format!("bad int64 {value:?}"))),
            "float64" => value
                .parse::<f64>()
                .map(Literal::Float64)
                .map_err(|_| TripleError::InvalidLiteral(format!("bad float64 {value:?}"))),
            "text" => Ok(Literal::Text(value.to_string())),
            "blob" => parse_blob(value).map(Literal::Blob),
            _ => unreachable!("pattern restricts the tag set"),
        }
    }

    /// Stable content-derived UUID over the canonical string form.
    pub fn uuid(&self) -> Uuid {
        Uuid::new_v5(&ID_NAMESPACE, self.to_string().as_bytes())
    }

    /// Returns the boolean value, or an error for other types.
    pub fn bool(&self) -> TripleResult<bool> {
        match self {
            Literal::Bool(v) => Ok(*v),
            other => Err(TripleError::InvalidLiteral(format!(
                "literal {other} is not a bool"
            ))),
        }
    }

    /// Returns the int64 value, or an error for other types.
    pub fn int64(&self) -> TripleResult<i64> {
        match self {
            Literal::Int64(v) => Ok(*v),
            other => Err(TripleError::InvalidLiteral(format!(
                "literal {other} is not an int64"
            ))),
        }
    }

    /// Returns the float64 value, or an error for other types.
    pub fn float64(&self) -> TripleResult<f64> {
        match self {
            Literal::Float64(v) => Ok(*v),
            other => Err(TripleError::InvalidLiteral(format!(
                "literal {other} is not a float64"
            ))),
        }
    }

    /// Returns the text value, or an error for other types.
    pub fn text(&self) -> TripleResult<&str> {
        match self {
            Literal::Text(v) => Ok(v),
            other => Err(TripleError::InvalidLiteral(format!(
                "literal {other} is not text"
            ))),
        }
    }

    /// Returns the blob value, or an error for other types.
    pub fn blob(&self) -> TripleResult<&[u8]> {
        match self {
            Literal::Blob(v) => Ok(v),
            other => Err(TripleError::InvalidLiteral(format!(
                "literal {other} is not a blob"
            ))),
        }
    }

    /// A string form safe for ordered comparison.
    ///
    /// Numeric literals map onto fixed-width monotone encodings so they sort
    /// numerically within their type; all other literals (and cross-type
    /// comparisons) fall back to lexical order on the canonical form.
    pub fn comparable_form(&self) -> String {
        match self {
            Literal::Int64(v) => {
                // Biasing by the sign bit turns two's complement order into
                // unsigned order, which zero-padded decimal preserves.
                let biased = (*v as u64) ^ (1u64 << 63);
                format!("\"{biased:020}\"^^type:int64")
            }
            Literal::Float64(v) => {
                let bits = v.to_bits();
                // IEEE 754 total-order key: flip all bits for negatives,
                // set the sign bit for non-negatives.
                let key = if bits & (1u64 << 63) != 0 {
                    !bits
                } else {
                    bits | (1u64 << 63)
                };
                format!("\"{key:016x}\"^^type:float64")
            }
            _ => self.to_string(),
        }
    }
}

fn parse_blob(value: &str) -> TripleResult<Vec<u8>> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(|| TripleError::InvalidLiteral(format!("bad blob {value:?}")))?;
    inner
        .split_whitespace()
        .map(|b| {
            b.parse::<u8>()
                .map_err(|_| TripleError::InvalidLiteral(format!("bad blob byte {b:?}")))
        })
        .collect()
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(v) => write!(f, "\"{v}\"^^type:bool"),
            Literal::Int64(v) => write!(f, "\"{v}\"^^type:int64"),
            Literal::Float64(v) => write!(f, "\"{v}\"^^type:float64"),
            Literal::Text(v) => write!(f, "\"{v}\"^^type:text"),
            Literal::Blob(v) => {
                let bytes: Vec<String> = v.iter().map(ToString::to_string).collect();
                write!(f, "\"[{}]\"^^type:blob", bytes.join(" "))
            }
        }
    }
}

impl FromStr for Literal {
    type Err = TripleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Literal::parse(s)
    }
}

/// Builds literals, optionally enforcing a byte cap on the canonical form.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralBuilder {
    cap: Option<usize>,
}

impl LiteralBuilder {
    /// A builder without a size restriction.
    pub fn unbounded() -> LiteralBuilder {
        LiteralBuilder { cap: None }
    }

    /// A builder that rejects literals whose canonical string form exceeds
    /// `cap` bytes. The cap counts the whole form, type tag included.
    pub fn bounded(cap: usize) -> LiteralBuilder {
        LiteralBuilder { cap: Some(cap) }
    }

    /// Validates and returns the literal.
    pub fn build(&self, literal: Literal) -> TripleResult<Literal> {
        if let Some(cap) = self.cap {
            let size = literal.to_string().len();
            if size > cap {
                return Err(TripleError::LiteralTooLarge { size, cap });
            }
        }
        Ok(literal)
    }
}
