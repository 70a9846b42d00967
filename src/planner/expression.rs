//! Boolean expressions over table rows.
//!
//! The HAVING clause and the WHERE residual predicates evaluate these
//! trees row by row. Leaves compare two bindings through their cells'
//! canonical string forms; internal nodes combine results with NOT, AND
//! and OR. The tree shape itself guarantees operand presence (NOT owns one
//! child, AND/OR own two), so a malformed tree cannot be built; missing or
//! empty *bindings* still fail at evaluation time.

use std::cmp::Ordering;

use crate::table::Row;

use super::{PlannerError, PlannerResult};

/// Comparison operator of a leaf expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Lt,
    Gt,
}

/// A boolean expression tree evaluated against one row.
#[derive(Debug, Clone)]
pub enum Expression {
    /// Compares the cells of two bindings on their canonical strings.
    Comparison {
        op: ComparisonOp,
        lhs: String,
        rhs: String,
    },
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn eq(lhs: &str, rhs: &str) -> Expression {
        Expression::Comparison {
            op: ComparisonOp::Eq,
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        }
    }

    pub fn lt(lhs: &str, rhs: &str) -> Expression {
        Expression::Comparison {
            op: ComparisonOp::Lt,
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        }
    }

    pub fn gt(lhs: &str, rhs: &str) -> Expression {
        Expression::Comparison {
            op: ComparisonOp::Gt,
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        }
    }

    pub fn not(child: Expression) -> Expression {
        Expression::Not(Box::new(child))
    }

    pub fn and(lhs: Expression, rhs: Expression) -> Expression {
        Expression::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Expression, rhs: Expression) -> Expression {
        Expression::Or(Box::new(lhs), Box::new(rhs))
    }

    /// Evaluates the expression against one row.
    ///
    /// Both sides of AND/OR are always evaluated, so binding errors
    /// surface deterministically whatever the other side yields.
    pub fn evaluate(&self, row: &Row) -> PlannerResult<bool> {
        match self {
            Expression::Comparison { op, lhs, rhs } => {
                let l = operand(row, lhs)?;
                let r = operand(row, rhs)?;
                Ok(match op {
                    ComparisonOp::Eq => l == r,
                    ComparisonOp::Lt => l.cmp(&r) == Ordering::Less,
                    ComparisonOp::Gt => l.cmp(&r) == Ordering::Greater,
                })
            }
            Expression::Not(child) => Ok(!child.evaluate(row)?),
            Expression::And(lhs, rhs) => {
                let l = lhs.evaluate(row)?;
                let r = rhs.evaluate(row)?;
                Ok(l && r)
            }
            Expression::Or(lhs, rhs) => {
                let l = lhs.evaluate(row)?;
                let r = rhs.evaluate(row)?;
                Ok(l || r)
            }
        }
    }
}

/// The canonical string of a binding's cell; missing and empty bindings
/// are evaluation errors.
fn operand(row: &Row, binding: &str) -> PlannerResult<String> {
    let cell = row
        .get(binding)
        .ok_or_else(|| PlannerError::MissingBinding(binding.to_string()))?;
    if cell.is_empty() {
        return Err(PlannerError::EmptyBinding(binding.to_string()));
    }
    Ok(cell.to_string())
}
