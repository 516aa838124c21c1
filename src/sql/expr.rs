//! Expressions in the resolved command tree.
//!
//! Expressions form a closed tagged union so that the alias rewriter and
//! the evaluator match exhaustively; adding a kind forces every walker to
//! handle it.

// Allow constructor names that match std traits - these take operands by
// value and return new expressions, not Self comparisons
#![allow(clippy::should_implement_trait)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exec::Value;

use super::command::Command;
use super::symbol::ElementSymbol;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// An expression over symbols, constants and nested commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// A constant value.
    Constant(Value),

    /// A column reference.
    Element(ElementSymbol),

    /// An aliased expression (`expr AS name`).
    Alias {
        /// The declared alias.
        name: String,
        /// The wrapped expression.
        expr: Box<Expression>,
    },

    /// A scalar function call.
    Function {
        /// Function name.
        name: String,
        /// Function arguments.
        args: Vec<Expression>,
    },

    /// A binary comparison.
    Compare {
        /// The comparison operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },

    /// `expr IS [NOT] NULL`.
    IsNull {
        /// The tested expression.
        expr: Box<Expression>,
        /// Whether IS NOT NULL.
        negated: bool,
    },

    /// Logical negation.
    Not(Box<Expression>),

    /// Conjunction of two or more predicates.
    And(Vec<Expression>),

    /// Disjunction of two or more predicates.
    Or(Vec<Expression>),

    /// A scalar subquery.
    ScalarSubquery(Box<Command>),

    /// An EXISTS predicate over a nested command.
    Exists(Box<Command>),
}

impl Expression {
    /// Convenience constructor for an equality comparison.
    #[must_use]
    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::Compare { op: CompareOp::Eq, left: Box::new(left), right: Box::new(right) }
    }

    /// Strips alias wrappers, returning the underlying expression.
    ///
    /// The symbol map stores underlying expressions so that later rewrites
    /// compose without accumulating indirection layers.
    #[must_use]
    pub fn underlying(&self) -> &Expression {
        match self {
            Self::Alias { expr, .. } => expr.underlying(),
            other => other,
        }
    }

    /// The outward-facing name of this expression when it appears in a
    /// SELECT list: the element's output name, a declared alias, or a
    /// placeholder for computed expressions.
    #[must_use]
    pub fn output_name(&self) -> &str {
        match self {
            Self::Element(e) => e.output_name(),
            Self::Alias { name, .. } => name,
            _ => "expr",
        }
    }

    /// Splits a conjunctive predicate into its AND-separated clauses.
    ///
    /// Non-AND expressions yield themselves as the single clause; nested
    /// conjunctions are flattened.
    #[must_use]
    pub fn split_and(&self) -> Vec<&Expression> {
        fn walk<'a>(expr: &'a Expression, out: &mut Vec<&'a Expression>) {
            match expr {
                Expression::And(parts) => {
                    for p in parts {
                        walk(p, out);
                    }
                }
                other => out.push(other),
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    /// Combines clauses back into a conjunction.
    ///
    /// Returns `None` for an empty clause list and the sole clause
    /// unwrapped for a singleton list.
    #[must_use]
    pub fn combine_and(mut clauses: Vec<Expression>) -> Option<Expression> {
        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Expression::And(clauses)),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "{v}"),
            Self::Element(e) => write!(f, "{e}"),
            Self::Alias { name, expr } => write!(f, "{expr} AS {name}"),
            Self::Function { name, args } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            Self::Compare { op, left, right } => write!(f, "{left} {op} {right}"),
            Self::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "{expr} IS NOT NULL")
                } else {
                    write!(f, "{expr} IS NULL")
                }
            }
            Self::Not(e) => write!(f, "NOT ({e})"),
            Self::And(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{p}")?;
                }
                Ok(())
            }
            Self::Or(parts) => {
                write!(f, "(")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
            Self::ScalarSubquery(cmd) => write!(f, "({cmd})"),
            Self::Exists(cmd) => write!(f, "EXISTS ({cmd})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::symbol::GroupSymbol;

    fn elem(group: &str, name: &str) -> Expression {
        Expression::Element(ElementSymbol::new(GroupSymbol::new(group), name))
    }

    #[test]
    fn split_flattens_nested_conjunctions() {
        let a = Expression::eq(elem("t", "a"), Expression::Constant(Value::Integer(1)));
        let b = Expression::eq(elem("t", "b"), Expression::Constant(Value::Integer(2)));
        let c = Expression::IsNull { expr: Box::new(elem("t", "c")), negated: false };
        let expr = Expression::And(vec![Expression::And(vec![a.clone(), b.clone()]), c.clone()]);

        let clauses = expr.split_and();
        assert_eq!(clauses, vec![&a, &b, &c]);
    }

    #[test]
    fn split_single_clause() {
        let a = Expression::eq(elem("t", "a"), Expression::Constant(Value::Integer(1)));
        assert_eq!(a.split_and(), vec![&a]);
    }

    #[test]
    fn combine_inverse_of_split() {
        assert_eq!(Expression::combine_and(vec![]), None);

        let a = Expression::eq(elem("t", "a"), Expression::Constant(Value::Integer(1)));
        assert_eq!(Expression::combine_and(vec![a.clone()]), Some(a.clone()));

        let b = Expression::IsNull { expr: Box::new(elem("t", "b")), negated: false };
        let combined = Expression::combine_and(vec![a.clone(), b.clone()]).expect("non-empty");
        assert_eq!(combined.split_and(), vec![&a, &b]);
    }

    #[test]
    fn underlying_strips_alias_layers() {
        let base = elem("t", "a");
        let wrapped = Expression::Alias {
            name: "outer".into(),
            expr: Box::new(Expression::Alias { name: "inner".into(), expr: Box::new(base.clone()) }),
        };
        assert_eq!(wrapped.underlying(), &base);
    }

    #[test]
    fn display_comparison() {
        let e = Expression::eq(elem("t", "a"), Expression::Constant(Value::Integer(5)));
        assert_eq!(e.to_string(), "t.a = 5");
    }
}
