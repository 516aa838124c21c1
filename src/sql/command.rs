//! The resolved command tree.
//!
//! A [`Command`] is the input handed to this core by the (out-of-scope)
//! resolver/planner: a fully resolved query or set query whose symbols
//! already reference concrete groups. The alias rewriter mutates the
//! output-facing names in place; `Display` then serializes the command to
//! push-down SQL using those names.

// Allow the long Display impls - big matches but simple
#![allow(clippy::too_many_lines)]

use std::fmt;

use serde::{Deserialize, Serialize};

use super::expr::Expression;
use super::symbol::GroupSymbol;

/// A resolved command: a plain query or a set operation over queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// A SELECT query.
    Query(Query),
    /// A set operation (UNION/INTERSECT/EXCEPT).
    SetQuery(SetQuery),
}

impl Command {
    /// The ORDER BY clause of this command, if any.
    #[must_use]
    pub fn order_by(&self) -> Option<&OrderBy> {
        match self {
            Self::Query(q) => q.order_by.as_ref(),
            Self::SetQuery(s) => s.order_by.as_ref(),
        }
    }

    /// The row-window clause of this command, if any.
    #[must_use]
    pub fn limit(&self) -> Option<&Limit> {
        match self {
            Self::Query(q) => q.limit.as_ref(),
            Self::SetQuery(s) => s.limit.as_ref(),
        }
    }
}

/// A SELECT query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// The SELECT clause.
    pub select: Select,
    /// The FROM clause, absent for constant-only queries.
    pub from: Option<From>,
    /// The WHERE predicate.
    pub criteria: Option<Expression>,
    /// GROUP BY expressions.
    pub group_by: Vec<Expression>,
    /// HAVING predicate.
    pub having: Option<Expression>,
    /// ORDER BY clause.
    pub order_by: Option<OrderBy>,
    /// LIMIT/OFFSET clause.
    pub limit: Option<Limit>,
}

impl Query {
    /// Creates a query with just a SELECT list and FROM clause.
    #[must_use]
    pub fn new(select: Select, from: Option<From>) -> Self {
        Self {
            select,
            from,
            criteria: None,
            group_by: Vec::new(),
            having: None,
            order_by: None,
            limit: None,
        }
    }
}

/// The SELECT clause of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    /// Whether DISTINCT was specified.
    pub distinct: bool,
    /// The projected expressions, in declaration order.
    pub symbols: Vec<Expression>,
}

impl Select {
    /// Creates a non-distinct SELECT list.
    #[must_use]
    pub fn new(symbols: Vec<Expression>) -> Self {
        Self { distinct: false, symbols }
    }
}

/// The FROM clause of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct From {
    /// The from-clause items.
    pub clauses: Vec<FromClause>,
}

/// One item of a FROM clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FromClause {
    /// A plain group reference.
    Group(GroupSymbol),

    /// An inline derived table (`FROM (SELECT ...) AS v`).
    Subquery {
        /// The virtual group naming the derived table.
        group: GroupSymbol,
        /// The nested command.
        command: Box<Command>,
    },

    /// A join between two from-clause items.
    Join {
        /// Left side.
        left: Box<FromClause>,
        /// Right side.
        right: Box<FromClause>,
        /// The join type.
        join_type: JoinType,
        /// Join predicates, implicitly conjoined.
        criteria: Vec<Expression>,
    },
}

/// The type of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Inner join.
    Inner,
    /// Left outer join.
    LeftOuter,
    /// Right outer join.
    RightOuter,
    /// Full outer join.
    FullOuter,
    /// Cross join (no criteria).
    Cross,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Inner => "INNER JOIN",
            Self::LeftOuter => "LEFT OUTER JOIN",
            Self::RightOuter => "RIGHT OUTER JOIN",
            Self::FullOuter => "FULL OUTER JOIN",
            Self::Cross => "CROSS JOIN",
        };
        write!(f, "{s}")
    }
}

/// The ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    /// The sort keys, most significant first.
    pub items: Vec<OrderByItem>,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    /// The sorted expression; correlated to the nearest enclosing SELECT
    /// list by name.
    pub expr: Expression,
    /// Ascending order when `true`.
    pub ascending: bool,
}

/// The LIMIT/OFFSET clause.
///
/// Absent or negative expressions denote "no limit" / "no offset"
/// respectively, not errors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Limit {
    /// Maximum number of rows to emit.
    pub row_limit: Option<Expression>,
    /// Number of leading rows to skip.
    pub offset: Option<Expression>,
}

/// A set operation over two commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetQuery {
    /// The set operation kind.
    pub op: SetOpKind,
    /// Whether ALL was specified (duplicates kept).
    pub all: bool,
    /// The left branch.
    pub left: Box<Command>,
    /// The right branch.
    pub right: Box<Command>,
    /// ORDER BY applied to the combined result.
    pub order_by: Option<OrderBy>,
    /// LIMIT/OFFSET applied to the combined result.
    pub limit: Option<Limit>,
}

/// The kind of a set operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetOpKind {
    /// UNION.
    Union,
    /// INTERSECT.
    Intersect,
    /// EXCEPT.
    Except,
}

impl fmt::Display for SetOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Union => "UNION",
            Self::Intersect => "INTERSECT",
            Self::Except => "EXCEPT",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(q) => write!(f, "{q}"),
            Self::SetQuery(s) => write!(f, "{s}"),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.select.distinct {
            write!(f, "DISTINCT ")?;
        }
        for (i, sym) in self.select.symbols.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            // A select item renders with its outward-facing alias when that
            // differs from the natural name.
            match sym {
                Expression::Element(e) if e.has_output_name() => {
                    write!(f, "{e} AS {}", e.output_name())?;
                }
                other => write!(f, "{other}")?,
            }
        }
        if let Some(from) = &self.from {
            write!(f, " FROM ")?;
            for (i, clause) in from.clauses.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{clause}")?;
            }
        }
        if let Some(criteria) = &self.criteria {
            write!(f, " WHERE {criteria}")?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY ")?;
            for (i, e) in self.group_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{e}")?;
            }
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {having}")?;
        }
        if let Some(order_by) = &self.order_by {
            write!(f, " {order_by}")?;
        }
        if let Some(limit) = &self.limit {
            write!(f, "{limit}")?;
        }
        Ok(())
    }
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(g) => write!(f, "{g}"),
            Self::Subquery { group, command } => {
                write!(f, "({command}) AS {}", group.output_name())
            }
            Self::Join { left, right, join_type, criteria } => {
                write!(f, "{left} {join_type} {right}")?;
                if !criteria.is_empty() {
                    write!(f, " ON ")?;
                    for (i, c) in criteria.iter().enumerate() {
                        if i > 0 {
                            write!(f, " AND ")?;
                        }
                        write!(f, "{c}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORDER BY ")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            // ORDER BY references the select item's outward-facing name.
            match &item.expr {
                Expression::Element(e) => write!(f, "{}", e.output_name())?,
                other => write!(f, "{other}")?,
            }
            if !item.ascending {
                write!(f, " DESC")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(limit) = &self.row_limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SetQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.left, self.op)?;
        if self.all {
            write!(f, "ALL ")?;
        }
        write!(f, "{}", self.right)?;
        if let Some(order_by) = &self.order_by {
            write!(f, " {order_by}")?;
        }
        if let Some(limit) = &self.limit {
            write!(f, "{limit}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Value;
    use crate::sql::symbol::ElementSymbol;

    #[test]
    fn renders_plain_query() {
        let g = GroupSymbol::new("parts");
        let query = Query::new(
            Select::new(vec![Expression::Element(ElementSymbol::new(g.clone(), "id"))]),
            Some(From { clauses: vec![FromClause::Group(g)] }),
        );
        assert_eq!(Command::Query(query).to_string(), "SELECT parts.id FROM parts");
    }

    #[test]
    fn renders_limit_offset() {
        let g = GroupSymbol::new("t");
        let mut query = Query::new(
            Select::new(vec![Expression::Element(ElementSymbol::new(g.clone(), "a"))]),
            Some(From { clauses: vec![FromClause::Group(g)] }),
        );
        query.limit = Some(Limit {
            row_limit: Some(Expression::Constant(Value::Integer(10))),
            offset: Some(Expression::Constant(Value::Integer(5))),
        });
        assert_eq!(Command::Query(query).to_string(), "SELECT t.a FROM t LIMIT 10 OFFSET 5");
    }
}
