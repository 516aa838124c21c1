//! Expression walking helpers.
//!
//! The walkers stop at nested command boundaries: elements inside a
//! scalar subquery belong to that subquery's scope and are visited when
//! the enclosing pass descends into the nested command explicitly.

use super::command::Command;
use super::expr::Expression;
use super::symbol::ElementSymbol;

/// Visits every element symbol in an expression, excluding nested commands.
pub fn for_each_element<'a, F>(expr: &'a Expression, f: &mut F)
where
    F: FnMut(&'a ElementSymbol),
{
    match expr {
        Expression::Element(e) => f(e),
        Expression::Constant(_) | Expression::ScalarSubquery(_) | Expression::Exists(_) => {}
        Expression::Alias { expr, .. } | Expression::Not(expr) => for_each_element(expr, f),
        Expression::IsNull { expr, .. } => for_each_element(expr, f),
        Expression::Function { args, .. } => {
            for a in args {
                for_each_element(a, f);
            }
        }
        Expression::Compare { left, right, .. } => {
            for_each_element(left, f);
            for_each_element(right, f);
        }
        Expression::And(parts) | Expression::Or(parts) => {
            for p in parts {
                for_each_element(p, f);
            }
        }
    }
}

/// Visits every element symbol in an expression mutably, excluding nested
/// commands.
pub fn for_each_element_mut<F>(expr: &mut Expression, f: &mut F)
where
    F: FnMut(&mut ElementSymbol),
{
    match expr {
        Expression::Element(e) => f(e),
        Expression::Constant(_) | Expression::ScalarSubquery(_) | Expression::Exists(_) => {}
        Expression::Alias { expr, .. } | Expression::Not(expr) => for_each_element_mut(expr, f),
        Expression::IsNull { expr, .. } => for_each_element_mut(expr, f),
        Expression::Function { args, .. } => {
            for a in args {
                for_each_element_mut(a, f);
            }
        }
        Expression::Compare { left, right, .. } => {
            for_each_element_mut(left, f);
            for_each_element_mut(right, f);
        }
        Expression::And(parts) | Expression::Or(parts) => {
            for p in parts {
                for_each_element_mut(p, f);
            }
        }
    }
}

/// Visits every directly nested command in an expression mutably.
///
/// Only the outermost nesting level is visited; a pass that needs to
/// recurse further does so from inside its callback.
pub fn for_each_subcommand_mut<F>(expr: &mut Expression, f: &mut F)
where
    F: FnMut(&mut Command),
{
    match expr {
        Expression::ScalarSubquery(cmd) | Expression::Exists(cmd) => f(cmd),
        Expression::Constant(_) | Expression::Element(_) => {}
        Expression::Alias { expr, .. } | Expression::Not(expr) => for_each_subcommand_mut(expr, f),
        Expression::IsNull { expr, .. } => for_each_subcommand_mut(expr, f),
        Expression::Function { args, .. } => {
            for a in args {
                for_each_subcommand_mut(a, f);
            }
        }
        Expression::Compare { left, right, .. } => {
            for_each_subcommand_mut(left, f);
            for_each_subcommand_mut(right, f);
        }
        Expression::And(parts) | Expression::Or(parts) => {
            for p in parts {
                for_each_subcommand_mut(p, f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Value;
    use crate::sql::symbol::GroupSymbol;

    fn elem(name: &str) -> Expression {
        Expression::Element(ElementSymbol::new(GroupSymbol::new("t"), name))
    }

    #[test]
    fn collects_elements_in_order() {
        let expr = Expression::And(vec![
            Expression::eq(elem("a"), Expression::Constant(Value::Integer(1))),
            Expression::IsNull { expr: Box::new(elem("b")), negated: false },
        ]);

        let mut seen = Vec::new();
        for_each_element(&expr, &mut |e| seen.push(e.short_name().to_string()));
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn stops_at_subquery_boundary() {
        use crate::sql::command::{Command, From, FromClause, Query, Select};

        let inner_group = GroupSymbol::new("inner");
        let inner = Command::Query(Query::new(
            Select::new(vec![Expression::Element(ElementSymbol::new(
                inner_group.clone(),
                "hidden",
            ))]),
            Some(From { clauses: vec![FromClause::Group(inner_group)] }),
        ));
        let expr = Expression::And(vec![
            elem("visible"),
            Expression::Exists(Box::new(inner)),
        ]);

        let mut seen = Vec::new();
        for_each_element(&expr, &mut |e| seen.push(e.short_name().to_string()));
        assert_eq!(seen, vec!["visible"]);

        let mut expr = expr;
        let mut subs = 0;
        for_each_subcommand_mut(&mut expr, &mut |_| subs += 1);
        assert_eq!(subs, 1);
    }
}
