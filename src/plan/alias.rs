//! The alias/naming rewriter.
//!
//! [`AliasGenerator`] walks a resolved command and assigns collision-free
//! generated aliases so the command can be serialized to push-down
//! dialects safely: groups become `g_<n>` (physical sources) or `v_<n>`
//! (derived/virtual), columns become positional `c_<i>` aliases whenever
//! the enclosing scope requires guaranteed-safe aliasing (ORDER BY,
//! LIMIT, a set-operation branch, or a nested scope).
//!
//! Only the output-facing fields of symbols are mutated, so identity and
//! lookup by original name stay stable for the whole pass. The rewrite is
//! total over any syntactically resolved command: malformed input is a
//! caller bug, not a recoverable error.

use std::collections::{HashMap, HashSet};
use std::mem;

use tracing::debug;

use crate::sql::visitor::{for_each_element_mut, for_each_subcommand_mut};
use crate::sql::{Command, Expression, FromClause, Query, SetQuery};

/// Assigns generated aliases across one resolved command tree.
///
/// Counters are monotonically increasing across the whole rewrite, so no
/// two groups anywhere in the command share an output alias.
#[derive(Debug, Default)]
pub struct AliasGenerator {
    group_counter: u32,
    view_counter: u32,
}

/// One naming scope: the alias maps of a single SELECT.
#[derive(Debug, Default)]
struct Scope {
    /// Canonical group name to generated group alias.
    group_aliases: HashMap<String, String>,
}

/// The hierarchical naming context.
///
/// A nested scope can look up but never mutate its parent's maps:
/// recording always targets the innermost scope while lookup walks
/// outward.
#[derive(Debug, Default)]
struct NamingContext {
    scopes: Vec<Scope>,
}

impl NamingContext {
    fn push(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn record_group(&mut self, canonical: String, alias: String) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.group_aliases.insert(canonical, alias);
        }
    }

    fn group_alias(&self, canonical: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.group_aliases.get(canonical).map(String::as_str))
    }
}

impl AliasGenerator {
    /// Creates a generator with fresh counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites a command in place with a fresh generator.
    pub fn rewrite(command: &mut Command) {
        Self::new().run(command);
    }

    /// Rewrites a command in place.
    pub fn run(&mut self, command: &mut Command) {
        let mut ctx = NamingContext::default();
        self.visit_command(command, &mut ctx, false);
        debug!(
            groups = self.group_counter,
            views = self.view_counter,
            "alias rewrite complete"
        );
    }

    fn next_group_alias(&mut self) -> String {
        let alias = format!("g_{}", self.group_counter);
        self.group_counter += 1;
        alias
    }

    fn next_view_alias(&mut self) -> String {
        let alias = format!("v_{}", self.view_counter);
        self.view_counter += 1;
        alias
    }

    /// Visits one command. `nested` marks scopes that require guaranteed
    /// safe column aliasing regardless of their own clauses: subqueries
    /// and set-operation branches.
    fn visit_command(
        &mut self,
        command: &mut Command,
        ctx: &mut NamingContext,
        nested: bool,
    ) -> HashMap<String, String> {
        match command {
            Command::Query(query) => self.visit_query(query, ctx, nested),
            Command::SetQuery(set_query) => self.visit_set_query(set_query, ctx),
        }
    }

    fn visit_set_query(
        &mut self,
        set_query: &mut SetQuery,
        ctx: &mut NamingContext,
    ) -> HashMap<String, String> {
        // Set-operation branches always require safe aliasing.
        let left_aliases = self.visit_command(&mut set_query.left, ctx, true);
        self.visit_command(&mut set_query.right, ctx, true);

        // ORDER BY on the combined result correlates to the left branch's
        // output names.
        if let Some(order_by) = &mut set_query.order_by {
            for item in &mut order_by.items {
                use_existing_alias(&mut item.expr, &left_aliases);
            }
        }
        left_aliases
    }

    fn visit_query(
        &mut self,
        query: &mut Query,
        ctx: &mut NamingContext,
        nested: bool,
    ) -> HashMap<String, String> {
        let needs_column_aliases = nested || query.order_by.is_some() || query.limit.is_some();

        ctx.push();

        // Group aliasing happens before column aliasing so that a column's
        // qualified name always resolves against the already-rewritten
        // group.
        if let Some(from) = &mut query.from {
            for clause in &mut from.clauses {
                self.visit_from_clause(clause, ctx);
            }
        }

        if let Some(criteria) = &mut query.criteria {
            self.rewrite_expression(criteria, ctx);
        }
        for expr in &mut query.group_by {
            self.rewrite_expression(expr, ctx);
        }
        if let Some(having) = &mut query.having {
            self.rewrite_expression(having, ctx);
        }

        // Columns are aliased by position within their SELECT list, not by
        // name, so duplicate output names are never produced.
        let mut used: HashSet<String> = HashSet::new();
        let mut select_aliases: HashMap<String, String> = HashMap::new();
        for (position, item) in query.select.symbols.iter_mut().enumerate() {
            self.rewrite_expression(item, ctx);

            let current = item.output_name().to_string();
            let canonical = current.to_ascii_lowercase();

            let final_name = if needs_column_aliases {
                // A pass-through column from a temporary/generated source
                // keeps its alias when that alias is already unique.
                let passthrough_ok = matches!(
                    item,
                    Expression::Element(e) if e.group().is_temp()
                ) && !used.contains(&canonical);
                if passthrough_ok {
                    current.clone()
                } else {
                    format!("c_{position}")
                }
            } else if used.contains(&canonical) {
                format!("c_{position}")
            } else {
                current.clone()
            };

            used.insert(final_name.to_ascii_lowercase());
            select_aliases.insert(canonical, final_name.clone());
            if final_name != current {
                apply_output_name(item, &final_name);
            }
        }

        // ORDER BY items correlate to the nearest enclosing SELECT list by
        // name; an existing alias is used but never forced anew.
        if let Some(order_by) = &mut query.order_by {
            for item in &mut order_by.items {
                if !use_existing_alias(&mut item.expr, &select_aliases) {
                    self.rewrite_expression(&mut item.expr, ctx);
                }
            }
        }

        ctx.pop();
        select_aliases
    }

    fn visit_from_clause(&mut self, clause: &mut FromClause, ctx: &mut NamingContext) {
        match clause {
            FromClause::Group(group) => {
                let alias = if group.is_virtual() {
                    self.next_view_alias()
                } else {
                    self.next_group_alias()
                };
                ctx.record_group(group.canonical_name().to_string(), alias.clone());
                let definition =
                    group.definition().unwrap_or_else(|| group.name()).to_string();
                group.set_output_definition(definition);
                group.set_output_name(alias);
            }
            FromClause::Subquery { group, command } => {
                let alias = self.next_view_alias();
                ctx.record_group(group.canonical_name().to_string(), alias.clone());
                group.set_output_name(alias);
                self.visit_command(command, ctx, true);
            }
            FromClause::Join { left, right, criteria, .. } => {
                self.visit_from_clause(left, ctx);
                self.visit_from_clause(right, ctx);
                for criterion in criteria {
                    self.rewrite_expression(criterion, ctx);
                }
            }
        }
    }

    /// Qualifies every element reference against the rewritten group
    /// aliases, then descends into any nested commands as child scopes.
    fn rewrite_expression(&mut self, expr: &mut Expression, ctx: &mut NamingContext) {
        for_each_element_mut(expr, &mut |element| {
            if let Some(alias) = ctx.group_alias(element.group().canonical_name()) {
                let alias = alias.to_string();
                element.group_mut().set_output_name(alias);
            }
        });
        for_each_subcommand_mut(expr, &mut |command| {
            self.visit_command(command, ctx, true);
        });
    }
}

/// Applies a final output name to a SELECT item.
fn apply_output_name(item: &mut Expression, name: &str) {
    match item {
        Expression::Element(element) => element.set_output_name(name),
        Expression::Alias { name: declared, .. } => *declared = name.to_string(),
        other => {
            let inner = mem::replace(other, Expression::Constant(crate::exec::Value::Null));
            *other = Expression::Alias { name: name.to_string(), expr: Box::new(inner) };
        }
    }
}

/// Points an ORDER BY item at an existing select alias, if one matches by
/// name. Returns whether a match was found.
fn use_existing_alias(expr: &mut Expression, select_aliases: &HashMap<String, String>) -> bool {
    if let Expression::Element(element) = expr {
        let key = element.output_name().to_ascii_lowercase();
        let short = element.short_name().to_ascii_lowercase();
        if let Some(alias) = select_aliases.get(&key).or_else(|| select_aliases.get(&short)) {
            if alias != element.output_name() {
                let alias = alias.clone();
                element.set_output_name(alias);
            }
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Value;
    use crate::sql::{
        ElementSymbol, From, GroupSymbol, Limit, OrderBy, OrderByItem, Select, SetOpKind, SetQuery,
    };

    fn elem(group: &GroupSymbol, name: &str) -> Expression {
        Expression::Element(ElementSymbol::new(group.clone(), name))
    }

    fn simple_query(group: GroupSymbol, columns: &[&str]) -> Query {
        Query::new(
            Select::new(columns.iter().map(|c| elem(&group, c)).collect()),
            Some(From { clauses: vec![FromClause::Group(group)] }),
        )
    }

    #[test]
    fn plain_scope_keeps_short_names() {
        let group = GroupSymbol::new("parts");
        let mut command = Command::Query(simple_query(group, &["id", "name"]));

        AliasGenerator::rewrite(&mut command);
        assert_eq!(command.to_string(), "SELECT g_0.id, g_0.name FROM parts AS g_0");
    }

    #[test]
    fn order_by_scope_gets_positional_column_aliases() {
        let group = GroupSymbol::new("parts");
        let mut query = simple_query(group.clone(), &["id", "name"]);
        query.order_by = Some(OrderBy {
            items: vec![OrderByItem { expr: elem(&group, "name"), ascending: true }],
        });
        let mut command = Command::Query(query);

        AliasGenerator::rewrite(&mut command);
        assert_eq!(
            command.to_string(),
            "SELECT g_0.id AS c_0, g_0.name AS c_1 FROM parts AS g_0 ORDER BY c_1"
        );
    }

    #[test]
    fn limit_scope_forces_aliasing() {
        let group = GroupSymbol::new("t");
        let mut query = simple_query(group, &["a"]);
        query.limit =
            Some(Limit { row_limit: Some(Expression::Constant(Value::Integer(3))), offset: None });
        let mut command = Command::Query(query);

        AliasGenerator::rewrite(&mut command);
        assert_eq!(command.to_string(), "SELECT g_0.a AS c_0 FROM t AS g_0 LIMIT 3");
    }

    #[test]
    fn duplicate_output_names_never_produced() {
        let left = GroupSymbol::new("a");
        let right = GroupSymbol::new("b");
        let query = Query::new(
            Select::new(vec![elem(&left, "id"), elem(&right, "id")]),
            Some(From {
                clauses: vec![FromClause::Group(left), FromClause::Group(right)],
            }),
        );
        let mut command = Command::Query(query);

        AliasGenerator::rewrite(&mut command);
        let Command::Query(query) = &command else { panic!("still a query") };
        let names: Vec<&str> =
            query.select.symbols.iter().map(Expression::output_name).collect();
        assert_eq!(names, vec!["id", "c_1"]);
    }

    #[test]
    fn subquery_is_a_nested_scope_with_view_alias() {
        let inner_group = GroupSymbol::new("parts");
        let inner = Command::Query(simple_query(inner_group, &["id"]));

        let view = GroupSymbol::virtual_group("sub");
        let query = Query::new(
            Select::new(vec![elem(&view, "id")]),
            Some(From {
                clauses: vec![FromClause::Subquery {
                    group: view,
                    command: Box::new(inner),
                }],
            }),
        );
        let mut command = Command::Query(query);

        AliasGenerator::rewrite(&mut command);
        assert_eq!(
            command.to_string(),
            "SELECT v_0.id FROM (SELECT g_0.id AS c_0 FROM parts AS g_0) AS v_0"
        );
    }

    #[test]
    fn group_counters_are_monotone_across_scopes() {
        let a = GroupSymbol::new("a");
        let b = GroupSymbol::new("b");
        let inner = Command::Query(simple_query(b, &["x"]));
        let view = GroupSymbol::virtual_group("sub");
        let query = Query::new(
            Select::new(vec![elem(&a, "x")]),
            Some(From {
                clauses: vec![
                    FromClause::Group(a.clone()),
                    FromClause::Subquery { group: view, command: Box::new(inner) },
                ],
            }),
        );
        let mut command = Command::Query(query);

        AliasGenerator::rewrite(&mut command);
        let rendered = command.to_string();
        // One physical alias per physical group, never reused.
        assert!(rendered.contains("a AS g_0"));
        assert!(rendered.contains("b AS g_1"));
        assert!(rendered.contains("AS v_0"));
    }

    #[test]
    fn set_query_branches_are_force_aliased() {
        let left = Command::Query(simple_query(GroupSymbol::new("a"), &["x"]));
        let right = Command::Query(simple_query(GroupSymbol::new("b"), &["y"]));
        let mut command = Command::SetQuery(SetQuery {
            op: SetOpKind::Union,
            all: true,
            left: Box::new(left),
            right: Box::new(right),
            order_by: Some(OrderBy {
                items: vec![OrderByItem {
                    expr: elem(&GroupSymbol::new("a"), "x"),
                    ascending: true,
                }],
            }),
            limit: None,
        });

        AliasGenerator::rewrite(&mut command);
        assert_eq!(
            command.to_string(),
            "SELECT g_0.x AS c_0 FROM a AS g_0 UNION ALL SELECT g_1.y AS c_0 FROM b AS g_1 \
             ORDER BY c_0"
        );
    }

    #[test]
    fn where_clause_elements_are_qualified() {
        let group = GroupSymbol::new("parts");
        let mut query = simple_query(group.clone(), &["id"]);
        query.criteria = Some(Expression::eq(
            elem(&group, "color"),
            Expression::Constant(Value::from("red")),
        ));
        let mut command = Command::Query(query);

        AliasGenerator::rewrite(&mut command);
        assert_eq!(
            command.to_string(),
            "SELECT g_0.id FROM parts AS g_0 WHERE g_0.color = 'red'"
        );
    }

    #[test]
    fn temp_passthrough_alias_is_stable() {
        let temp = GroupSymbol::temp_group("tmp");
        let mut query = simple_query(temp.clone(), &["val"]);
        query.order_by = Some(OrderBy {
            items: vec![OrderByItem { expr: elem(&temp, "val"), ascending: true }],
        });
        let mut command = Command::Query(query);

        AliasGenerator::rewrite(&mut command);
        let first = command.to_string();
        // A unique pass-through column from a generated source keeps its
        // name even in a safe-aliasing scope.
        assert_eq!(first, "SELECT g_0.val FROM tmp AS g_0 ORDER BY val");

        // Re-running the rewrite leaves output names unchanged.
        AliasGenerator::rewrite(&mut command);
        assert_eq!(command.to_string(), first);
    }

    #[test]
    fn rewrite_is_idempotent_for_aliased_scopes() {
        let group = GroupSymbol::new("parts");
        let mut query = simple_query(group.clone(), &["id"]);
        query.order_by = Some(OrderBy {
            items: vec![OrderByItem { expr: elem(&group, "id"), ascending: false }],
        });
        let mut command = Command::Query(query);

        AliasGenerator::rewrite(&mut command);
        let first = command.to_string();
        AliasGenerator::rewrite(&mut command);
        assert_eq!(command.to_string(), first);
    }
}
