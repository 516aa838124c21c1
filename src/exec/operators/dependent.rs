//! Dependent-criteria parameter binding.
//!
//! Before a correlated sub-plan runs for one input row, its dependent
//! criteria are walked clause by clause and every recognized clause binds
//! a named parameter from the row. A contradiction between clauses or a
//! null bound into a null-rejecting parameter invalidates the *row*, it
//! is not an error. Defaults fill in still-unbound parameters last, and
//! the resulting bindings are published into the execution's variable
//! context.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{ExecResult, QueryError};
use crate::exec::context::CommandContext;
use crate::exec::data::SharedDataManager;
use crate::exec::eval::Evaluator;
use crate::exec::operator::Poll;
use crate::exec::value::Value;
use crate::sql::{visitor, CompareOp, ElementSymbol, Expression};

/// A parameter the dependent criteria may bind.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    /// The parameter's name, matched case-insensitively against element
    /// short names in the criteria.
    pub name: String,
    /// Whether a null binding is acceptable.
    pub allows_null: bool,
    /// Value used when no clause binds the parameter.
    pub default_value: Option<Value>,
}

impl ParameterInfo {
    /// A required, null-rejecting parameter.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self { name: name.into(), allows_null: false, default_value: None }
    }

    /// Allows null bindings.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.allows_null = true;
        self
    }

    /// Sets the fallback value applied after all clauses.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Walks dependent criteria and binds parameters for one input row.
///
/// The clause cursor is an instance field, so a blocked evaluation (a
/// code-table lookup mid-load) resumes at the same clause on retry.
pub struct DependentCriteriaProcessor {
    clauses: Vec<Expression>,
    parameters: Vec<ParameterInfo>,
    /// Positions of input-row elements; elements not present here are
    /// parameter candidates.
    elements: HashMap<ElementSymbol, usize>,
    data_manager: Option<SharedDataManager>,
    clause_idx: usize,
    bindings: HashMap<String, Value>,
}

impl DependentCriteriaProcessor {
    /// Creates a processor for `criteria` over the given parameters.
    #[must_use]
    pub fn new(
        criteria: &Expression,
        parameters: Vec<ParameterInfo>,
        elements: HashMap<ElementSymbol, usize>,
        data_manager: Option<SharedDataManager>,
    ) -> Self {
        Self {
            clauses: criteria.split_and().into_iter().cloned().collect(),
            parameters,
            elements,
            data_manager,
            clause_idx: 0,
            bindings: HashMap::new(),
        }
    }

    /// Binds parameters for `row`, publishing them into `context`.
    ///
    /// Returns `Ready(true)` when the row is valid, `Ready(false)` when
    /// the clauses contradict each other or reject a null, and `Blocked`
    /// when a clause's evaluation is waiting on a resource. The input row
    /// is never modified.
    pub fn prepare(
        &mut self,
        row: &[Value],
        context: &CommandContext,
    ) -> ExecResult<Poll<bool>> {
        if self.clause_idx == 0 {
            self.bindings.clear();
        }

        while self.clause_idx < self.clauses.len() {
            let clause = self.clauses[self.clause_idx].clone();
            match self.apply_clause(&clause, row, context)? {
                Poll::Blocked => return Ok(Poll::Blocked),
                Poll::Ready(true) => self.clause_idx += 1,
                Poll::Ready(false) => {
                    trace!(clause = %clause, "dependent clause invalidated the row");
                    self.clause_idx = 0;
                    return Ok(Poll::Ready(false));
                }
            }
        }
        self.clause_idx = 0;

        // Defaults last, so explicit bindings always win.
        for param in &self.parameters {
            if !self.bindings.contains_key(&param.name) {
                if let Some(default) = &param.default_value {
                    self.bindings.insert(param.name.clone(), default.clone());
                }
            }
        }

        let bindings = self.bindings.clone();
        context.with_variables(|vars| {
            vars.clear_frame();
            for (name, value) in bindings {
                vars.set_value(name, value);
            }
        });
        Ok(Poll::Ready(true))
    }

    /// Applies one clause: `Ready(true)` to continue, `Ready(false)` to
    /// invalidate the row.
    fn apply_clause(
        &mut self,
        clause: &Expression,
        row: &[Value],
        context: &CommandContext,
    ) -> ExecResult<Poll<bool>> {
        match clause.underlying() {
            Expression::Compare { op: CompareOp::Eq, left, right } => {
                if let Some(param) = self.parameter_of(left) {
                    return self.bind_evaluated(&param, right, row, context);
                }
                if let Some(param) = self.parameter_of(right) {
                    return self.bind_evaluated(&param, left, row, context);
                }
            }
            Expression::IsNull { expr, negated: false } => {
                if let Some(param) = self.parameter_of(expr) {
                    return Ok(Poll::Ready(self.bind(&param, Value::Null)));
                }
            }
            _ => {}
        }

        // Not a binding form. A clause that still touches a parameter
        // cannot be honored; anything else is left for the sub-plan.
        if self.references_parameter(clause) {
            return Err(QueryError::UnsupportedClause(clause.to_string()));
        }
        Ok(Poll::Ready(true))
    }

    fn bind_evaluated(
        &mut self,
        param: &ParameterInfo,
        expr: &Expression,
        row: &[Value],
        context: &CommandContext,
    ) -> ExecResult<Poll<bool>> {
        if self.references_parameter(expr) {
            return Err(QueryError::UnsupportedClause(expr.to_string()));
        }
        let mut evaluator =
            Evaluator::new(row, &self.elements, context, self.data_manager.as_ref());
        match evaluator.evaluate(expr)? {
            Poll::Blocked => Ok(Poll::Blocked),
            // A comparison against null can never hold; only an IS NULL
            // clause binds a null.
            Poll::Ready(Value::Null) => Ok(Poll::Ready(false)),
            Poll::Ready(value) => Ok(Poll::Ready(self.bind(param, value))),
        }
    }

    /// Records a binding; `false` invalidates the row.
    fn bind(&mut self, param: &ParameterInfo, value: Value) -> bool {
        if value.is_null() && !param.allows_null {
            return false;
        }
        if let Some(existing) = self.bindings.get(&param.name) {
            // Two clauses binding the same parameter must agree.
            let consistent = existing == &value || existing.equals(&value) == Some(true);
            return consistent;
        }
        self.bindings.insert(param.name.clone(), value);
        true
    }

    /// Resolves `expr` to a parameter, when it is a bare element naming
    /// one and not a column of the input row.
    fn parameter_of(&self, expr: &Expression) -> Option<ParameterInfo> {
        if let Expression::Element(element) = expr.underlying() {
            if !self.elements.contains_key(element) {
                return self
                    .parameters
                    .iter()
                    .find(|p| p.name.eq_ignore_ascii_case(element.short_name()))
                    .cloned();
            }
        }
        None
    }

    fn references_parameter(&self, expr: &Expression) -> bool {
        let mut found = false;
        visitor::for_each_element(expr, &mut |element| {
            if !self.elements.contains_key(element)
                && self
                    .parameters
                    .iter()
                    .any(|p| p.name.eq_ignore_ascii_case(element.short_name()))
            {
                found = true;
            }
        });
        found
    }
}
