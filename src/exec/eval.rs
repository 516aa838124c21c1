//! Runtime expression evaluation.
//!
//! The evaluator resolves an expression against one correlated input row
//! plus the execution's variable context. Code-table lookups go through
//! the data manager and may report [`Poll::Blocked`]; the caller persists
//! its own position and retries.

use std::collections::HashMap;

use crate::error::{ExecResult, QueryError};
use crate::sql::{CompareOp, ElementSymbol, Expression};

use super::context::CommandContext;
use super::data::SharedDataManager;
use super::operator::Poll;
use super::value::Value;

/// The reserved function name for code-table lookups.
pub const LOOKUP_FUNCTION: &str = "lookup";

/// Evaluates expressions against one input row.
pub struct Evaluator<'a> {
    row: &'a [Value],
    /// Positions of the row's elements within the row.
    elements: &'a HashMap<ElementSymbol, usize>,
    context: &'a CommandContext,
    data_manager: Option<&'a SharedDataManager>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator over a row and its element positions.
    #[must_use]
    pub fn new(
        row: &'a [Value],
        elements: &'a HashMap<ElementSymbol, usize>,
        context: &'a CommandContext,
        data_manager: Option<&'a SharedDataManager>,
    ) -> Self {
        Self { row, elements, context, data_manager }
    }

    /// Evaluates an expression to a value, or blocks.
    pub fn evaluate(&mut self, expr: &Expression) -> ExecResult<Poll<Value>> {
        match expr {
            Expression::Constant(v) => Ok(Poll::Ready(v.clone())),
            Expression::Element(element) => self.resolve_element(element).map(Poll::Ready),
            Expression::Alias { expr, .. } => self.evaluate(expr),
            Expression::Function { name, args } => self.evaluate_function(name, args),
            Expression::Compare { op, left, right } => {
                let left = match self.evaluate(left)? {
                    Poll::Ready(v) => v,
                    Poll::Blocked => return Ok(Poll::Blocked),
                };
                let right = match self.evaluate(right)? {
                    Poll::Ready(v) => v,
                    Poll::Blocked => return Ok(Poll::Blocked),
                };
                Ok(Poll::Ready(compare(*op, &left, &right)))
            }
            Expression::IsNull { expr, negated } => {
                let value = match self.evaluate(expr)? {
                    Poll::Ready(v) => v,
                    Poll::Blocked => return Ok(Poll::Blocked),
                };
                Ok(Poll::Ready(Value::Boolean(value.is_null() != *negated)))
            }
            Expression::Not(inner) => {
                let value = match self.evaluate(inner)? {
                    Poll::Ready(v) => v,
                    Poll::Blocked => return Ok(Poll::Blocked),
                };
                Ok(Poll::Ready(match value {
                    Value::Boolean(b) => Value::Boolean(!b),
                    Value::Null => Value::Null,
                    other => {
                        return Err(QueryError::Evaluation(format!(
                            "NOT applied to non-boolean value {other}"
                        )))
                    }
                }))
            }
            Expression::And(parts) => self.evaluate_connective(parts, false),
            Expression::Or(parts) => self.evaluate_connective(parts, true),
            Expression::ScalarSubquery(_) | Expression::Exists(_) => Err(QueryError::Component(
                "nested command evaluation requires a child plan".to_string(),
            )),
        }
    }

    fn resolve_element(&self, element: &ElementSymbol) -> ExecResult<Value> {
        if let Some(&position) = self.elements.get(element) {
            return self.row.get(position).cloned().ok_or_else(|| {
                QueryError::MalformedRow(format!(
                    "row has no column {position} for element {element}"
                ))
            });
        }
        if let Some(value) =
            self.context.with_variables(|vars| vars.get_value(element.short_name()).cloned())
        {
            return Ok(value);
        }
        Err(QueryError::Evaluation(format!("unresolved element {element}")))
    }

    fn evaluate_function(&mut self, name: &str, args: &[Expression]) -> ExecResult<Poll<Value>> {
        if !name.eq_ignore_ascii_case(LOOKUP_FUNCTION) {
            return Err(QueryError::Evaluation(format!("unknown function {name}")));
        }
        if args.len() != 4 {
            return Err(QueryError::Evaluation(format!(
                "lookup takes 4 arguments, got {}",
                args.len()
            )));
        }
        let table = constant_text(&args[0])?;
        let return_column = constant_text(&args[1])?;
        let key_column = constant_text(&args[2])?;
        let key = match self.evaluate(&args[3])? {
            Poll::Ready(v) => v,
            Poll::Blocked => return Ok(Poll::Blocked),
        };

        let Some(data_manager) = self.data_manager else {
            return Err(QueryError::Component(
                "lookup evaluation requires a data manager".to_string(),
            ));
        };
        #[allow(clippy::expect_used)]
        let mut dm = data_manager.lock().expect("data manager poisoned");
        dm.lookup_code_value(self.context, &table, &return_column, &key_column, &key)
    }

    fn evaluate_connective(
        &mut self,
        parts: &[Expression],
        is_or: bool,
    ) -> ExecResult<Poll<Value>> {
        // Three-valued logic: a null operand yields null unless the
        // connective short-circuits.
        let mut saw_null = false;
        for part in parts {
            let value = match self.evaluate(part)? {
                Poll::Ready(v) => v,
                Poll::Blocked => return Ok(Poll::Blocked),
            };
            match value {
                Value::Boolean(b) if b == is_or => return Ok(Poll::Ready(Value::Boolean(is_or))),
                Value::Boolean(_) => {}
                Value::Null => saw_null = true,
                other => {
                    return Err(QueryError::Evaluation(format!(
                        "connective applied to non-boolean value {other}"
                    )))
                }
            }
        }
        if saw_null {
            Ok(Poll::Ready(Value::Null))
        } else {
            Ok(Poll::Ready(Value::Boolean(!is_or)))
        }
    }
}

fn constant_text(expr: &Expression) -> ExecResult<String> {
    match expr.underlying() {
        Expression::Constant(Value::String(s)) => Ok(s.clone()),
        other => Err(QueryError::Evaluation(format!("expected a string constant, got {other}"))),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Value {
    let Some(equal) = left.equals(right) else {
        return Value::Null;
    };
    // Numeric kinds are promoted before ordering.
    #[allow(clippy::cast_precision_loss)]
    let ordering = match (left, right) {
        (Value::Integer(i), Value::Double(d)) => (*i as f64).partial_cmp(d),
        (Value::Double(d), Value::Integer(i)) => d.partial_cmp(&(*i as f64)),
        _ => left.partial_cmp(right),
    };
    let result = match op {
        CompareOp::Eq => equal,
        CompareOp::Ne => !equal,
        CompareOp::Lt => ordering == Some(std::cmp::Ordering::Less),
        CompareOp::Le => equal || ordering == Some(std::cmp::Ordering::Less),
        CompareOp::Gt => ordering == Some(std::cmp::Ordering::Greater),
        CompareOp::Ge => equal || ordering == Some(std::cmp::Ordering::Greater),
    };
    Value::Boolean(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::data::testing::FakeDataManager;
    use crate::sql::GroupSymbol;
    use std::sync::{Arc, Mutex};

    fn element(name: &str) -> ElementSymbol {
        ElementSymbol::new(GroupSymbol::new("t"), name)
    }

    fn single_column_row(name: &str, value: Value) -> (Vec<Value>, HashMap<ElementSymbol, usize>) {
        let mut map = HashMap::new();
        map.insert(element(name), 0);
        (vec![value], map)
    }

    #[test]
    fn resolves_row_elements() {
        let (row, map) = single_column_row("a", Value::Integer(42));
        let ctx = CommandContext::new(1);
        let mut eval = Evaluator::new(&row, &map, &ctx, None);

        let result = eval.evaluate(&Expression::Element(element("a"))).unwrap();
        assert_eq!(result, Poll::Ready(Value::Integer(42)));
    }

    #[test]
    fn comparison_with_null_is_null() {
        let (row, map) = single_column_row("a", Value::Null);
        let ctx = CommandContext::new(1);
        let mut eval = Evaluator::new(&row, &map, &ctx, None);

        let expr = Expression::eq(
            Expression::Element(element("a")),
            Expression::Constant(Value::Integer(1)),
        );
        assert_eq!(eval.evaluate(&expr).unwrap(), Poll::Ready(Value::Null));
    }

    #[test]
    fn is_null_over_null_is_true() {
        let (row, map) = single_column_row("a", Value::Null);
        let ctx = CommandContext::new(1);
        let mut eval = Evaluator::new(&row, &map, &ctx, None);

        let expr = Expression::IsNull {
            expr: Box::new(Expression::Element(element("a"))),
            negated: false,
        };
        assert_eq!(eval.evaluate(&expr).unwrap(), Poll::Ready(Value::Boolean(true)));
    }

    #[test]
    fn lookup_blocks_then_resolves() {
        let dm: SharedDataManager = Arc::new(Mutex::new(
            FakeDataManager::new()
                .with_code_value("codes", "name", "id", Value::Integer(1), Value::from("one"))
                .with_lookup_delays(1),
        ));
        let (row, map) = single_column_row("a", Value::Integer(1));
        let ctx = CommandContext::new(1);
        let mut eval = Evaluator::new(&row, &map, &ctx, Some(&dm));

        let expr = Expression::Function {
            name: LOOKUP_FUNCTION.to_string(),
            args: vec![
                Expression::Constant(Value::from("codes")),
                Expression::Constant(Value::from("name")),
                Expression::Constant(Value::from("id")),
                Expression::Element(element("a")),
            ],
        };

        assert!(eval.evaluate(&expr).unwrap().is_blocked());
        assert_eq!(eval.evaluate(&expr).unwrap(), Poll::Ready(Value::from("one")));
        // The blocked load left a warning behind.
        assert_eq!(ctx.drain_warnings().len(), 1);
    }
}
