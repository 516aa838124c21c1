//! The row-limit/offset operator.
//!
//! Consumes child batches, drops the first *offset* rows (possibly
//! spanning several child batches), then emits at most *limit* rows,
//! renumbering the output 1-based and contiguous. The termination flag is
//! set exactly on the batch that reaches the limit, exhausts the child,
//! or (offset-only mode) when the child terminates.

use tracing::debug;

use crate::error::{ExecResult, QueryError};
use crate::exec::batch::TupleBatch;
use crate::exec::context::CommandContext;
use crate::exec::operator::{
    BatchResult, BoxedNode, OperatorBase, OperatorState, Poll, RelationalNode,
};
use crate::exec::value::Value;
use crate::sql::Expression;

/// Progress of the row-window state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LimitPhase {
    SkippingOffset,
    EmittingLimit,
    Done,
}

/// Row-window operator implementing LIMIT/OFFSET semantics.
///
/// Absent or negative limit/offset expressions denote "no limit" /
/// "no offset" respectively, never errors. A limit of 0 still produces
/// one terminating empty batch rather than no batch at all.
pub struct LimitOperator {
    base: OperatorBase,
    child: BoxedNode,
    limit_expr: Option<Expression>,
    offset_expr: Option<Expression>,
    /// Resolved at open; `None` means unlimited.
    limit: Option<u64>,
    /// Remaining rows to drop. Held in a field so a blocked child resumes
    /// with no loss of progress.
    to_skip: u64,
    emitted: u64,
    phase: LimitPhase,
}

impl LimitOperator {
    /// Creates a row-window operator over `child`.
    #[must_use]
    pub fn new(
        child: BoxedNode,
        limit_expr: Option<Expression>,
        offset_expr: Option<Expression>,
    ) -> Self {
        Self {
            base: OperatorBase::new(),
            child,
            limit_expr,
            offset_expr,
            limit: None,
            to_skip: 0,
            emitted: 0,
            phase: LimitPhase::SkippingOffset,
        }
    }

    /// Resolves a limit/offset expression to a row count.
    ///
    /// Only constant integers are legal here; the planner resolves
    /// parameter references before handing the plan over. Negative counts
    /// mean "none".
    fn resolve(expr: Option<&Expression>, what: &str) -> ExecResult<Option<u64>> {
        let Some(expr) = expr else { return Ok(None) };
        match expr.underlying() {
            Expression::Constant(Value::Null) => Ok(None),
            Expression::Constant(value) => {
                let count = value.as_integer().ok_or_else(|| {
                    QueryError::Component(format!("{what} expression is not an integer: {value}"))
                })?;
                Ok(u64::try_from(count).ok())
            }
            other => {
                Err(QueryError::Component(format!("unresolved {what} expression: {other}")))
            }
        }
    }

    /// Numbers and finishes an outgoing batch.
    fn emit(&mut self, rows: Vec<Vec<Value>>, terminal: bool) -> BatchResult {
        let begin = self.base.claim_rows(rows.len());
        self.emitted += rows.len() as u64;
        let mut batch = TupleBatch::new(begin, rows);
        batch.set_terminated(terminal);
        if terminal {
            self.phase = LimitPhase::Done;
        }
        Ok(Poll::Ready(batch))
    }
}

impl RelationalNode for LimitOperator {
    fn open(&mut self, context: &CommandContext) -> ExecResult<()> {
        if self.base.state() == OperatorState::Open {
            return Ok(());
        }
        self.limit = Self::resolve(self.limit_expr.as_ref(), "limit")?;
        self.to_skip = Self::resolve(self.offset_expr.as_ref(), "offset")?.unwrap_or(0);
        self.emitted = 0;
        self.phase = LimitPhase::SkippingOffset;
        self.child.open(context)?;
        self.base.set_open();
        debug!(limit = ?self.limit, offset = self.to_skip, "limit operator open");
        Ok(())
    }

    fn next_batch(&mut self) -> BatchResult {
        self.base.require_open("next_batch")?;

        if self.phase == LimitPhase::Done {
            // The stream already terminated; repeat an empty terminal
            // batch for over-eager drivers.
            let begin = self.base.claim_rows(0);
            return Ok(Poll::Ready(TupleBatch::empty(begin).terminated()));
        }

        // A limit of 0 yields exactly one terminating empty batch without
        // consuming the child.
        if self.limit == Some(0) {
            return self.emit(Vec::new(), true);
        }

        loop {
            let child_batch = match self.child.next_batch()? {
                Poll::Ready(batch) => batch,
                Poll::Blocked => return Ok(Poll::Blocked),
            };
            let child_done = child_batch.is_terminated();
            let mut rows = child_batch.into_rows();

            if self.to_skip > 0 {
                let dropped = rows.len().min(usize::try_from(self.to_skip).unwrap_or(usize::MAX));
                rows.drain(..dropped);
                self.to_skip -= dropped as u64;
                if self.to_skip == 0 {
                    self.phase = LimitPhase::EmittingLimit;
                }
            } else {
                self.phase = LimitPhase::EmittingLimit;
            }

            let mut reached_limit = false;
            if let Some(limit) = self.limit {
                let remaining = limit - self.emitted;
                if rows.len() as u64 >= remaining {
                    rows.truncate(usize::try_from(remaining).unwrap_or(usize::MAX));
                    reached_limit = true;
                }
            }

            if rows.is_empty() && !child_done && !reached_limit {
                // The whole child batch fell inside the offset; keep
                // pulling.
                continue;
            }

            return self.emit(rows, child_done || reached_limit);
        }
    }

    fn close(&mut self) -> ExecResult<()> {
        if self.base.state() == OperatorState::Closed {
            return Ok(());
        }
        self.child.close()?;
        self.base.set_closed();
        Ok(())
    }

    fn reset(&mut self) -> ExecResult<()> {
        self.base.require_not_open("reset")?;
        self.child.reset()?;
        self.base.reset();
        self.limit = None;
        self.to_skip = 0;
        self.emitted = 0;
        self.phase = LimitPhase::SkippingOffset;
        Ok(())
    }

    fn try_clone(&self) -> ExecResult<Box<dyn RelationalNode>> {
        self.base.require_not_open("clone")?;
        Ok(Box::new(Self::new(
            self.child.try_clone()?,
            self.limit_expr.clone(),
            self.offset_expr.clone(),
        )))
    }

    fn state(&self) -> OperatorState {
        self.base.state()
    }

    fn name(&self) -> &'static str {
        "TupleLimit"
    }
}
