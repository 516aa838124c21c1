//! The pull-model operator contract.
//!
//! Operators form a tree mirroring the physical plan. A driver repeatedly
//! calls [`RelationalNode::next_batch`] on the root; any operator whose
//! child or data source is not ready returns [`Poll::Blocked`] instead of
//! blocking the thread, and the driver retries the same call later. All
//! partial progress lives in operator-instance fields, never on a call
//! stack, so the same logical step resumes correctly.

use crate::error::{ExecResult, QueryError};

use super::batch::TupleBatch;
use super::context::CommandContext;

/// The tri-state outcome of a poll-style call.
///
/// `Blocked` is control flow, not an error: it means a downstream
/// resource is not ready and the caller must retry the exact same call
/// later with no loss of state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll<T> {
    /// The call produced a value.
    Ready(T),
    /// A downstream resource is not ready; retry later.
    Blocked,
}

impl<T> Poll<T> {
    /// Whether this is the blocked signal.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }

    /// Maps the ready value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Poll<U> {
        match self {
            Self::Ready(v) => Poll::Ready(f(v)),
            Self::Blocked => Poll::Blocked,
        }
    }

    /// Unwraps the ready value.
    ///
    /// # Panics
    ///
    /// Panics when blocked. Intended for tests and drivers that have
    /// already established readiness.
    #[must_use]
    pub fn unwrap_ready(self) -> T {
        match self {
            Self::Ready(v) => v,
            Self::Blocked => panic!("called unwrap_ready on Poll::Blocked"),
        }
    }
}

/// Result of a `next_batch` call.
pub type BatchResult = Result<Poll<TupleBatch>, QueryError>;

/// The lifecycle state of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// Constructed but not opened.
    Created,
    /// Open and producing batches.
    Open,
    /// Closed; resources released.
    Closed,
}

/// The pull-model execution operator.
///
/// # Lifecycle
///
/// 1. **Created**: after construction (and after `reset`)
/// 2. **Open**: after `open`; `next_batch` may be called
/// 3. **Closed**: after `close`; safe to call at any time, re-entrantly,
///    and releases held resources exactly once
///
/// Cloning is only valid before `open` or after `close`; cloning
/// mid-execution is rejected.
pub trait RelationalNode: Send {
    /// Opens the operator. Idempotent: a second call on an open operator
    /// is a no-op.
    fn open(&mut self, context: &CommandContext) -> ExecResult<()>;

    /// Produces the next batch, or the blocked signal.
    fn next_batch(&mut self) -> BatchResult;

    /// Closes the operator and its children, releasing resources exactly
    /// once. Safe to call at any time, including re-entrantly.
    fn close(&mut self) -> ExecResult<()>;

    /// Resets the operator for a fresh execution. Only valid when not
    /// open.
    fn reset(&mut self) -> ExecResult<()>;

    /// Clones the operator for pre-open reuse.
    ///
    /// # Errors
    ///
    /// Rejected with [`QueryError::InvalidState`] while the operator is
    /// open.
    fn try_clone(&self) -> ExecResult<Box<dyn RelationalNode>>;

    /// The current lifecycle state.
    fn state(&self) -> OperatorState;

    /// The name of this operator type.
    fn name(&self) -> &'static str;
}

impl core::fmt::Debug for dyn RelationalNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct(self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// A boxed operator for dynamic dispatch.
pub type BoxedNode = Box<dyn RelationalNode>;

/// Common bookkeeping shared by operator implementations: lifecycle
/// state, output row numbering, and a produced-rows counter.
#[derive(Debug, Clone)]
pub struct OperatorBase {
    state: OperatorState,
    next_begin_row: u64,
    rows_produced: u64,
}

impl Default for OperatorBase {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorBase {
    /// Creates bookkeeping in the created state.
    #[must_use]
    pub const fn new() -> Self {
        Self { state: OperatorState::Created, next_begin_row: 1, rows_produced: 0 }
    }

    /// The current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> OperatorState {
        self.state
    }

    /// Marks the operator open.
    pub fn set_open(&mut self) {
        self.state = OperatorState::Open;
    }

    /// Marks the operator closed.
    pub fn set_closed(&mut self) {
        self.state = OperatorState::Closed;
    }

    /// Returns to the created state for a fresh execution.
    pub fn reset(&mut self) {
        self.state = OperatorState::Created;
        self.next_begin_row = 1;
        self.rows_produced = 0;
    }

    /// Guards an operation that is only legal while open.
    pub fn require_open(&self, what: &str) -> ExecResult<()> {
        if self.state == OperatorState::Open {
            Ok(())
        } else {
            Err(QueryError::InvalidState(format!("{what} on a {:?} operator", self.state)))
        }
    }

    /// Guards cloning and resetting, which are illegal mid-execution.
    pub fn require_not_open(&self, what: &str) -> ExecResult<()> {
        if self.state == OperatorState::Open {
            Err(QueryError::InvalidState(format!("{what} on an open operator")))
        } else {
            Ok(())
        }
    }

    /// Numbers an outgoing batch: returns its 1-based begin row and
    /// advances the window by `count` rows.
    pub fn claim_rows(&mut self, count: usize) -> u64 {
        let begin = self.next_begin_row;
        self.next_begin_row += count as u64;
        self.rows_produced += count as u64;
        begin
    }

    /// Total rows produced since open/reset.
    #[must_use]
    pub const fn rows_produced(&self) -> u64 {
        self.rows_produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_map_and_blocked() {
        let ready: Poll<i32> = Poll::Ready(2);
        assert_eq!(ready.map(|v| v * 2), Poll::Ready(4));
        assert!(Poll::<i32>::Blocked.is_blocked());
        assert!(Poll::<i32>::Blocked.map(|v| v).is_blocked());
    }

    #[test]
    fn base_row_numbering_is_contiguous() {
        let mut base = OperatorBase::new();
        base.set_open();
        assert_eq!(base.claim_rows(50), 1);
        assert_eq!(base.claim_rows(50), 51);
        assert_eq!(base.claim_rows(0), 101);
        assert_eq!(base.rows_produced(), 100);
    }

    #[test]
    fn guards() {
        let mut base = OperatorBase::new();
        assert!(base.require_not_open("clone").is_ok());
        base.set_open();
        assert!(base.require_open("next_batch").is_ok());
        assert!(base.require_not_open("clone").is_err());
        base.set_closed();
        assert!(base.require_not_open("clone").is_ok());
        assert!(base.require_open("next_batch").is_err());
    }
}
