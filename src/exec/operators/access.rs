//! The source-access leaf operator.
//!
//! Registers its push-down command with the data manager at open and
//! adapts the resulting tuple source into processor-sized batches. Rows
//! already pulled are buffered across a blocked source, so a retry never
//! re-reads or drops rows.

use tracing::debug;

use crate::error::{ExecResult, QueryError};
use crate::exec::batch::TupleBatch;
use crate::exec::context::CommandContext;
use crate::exec::data::{SharedDataManager, TupleSource};
use crate::exec::operator::{BatchResult, OperatorBase, OperatorState, Poll, RelationalNode};
use crate::exec::value::Value;
use crate::plan::NodeId;
use crate::sql::Command;

/// Leaf operator delivering rows from one external source.
pub struct AccessOperator {
    base: OperatorBase,
    command: Command,
    source_name: String,
    node_id: NodeId,
    binding_id: Option<u64>,
    data_manager: SharedDataManager,
    source: Option<Box<dyn TupleSource>>,
    batch_size: usize,
    /// Rows pulled but not yet emitted; survives a blocked source.
    pending: Vec<Vec<Value>>,
    exhausted: bool,
    context: Option<CommandContext>,
}

impl AccessOperator {
    /// Creates an access operator for `command` against `source_name`.
    #[must_use]
    pub fn new(
        command: Command,
        source_name: impl Into<String>,
        node_id: NodeId,
        data_manager: SharedDataManager,
    ) -> Self {
        Self {
            base: OperatorBase::new(),
            command,
            source_name: source_name.into(),
            node_id,
            binding_id: None,
            data_manager,
            source: None,
            batch_size: 0,
            pending: Vec::new(),
            exhausted: false,
            context: None,
        }
    }

    /// Sets the dependent-join binding id used when re-registering this
    /// node's request per outer row.
    #[must_use]
    pub const fn with_binding(mut self, binding_id: u64) -> Self {
        self.binding_id = Some(binding_id);
        self
    }

    fn check_cancelled(&self) -> ExecResult<()> {
        if self.context.as_ref().is_some_and(CommandContext::is_cancelled) {
            Err(QueryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl RelationalNode for AccessOperator {
    fn open(&mut self, context: &CommandContext) -> ExecResult<()> {
        if self.base.state() == OperatorState::Open {
            return Ok(());
        }
        let source = {
            #[allow(clippy::expect_used)]
            let mut dm = self.data_manager.lock().expect("data manager poisoned");
            dm.register_request(
                context.processor_id(),
                &self.command,
                &self.source_name,
                self.binding_id,
                self.node_id,
            )?
        };
        debug!(source = %self.source_name, node = self.node_id.0, "registered source request");
        self.source = Some(source);
        self.batch_size = context.batch_size();
        self.pending.clear();
        self.exhausted = false;
        self.context = Some(context.clone());
        self.base.set_open();
        Ok(())
    }

    fn next_batch(&mut self) -> BatchResult {
        self.base.require_open("next_batch")?;
        self.check_cancelled()?;

        if self.exhausted {
            let begin = self.base.claim_rows(0);
            return Ok(Poll::Ready(TupleBatch::empty(begin).terminated()));
        }

        let source = self
            .source
            .as_mut()
            .ok_or_else(|| QueryError::InvalidState("open access operator has no source".into()))?;

        while self.pending.len() < self.batch_size {
            match source.next_tuple()? {
                Poll::Ready(Some(row)) => self.pending.push(row),
                Poll::Ready(None) => {
                    self.exhausted = true;
                    break;
                }
                Poll::Blocked => return Ok(Poll::Blocked),
            }
        }

        let rows = std::mem::take(&mut self.pending);
        let begin = self.base.claim_rows(rows.len());
        let mut batch = TupleBatch::new(begin, rows);
        batch.set_terminated(self.exhausted);
        Ok(Poll::Ready(batch))
    }

    fn close(&mut self) -> ExecResult<()> {
        if self.base.state() == OperatorState::Closed {
            return Ok(());
        }
        if let Some(source) = self.source.as_mut() {
            source.close_source();
        }
        self.source = None;
        self.pending.clear();
        self.base.set_closed();
        Ok(())
    }

    fn reset(&mut self) -> ExecResult<()> {
        self.base.require_not_open("reset")?;
        self.base.reset();
        self.source = None;
        self.pending.clear();
        self.exhausted = false;
        self.context = None;
        Ok(())
    }

    fn try_clone(&self) -> ExecResult<Box<dyn RelationalNode>> {
        self.base.require_not_open("clone")?;
        let mut clone = Self::new(
            self.command.clone(),
            self.source_name.clone(),
            self.node_id,
            self.data_manager.clone(),
        );
        clone.binding_id = self.binding_id;
        Ok(Box::new(clone))
    }

    fn state(&self) -> OperatorState {
        self.base.state()
    }

    fn name(&self) -> &'static str {
        "Access"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::exec::data::testing::FakeDataManager;
    use crate::sql::{From, FromClause, GroupSymbol, Query, Select};

    fn select_star(source: &str) -> Command {
        Command::Query(Query::new(
            Select::new(Vec::new()),
            Some(From { clauses: vec![FromClause::Group(GroupSymbol::new(source))] }),
        ))
    }

    fn manager_with_rows(rows: Vec<Vec<Value>>) -> SharedDataManager {
        Arc::new(Mutex::new(FakeDataManager::new().with_source("parts", rows)))
    }

    #[test]
    fn batches_follow_the_context_batch_size() {
        let rows: Vec<Vec<Value>> = (1..=5).map(|v| vec![Value::Integer(v)]).collect();
        let mut op =
            AccessOperator::new(select_star("parts"), "parts", NodeId(1), manager_with_rows(rows));
        let ctx = CommandContext::new(1).with_batch_size(2);
        op.open(&ctx).unwrap();

        let first = op.next_batch().unwrap().unwrap_ready();
        assert_eq!(first.begin_row(), 1);
        assert_eq!(first.row_count(), 2);
        assert!(!first.is_terminated());

        let second = op.next_batch().unwrap().unwrap_ready();
        assert_eq!(second.begin_row(), 3);
        let third = op.next_batch().unwrap().unwrap_ready();
        assert_eq!(third.begin_row(), 5);
        assert_eq!(third.row_count(), 1);
        assert!(third.is_terminated());
    }

    #[test]
    fn delivers_registered_source_rows() {
        let dm = manager_with_rows(vec![vec![Value::Integer(1)]]);
        let mut op = AccessOperator::new(select_star("parts"), "parts", NodeId(3), dm);
        op.open(&CommandContext::new(9)).unwrap();

        let batch = op.next_batch().unwrap().unwrap_ready();
        assert_eq!(batch.rows(), &[vec![Value::Integer(1)]]);
        assert!(batch.is_terminated());
    }

    #[test]
    fn cancellation_surfaces_as_an_error() {
        let dm = manager_with_rows(vec![vec![Value::Integer(1)]]);
        let mut op = AccessOperator::new(select_star("parts"), "parts", NodeId(1), dm);
        let ctx = CommandContext::new(1);
        op.open(&ctx).unwrap();

        ctx.cancel();
        let err = op.next_batch().unwrap_err();
        assert!(matches!(err, QueryError::Cancelled));
        assert!(err.is_processing());
    }

    #[test]
    fn unknown_source_fails_open() {
        let dm: SharedDataManager = Arc::new(Mutex::new(FakeDataManager::new()));
        let mut op = AccessOperator::new(select_star("missing"), "missing", NodeId(1), dm);
        let err = op.open(&CommandContext::new(1)).unwrap_err();
        assert!(err.is_component());
        assert_eq!(op.state(), OperatorState::Created);
    }
}
