//! The relational operator implementations.

mod access;
mod dependent;
mod limit;
mod value_iter;

pub use access::AccessOperator;
pub use dependent::{DependentCriteriaProcessor, ParameterInfo};
pub use limit::LimitOperator;
pub use value_iter::ValueIterator;

/// Test support: an in-memory operator over fixed rows.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use crate::error::ExecResult;
    use crate::exec::batch::TupleBatch;
    use crate::exec::context::CommandContext;
    use crate::exec::operator::{
        BatchResult, OperatorBase, OperatorState, Poll, RelationalNode,
    };
    use crate::exec::value::Value;

    /// A leaf operator that serves a fixed row set in fixed-size batches,
    /// optionally reporting blocked at scheduled `next_batch` calls.
    pub struct FixedBatchNode {
        base: OperatorBase,
        rows: Vec<Vec<Value>>,
        batch_size: usize,
        position: usize,
        /// 0-based `next_batch` call indices that report blocked.
        block_at: VecDeque<usize>,
        calls: usize,
    }

    impl FixedBatchNode {
        pub fn new(rows: Vec<Vec<Value>>, batch_size: usize) -> Self {
            Self {
                base: OperatorBase::new(),
                rows,
                batch_size: batch_size.max(1),
                position: 0,
                block_at: VecDeque::new(),
                calls: 0,
            }
        }

        pub fn with_blocks(mut self, call_indices: Vec<usize>) -> Self {
            self.block_at = call_indices.into();
            self
        }
    }

    impl RelationalNode for FixedBatchNode {
        fn open(&mut self, _context: &CommandContext) -> ExecResult<()> {
            self.base.set_open();
            Ok(())
        }

        fn next_batch(&mut self) -> BatchResult {
            self.base.require_open("next_batch")?;
            let call = self.calls;
            self.calls += 1;
            if self.block_at.front() == Some(&call) {
                self.block_at.pop_front();
                return Ok(Poll::Blocked);
            }
            let end = (self.position + self.batch_size).min(self.rows.len());
            let rows: Vec<Vec<Value>> = self.rows[self.position..end].to_vec();
            self.position = end;
            let begin = self.base.claim_rows(rows.len());
            let mut batch = TupleBatch::new(begin, rows);
            batch.set_terminated(self.position >= self.rows.len());
            Ok(Poll::Ready(batch))
        }

        fn close(&mut self) -> ExecResult<()> {
            self.base.set_closed();
            Ok(())
        }

        fn reset(&mut self) -> ExecResult<()> {
            self.base.require_not_open("reset")?;
            self.base.reset();
            self.position = 0;
            self.calls = 0;
            Ok(())
        }

        fn try_clone(&self) -> ExecResult<Box<dyn RelationalNode>> {
            self.base.require_not_open("clone")?;
            Ok(Box::new(Self::new(self.rows.clone(), self.batch_size)))
        }

        fn state(&self) -> OperatorState {
            self.base.state()
        }

        fn name(&self) -> &'static str {
            "FixedBatch"
        }
    }
}
