//! The executable-plan contract.
//!
//! A [`ProcessorPlan`] is what a driver holds: it is initialized with the
//! execution context and the consumed collaborators, then opened and
//! pulled batch by batch. [`RelationalPlan`] is the implementation over a
//! tree of [`RelationalNode`] operators.

use crate::error::{ExecResult, QueryError};
use crate::sql::ElementSymbol;

use super::context::{CommandContext, Warning};
use super::data::{BufferManager, SharedDataManager};
use super::operator::{BatchResult, BoxedNode, OperatorState};

/// An executable plan as seen by the driver.
///
/// Lifecycle: `initialize`, `open`, repeated `next_batch` until a
/// terminated batch (retrying verbatim on the blocked signal), `close`.
/// `reset` returns a closed plan to its pre-open state for re-execution.
pub trait ProcessorPlan: Send {
    /// Supplies the execution context and consumed collaborators. Must be
    /// called before `open`.
    fn initialize(
        &mut self,
        context: CommandContext,
        data_manager: SharedDataManager,
        buffer_manager: &dyn BufferManager,
    );

    /// Opens the plan for execution.
    fn open(&mut self) -> ExecResult<()>;

    /// Produces the next batch, or the blocked signal.
    fn next_batch(&mut self) -> BatchResult;

    /// Closes the plan, releasing resources exactly once.
    fn close(&mut self) -> ExecResult<()>;

    /// Resets a closed plan for a fresh execution.
    fn reset(&mut self) -> ExecResult<()>;

    /// Drains the warnings accumulated since the last call.
    fn get_and_clear_warnings(&mut self) -> Vec<Warning>;

    /// The output columns, in order.
    fn output_elements(&self) -> &[ElementSymbol];

    /// Nested plans, for drivers that walk the plan hierarchy.
    fn child_plans(&mut self) -> Vec<&mut dyn ProcessorPlan> {
        Vec::new()
    }

    /// Clones the plan for pre-open reuse. Rejected while open.
    fn try_clone(&self) -> ExecResult<Box<dyn ProcessorPlan>>;
}

/// A processor plan over a tree of relational operators.
pub struct RelationalPlan {
    root: BoxedNode,
    output_elements: Vec<ElementSymbol>,
    context: Option<CommandContext>,
    data_manager: Option<SharedDataManager>,
}

impl RelationalPlan {
    /// Creates a plan with `root` producing the given output columns.
    #[must_use]
    pub fn new(root: BoxedNode, output_elements: Vec<ElementSymbol>) -> Self {
        Self { root, output_elements, context: None, data_manager: None }
    }

    /// The data manager supplied at initialize, for nested-plan wiring.
    #[must_use]
    pub fn data_manager(&self) -> Option<&SharedDataManager> {
        self.data_manager.as_ref()
    }

    fn context(&self) -> ExecResult<&CommandContext> {
        self.context
            .as_ref()
            .ok_or_else(|| QueryError::InvalidState("plan was not initialized".to_string()))
    }
}

impl ProcessorPlan for RelationalPlan {
    fn initialize(
        &mut self,
        context: CommandContext,
        data_manager: SharedDataManager,
        buffer_manager: &dyn BufferManager,
    ) {
        self.context = Some(context.with_batch_size(buffer_manager.processor_batch_size()));
        self.data_manager = Some(data_manager);
    }

    fn open(&mut self) -> ExecResult<()> {
        let context = self.context()?.clone();
        self.root.open(&context)
    }

    fn next_batch(&mut self) -> BatchResult {
        if self.context()?.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        self.root.next_batch()
    }

    fn close(&mut self) -> ExecResult<()> {
        self.root.close()
    }

    fn reset(&mut self) -> ExecResult<()> {
        self.root.reset()
    }

    fn get_and_clear_warnings(&mut self) -> Vec<Warning> {
        self.context.as_ref().map(CommandContext::drain_warnings).unwrap_or_default()
    }

    fn output_elements(&self) -> &[ElementSymbol] {
        &self.output_elements
    }

    fn try_clone(&self) -> ExecResult<Box<dyn ProcessorPlan>> {
        if self.root.state() == OperatorState::Open {
            return Err(QueryError::InvalidState("clone of an open plan".to_string()));
        }
        Ok(Box::new(Self::new(self.root.try_clone()?, self.output_elements.clone())))
    }
}

impl std::fmt::Debug for RelationalPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalPlan")
            .field("root", &self.root.name())
            .field("state", &self.root.state())
            .field("output_elements", &self.output_elements)
            .finish_non_exhaustive()
    }
}
