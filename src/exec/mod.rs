//! Batch execution of relational plans.
//!
//! Execution is pull-based: a driver repeatedly asks the plan root for
//! the next [`TupleBatch`], and every operator that cannot make progress
//! returns the [`Poll::Blocked`] signal instead of blocking the thread.
//! Partial progress lives in operator fields, so a retried call resumes
//! exactly where it stopped.

pub mod batch;
pub mod context;
pub mod data;
pub mod eval;
pub mod operator;
pub mod operators;
pub mod plan;
pub mod value;

pub use batch::TupleBatch;
pub use context::{CommandContext, VariableContext, Warning, DEFAULT_PROCESSOR_BATCH_SIZE};
pub use data::{BufferManager, ProcessingDataManager, SharedDataManager, TupleSource};
pub use eval::{Evaluator, LOOKUP_FUNCTION};
pub use operator::{BatchResult, BoxedNode, OperatorBase, OperatorState, Poll, RelationalNode};
pub use operators::{
    AccessOperator, DependentCriteriaProcessor, LimitOperator, ParameterInfo, ValueIterator,
};
pub use plan::{ProcessorPlan, RelationalPlan};
pub use value::Value;
