//! Execution context for one driven plan.
//!
//! A [`CommandContext`] carries the per-execution identity, the processor
//! batch size, cancellation, the variable context written by dependent
//! criteria evaluation, and the non-fatal warning sink. Handles are
//! cheap to clone: operators keep a clone taken at `open` time.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::value::Value;

/// Default processor batch size used when no buffer manager overrides it.
pub const DEFAULT_PROCESSOR_BATCH_SIZE: usize = 256;

/// A non-fatal warning accumulated during execution.
///
/// Warnings never alter row results already returned; they are drained
/// via [`crate::exec::ProcessorPlan::get_and_clear_warnings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Named variable bindings for one execution scope.
///
/// A child context can read through to its parent but writes only into
/// its own frame; dependent-criteria evaluation resets the frame between
/// rows.
#[derive(Debug, Default)]
pub struct VariableContext {
    values: HashMap<String, Value>,
    parent: Option<Box<VariableContext>>,
}

impl VariableContext {
    /// Creates an empty root context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child context over `parent`.
    #[must_use]
    pub fn with_parent(parent: VariableContext) -> Self {
        Self { values: HashMap::new(), parent: Some(Box::new(parent)) }
    }

    /// Binds a variable in this frame.
    pub fn set_value(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Looks up a variable, reading through to parent frames.
    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.values
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.get_value(name)))
    }

    /// Whether this frame (not a parent) binds the variable.
    #[must_use]
    pub fn is_bound_locally(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Clears this frame's bindings, keeping parent frames intact.
    pub fn clear_frame(&mut self) {
        self.values.clear();
    }
}

/// Shared per-execution state handed to every operator at open.
#[derive(Clone)]
pub struct CommandContext {
    processor_id: u64,
    batch_size: usize,
    cancelled: Arc<AtomicBool>,
    variables: Arc<Mutex<VariableContext>>,
    warnings: Arc<Mutex<Vec<Warning>>>,
}

impl CommandContext {
    /// Creates a context for the given execution id.
    #[must_use]
    pub fn new(processor_id: u64) -> Self {
        Self {
            processor_id,
            batch_size: DEFAULT_PROCESSOR_BATCH_SIZE,
            cancelled: Arc::new(AtomicBool::new(false)),
            variables: Arc::new(Mutex::new(VariableContext::new())),
            warnings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sets the processor batch size.
    ///
    /// The size affects only how many rows appear in one batch, never
    /// correctness.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// The execution identity of this context.
    #[must_use]
    pub const fn processor_id(&self) -> u64 {
        self.processor_id
    }

    /// The processor batch size.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Requests cancellation of this execution.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Runs `f` with the variable context locked.
    ///
    /// # Panics
    ///
    /// Panics if the lock was poisoned, which cannot happen under the
    /// one-thread-drives-one-plan contract.
    pub fn with_variables<R>(&self, f: impl FnOnce(&mut VariableContext) -> R) -> R {
        #[allow(clippy::expect_used)]
        let mut guard = self.variables.lock().expect("variable context poisoned");
        f(&mut guard)
    }

    /// Records a non-fatal warning.
    pub fn record_warning(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(processor_id = self.processor_id, %message, "execution warning");
        #[allow(clippy::expect_used)]
        self.warnings.lock().expect("warning sink poisoned").push(Warning { message });
    }

    /// Drains and clears the accumulated warnings.
    #[must_use]
    pub fn drain_warnings(&self) -> Vec<Warning> {
        #[allow(clippy::expect_used)]
        let mut guard = self.warnings.lock().expect("warning sink poisoned");
        std::mem::take(&mut *guard)
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("processor_id", &self.processor_id)
            .field("batch_size", &self.batch_size)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_read_through_parent() {
        let mut parent = VariableContext::new();
        parent.set_value("outer", Value::Integer(1));

        let mut child = VariableContext::with_parent(parent);
        child.set_value("inner", Value::Integer(2));

        assert_eq!(child.get_value("outer"), Some(&Value::Integer(1)));
        assert_eq!(child.get_value("inner"), Some(&Value::Integer(2)));
        assert!(!child.is_bound_locally("outer"));

        child.clear_frame();
        assert_eq!(child.get_value("inner"), None);
        assert_eq!(child.get_value("outer"), Some(&Value::Integer(1)));
    }

    #[test]
    fn warnings_drain_exactly_once() {
        let ctx = CommandContext::new(7);
        ctx.record_warning("code table still loading, approximate result used");

        let drained = ctx.drain_warnings();
        assert_eq!(drained.len(), 1);
        assert!(drained[0].message.contains("code table"));
        assert!(ctx.drain_warnings().is_empty());
    }

    #[test]
    fn cancellation_is_shared_across_clones() {
        let ctx = CommandContext::new(1);
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());
    }
}
