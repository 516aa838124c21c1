//! Error types for plan construction and query execution.
//!
//! Failures fall into two kinds: *processing* failures are user-visible
//! conditions (bad data from a source, a constraint a row cannot satisfy)
//! and *component* failures are internal errors (a collaborator misbehaved,
//! an operator was driven outside its lifecycle). The blocked signal is not
//! an error at all; it is modeled by [`Poll`](crate::exec::Poll).

use thiserror::Error;

/// Errors that can occur while executing a processor plan.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A value from a data source could not be processed.
    #[error("malformed row from source: {0}")]
    MalformedRow(String),

    /// An expression could not be evaluated against the current row.
    #[error("expression evaluation failed: {0}")]
    Evaluation(String),

    /// A dependent criteria clause has a shape the processor cannot bind.
    #[error("unsupported dependent criteria clause: {0}")]
    UnsupportedClause(String),

    /// The execution was cancelled by the caller.
    #[error("query execution cancelled")]
    Cancelled,

    /// A generic user-visible processing failure.
    #[error("processing error: {0}")]
    Processing(String),

    /// A collaborator (data manager, tuple source) failed internally.
    #[error("source error: {0}")]
    Source(String),

    /// An operator or plan was driven outside its legal lifecycle.
    #[error("invalid operator state: {0}")]
    InvalidState(String),

    /// An internal invariant was violated.
    #[error("component error: {0}")]
    Component(String),
}

impl QueryError {
    /// Returns `true` if this is a user-visible processing failure.
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        matches!(
            self,
            Self::MalformedRow(_)
                | Self::Evaluation(_)
                | Self::UnsupportedClause(_)
                | Self::Cancelled
                | Self::Processing(_)
        )
    }

    /// Returns `true` if this is an internal component failure.
    #[must_use]
    pub const fn is_component(&self) -> bool {
        !self.is_processing()
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, QueryError>;

/// Errors that can occur while validating or constructing plan structures.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A symbol map was constructed with mismatched column/expression counts.
    #[error("symbol map arity mismatch: {columns} columns but {expressions} expressions")]
    ArityMismatch {
        /// Number of declared output columns.
        columns: usize,
        /// Number of mapped expressions.
        expressions: usize,
    },

    /// A property value references a group not owned by the node or an ancestor.
    #[error("group {group} referenced at node {node} is not in scope")]
    GroupNotInScope {
        /// The unresolved group name.
        group: String,
        /// The offending node, rendered as its type label.
        node: String,
    },

    /// The node tree contains a cycle.
    #[error("plan tree contains a cycle through node {0}")]
    CycleDetected(usize),

    /// A child was attached to a node that is not part of the same tree.
    #[error("invalid node id {0}")]
    InvalidNode(usize),
}

/// Result type for plan operations.
pub type PlanResult<T> = Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_partition() {
        assert!(QueryError::Processing("bad row".into()).is_processing());
        assert!(QueryError::Cancelled.is_processing());
        assert!(QueryError::Source("io".into()).is_component());
        assert!(QueryError::InvalidState("clone while open".into()).is_component());
        assert!(!QueryError::Component("oops".into()).is_processing());
    }

    #[test]
    fn error_display() {
        let err = QueryError::InvalidState("clone after open".to_string());
        assert!(err.to_string().contains("invalid operator state"));

        let err = PlanError::ArityMismatch { columns: 3, expressions: 2 };
        assert!(err.to_string().contains("3 columns"));
        assert!(err.to_string().contains("2 expressions"));
    }
}
