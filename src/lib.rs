//! `FedQuery` plan core
//!
//! This crate provides the plan representation and batch execution core of
//! a federated query processor.
//!
//! # Overview
//!
//! The core consists of three layers:
//!
//! - **SQL**: resolved command trees, symbols, and expressions
//! - **Plan**: the mutable plan-node tree, symbol maps, and the
//!   alias/naming rewriter that prepares commands for push-down
//! - **Exec**: pull-based batch execution with a non-blocking
//!   blocked/retry protocol
//!
//! # Modules
//!
//! - [`sql`] - Resolved commands, symbols, and expressions
//! - [`plan`] - Plan nodes, symbol maps, and alias generation
//! - [`exec`] - Batch execution operators and the plan contract
//! - [`error`] - Error types for planning and execution
//!
//! # Quick Start
//!
//! Rewrite a resolved command with deterministic aliases:
//!
//! ```
//! use fedquery::plan::AliasGenerator;
//! use fedquery::sql::{
//!     Command, ElementSymbol, Expression, From, FromClause, GroupSymbol, Query, Select,
//! };
//!
//! let group = GroupSymbol::new("parts");
//! let mut command = Command::Query(Query::new(
//!     Select::new(vec![Expression::Element(ElementSymbol::new(group.clone(), "id"))]),
//!     Some(From { clauses: vec![FromClause::Group(group)] }),
//! ));
//! AliasGenerator::rewrite(&mut command);
//! assert_eq!(command.to_string(), "SELECT g_0.id FROM parts AS g_0");
//! ```
//!
//! Build a plan tree programmatically:
//!
//! ```
//! use fedquery::plan::{NodeType, PlanTree};
//!
//! let mut tree = PlanTree::new();
//! let limit = tree.new_node(NodeType::TupleLimit);
//! let access = tree.new_node(NodeType::Access);
//! tree.add_child(limit, access).unwrap();
//! assert_eq!(tree.preorder(limit), vec![limit, access]);
//! ```

pub mod error;
pub mod exec;
pub mod plan;
pub mod sql;

// Re-export commonly used items at the crate root
pub use error::{ExecResult, PlanError, PlanResult, QueryError};
pub use exec::{
    BatchResult, CommandContext, Poll, ProcessorPlan, RelationalNode, RelationalPlan, TupleBatch,
    Value, Warning,
};
pub use plan::{AliasGenerator, NodeId, NodeType, PlanNode, PlanTree, SymbolMap};
pub use sql::{Command, ElementSymbol, Expression, GroupSymbol};
