//! The resolved SQL algebra: symbols, expressions and command trees.
//!
//! Parsing and resolution happen outside this crate; these types are the
//! already-resolved representation the planner hands to the plan model,
//! the alias rewriter and the execution pipeline.

pub mod command;
pub mod expr;
pub mod symbol;
pub mod visitor;

pub use command::{
    Command, From, FromClause, JoinType, Limit, OrderBy, OrderByItem, Query, Select, SetOpKind,
    SetQuery,
};
pub use expr::{CompareOp, Expression};
pub use symbol::{ElementSymbol, GroupSymbol};
