//! The relational plan model.
//!
//! - [`node`]: the arena-backed plan node tree and its property bag
//! - [`symbol_map`]: virtual-column to expression translation tables
//! - [`alias`]: the safe-aliasing rewrite pass for push-down SQL

pub mod alias;
pub mod node;
pub mod symbol_map;

pub use alias::AliasGenerator;
pub use node::{Info, NodeId, NodeType, PlanNode, PlanTree, PropertyValue};
pub use symbol_map::SymbolMap;
