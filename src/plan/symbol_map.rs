//! Symbol maps.
//!
//! A [`SymbolMap`] translates between a virtual group's declared output
//! columns and the expressions that compute them. Insertion order is
//! significant because downstream projection lists are positional.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::sql::{ElementSymbol, Expression, GroupSymbol};

/// An ordered, key-unique mapping from virtual elements to expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<(ElementSymbol, Expression)>", into = "Vec<(ElementSymbol, Expression)>")]
pub struct SymbolMap {
    entries: Vec<(ElementSymbol, Expression)>,
    index: HashMap<ElementSymbol, usize>,
}

impl From<Vec<(ElementSymbol, Expression)>> for SymbolMap {
    fn from(entries: Vec<(ElementSymbol, Expression)>) -> Self {
        let mut map = Self::new();
        for (key, expr) in entries {
            map.add_mapping(key, expr);
        }
        map
    }
}

impl From<SymbolMap> for Vec<(ElementSymbol, Expression)> {
    fn from(map: SymbolMap) -> Self {
        map.entries
    }
}

impl SymbolMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard map for a virtual group: zips the group's
    /// declared output columns against the expressions that compute them.
    ///
    /// # Errors
    ///
    /// Fails with [`PlanError::ArityMismatch`] when the column and
    /// expression counts differ; silent truncation is never acceptable.
    pub fn from_virtual_group(
        group: &GroupSymbol,
        columns: Vec<ElementSymbol>,
        expressions: Vec<Expression>,
    ) -> PlanResult<Self> {
        if columns.len() != expressions.len() {
            return Err(PlanError::ArityMismatch {
                columns: columns.len(),
                expressions: expressions.len(),
            });
        }
        tracing::trace!(group = group.name(), columns = columns.len(), "building symbol map");
        let mut map = Self::new();
        for (column, expr) in columns.into_iter().zip(expressions) {
            map.add_mapping(column, expr);
        }
        Ok(map)
    }

    /// Adds a mapping, returning `true` when the key was newly inserted.
    ///
    /// Collisions silently overwrite (last write wins) to support
    /// incremental map construction. Alias wrappers are stripped so the
    /// map stores the underlying expression and later rewrites compose
    /// without accumulating indirection layers.
    pub fn add_mapping(&mut self, key: ElementSymbol, expr: Expression) -> bool {
        let expr = expr.underlying().clone();
        match self.index.get(&key) {
            Some(&pos) => {
                self.entries[pos].1 = expr;
                false
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, expr));
                true
            }
        }
    }

    /// Looks up the expression mapped to a key.
    #[must_use]
    pub fn get_mapped_expression(&self, key: &ElementSymbol) -> Option<&Expression> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    /// The keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<&ElementSymbol> {
        self.entries.iter().map(|(k, _)| k).collect()
    }

    /// The mapped expressions in insertion order.
    #[must_use]
    pub fn mapped_expressions(&self) -> Vec<&Expression> {
        self.entries.iter().map(|(_, e)| e).collect()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ElementSymbol, &Expression)> {
        self.entries.iter().map(|(k, e)| (k, e))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for SymbolMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, e)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k} -> {e}")?;
        }
        write!(f, "}}")
    }
}
