//! Group and element symbols.
//!
//! Symbols are the identity-bearing pieces of the resolved command tree.
//! A [`GroupSymbol`] names a table-like scope (physical table, subquery,
//! or virtual view); an [`ElementSymbol`] names one column of a group.
//!
//! Identity (equality, hashing, map lookup) is carried by the declared
//! name only, compared case-insensitively. The alias rewriter mutates the
//! `output_*` fields exclusively, so symbols remain stable keys during a
//! rewrite pass.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A logical table-like scope referenced by qualified column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSymbol {
    /// The declared name as written in the command.
    name: String,
    /// Canonical (lowercased) form of the name, used for identity.
    canonical: String,
    /// The underlying definition when the group is itself an alias
    /// (e.g. `FROM tbl AS t` has name `t` and definition `tbl`).
    definition: Option<String>,
    /// Externally visible name assigned by the alias rewriter.
    output_name: Option<String>,
    /// Externally visible definition assigned by the alias rewriter.
    output_definition: Option<String>,
    /// Whether this group is the output of a nested scope rather than a
    /// physical source.
    is_virtual: bool,
    /// Whether this group is a temporary/generated source.
    is_temp: bool,
}

impl GroupSymbol {
    /// Creates a physical group with the given declared name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let canonical = name.to_ascii_lowercase();
        Self {
            name,
            canonical,
            definition: None,
            output_name: None,
            output_definition: None,
            is_virtual: false,
            is_temp: false,
        }
    }

    /// Creates a virtual group representing the output of a nested scope.
    #[must_use]
    pub fn virtual_group(name: impl Into<String>) -> Self {
        let mut g = Self::new(name);
        g.is_virtual = true;
        g
    }

    /// Creates a temporary/generated group.
    #[must_use]
    pub fn temp_group(name: impl Into<String>) -> Self {
        let mut g = Self::new(name);
        g.is_temp = true;
        g
    }

    /// Sets the underlying definition (`FROM tbl AS t`).
    #[must_use]
    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    /// The declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical (lowercased) name used for identity.
    #[must_use]
    pub fn canonical_name(&self) -> &str {
        &self.canonical
    }

    /// The underlying definition, if this group aliases another name.
    #[must_use]
    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    /// The externally visible name: the rewritten alias if one was
    /// assigned, otherwise the declared name.
    #[must_use]
    pub fn output_name(&self) -> &str {
        self.output_name.as_deref().unwrap_or(&self.name)
    }

    /// The externally visible definition, if the rewriter assigned one.
    #[must_use]
    pub fn output_definition(&self) -> Option<&str> {
        self.output_definition.as_deref()
    }

    /// Assigns the rewritten output name.
    pub fn set_output_name(&mut self, alias: impl Into<String>) {
        self.output_name = Some(alias.into());
    }

    /// Assigns the rewritten output definition.
    pub fn set_output_definition(&mut self, definition: impl Into<String>) {
        self.output_definition = Some(definition.into());
    }

    /// Whether this group is virtual (the output of a nested scope).
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Whether this group is a temporary/generated source.
    #[must_use]
    pub const fn is_temp(&self) -> bool {
        self.is_temp
    }
}

impl PartialEq for GroupSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for GroupSymbol {}

impl Hash for GroupSymbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for GroupSymbol {
    /// Renders the group the way it appears in a FROM clause: the output
    /// definition (or declared definition, or name) aliased to the output
    /// name when the two differ.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self
            .output_definition
            .as_deref()
            .or(self.definition.as_deref())
            .unwrap_or(&self.name);
        let alias = self.output_name();
        if shown.eq_ignore_ascii_case(alias) {
            write!(f, "{shown}")
        } else {
            write!(f, "{shown} AS {alias}")
        }
    }
}

/// A single column reference scoped to a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSymbol {
    /// The short (unqualified) column name.
    name: String,
    /// Canonical qualified name (`group.column`, lowercased), used for identity.
    canonical: String,
    /// The owning group.
    group: GroupSymbol,
    /// Externally visible column name assigned by the alias rewriter.
    output_name: Option<String>,
}

impl ElementSymbol {
    /// Creates an element scoped to the given group.
    #[must_use]
    pub fn new(group: GroupSymbol, name: impl Into<String>) -> Self {
        let name = name.into();
        let canonical = format!("{}.{}", group.canonical_name(), name.to_ascii_lowercase());
        Self { name, canonical, group, output_name: None }
    }

    /// The short (unqualified) column name.
    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.name
    }

    /// The canonical qualified name used for identity.
    #[must_use]
    pub fn canonical_name(&self) -> &str {
        &self.canonical
    }

    /// The owning group.
    #[must_use]
    pub fn group(&self) -> &GroupSymbol {
        &self.group
    }

    /// Mutable access to the owning group, for qualification rewriting.
    pub fn group_mut(&mut self) -> &mut GroupSymbol {
        &mut self.group
    }

    /// The externally visible column name: the rewritten alias if one was
    /// assigned, otherwise the short name.
    #[must_use]
    pub fn output_name(&self) -> &str {
        self.output_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether the rewriter has assigned an output name.
    #[must_use]
    pub const fn has_output_name(&self) -> bool {
        self.output_name.is_some()
    }

    /// Assigns the rewritten output name.
    pub fn set_output_name(&mut self, alias: impl Into<String>) {
        self.output_name = Some(alias.into());
    }
}

impl PartialEq for ElementSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ElementSymbol {}

impl Hash for ElementSymbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for ElementSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group.output_name(), self.name)
    }
}
