//! The plan node model.
//!
//! A [`PlanTree`] is an arena of [`PlanNode`]s addressed by [`NodeId`].
//! Parent, child and sibling navigation is O(1) in any direction because
//! links are stored as indices rather than owning references; the parent
//! back-reference carries no ownership, so the tree stays acyclic without
//! reference-cycle management.
//!
//! Each node carries a type tag, the set of groups whose columns may
//! appear beneath it, and a property bag keyed by the closed [`Info`]
//! enumeration. Setting a property never validates cross-node invariants;
//! [`PlanTree::validate`] checks them on demand.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::sql::visitor::for_each_element;
use crate::sql::{ElementSymbol, Expression, GroupSymbol, JoinType, OrderByItem, SetOpKind};

use super::symbol_map::SymbolMap;

/// Index of a node within a [`PlanTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed set of plan node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum NodeType {
    /// Push-down access to an external source.
    Access = 1,
    /// Duplicate removal.
    DupRemoval = 2,
    /// Join of two children.
    Join = 3,
    /// Projection.
    Project = 4,
    /// Selection (predicate filter).
    Select = 5,
    /// Sort.
    Sort = 6,
    /// Source (virtual group boundary).
    Source = 7,
    /// Grouping/aggregation.
    Group = 8,
    /// Set operation.
    SetOp = 9,
    /// Produces no rows.
    Null = 10,
    /// Row-window limit/offset.
    TupleLimit = 11,
}

impl NodeType {
    /// The numeric tag of this type.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Converts a numeric tag back to a type, if it is a known one.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Access),
            2 => Some(Self::DupRemoval),
            3 => Some(Self::Join),
            4 => Some(Self::Project),
            5 => Some(Self::Select),
            6 => Some(Self::Sort),
            7 => Some(Self::Source),
            8 => Some(Self::Group),
            9 => Some(Self::SetOp),
            10 => Some(Self::Null),
            11 => Some(Self::TupleLimit),
            _ => None,
        }
    }

    /// Renders a numeric tag as a label.
    ///
    /// Total over all inputs: unknown tags render as their raw number
    /// rather than failing.
    #[must_use]
    pub fn label_for(code: u16) -> String {
        match Self::from_code(code) {
            Some(t) => t.to_string(),
            None => code.to_string(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Access => "Access",
            Self::DupRemoval => "DupRemoval",
            Self::Join => "Join",
            Self::Project => "Project",
            Self::Select => "Select",
            Self::Sort => "Sort",
            Self::Source => "Source",
            Self::Group => "Group",
            Self::SetOp => "SetOp",
            Self::Null => "Null",
            Self::TupleLimit => "TupleLimit",
        };
        write!(f, "{s}")
    }
}

/// The closed set of property keys a plan node may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Info {
    /// The pushed-down command for an access node.
    AtomicRequest,
    /// Join type of a join node.
    JoinType,
    /// Join predicates of a join node.
    JoinCriteria,
    /// Predicate of a select node.
    SelectCriteria,
    /// Projected expressions of a project node.
    ProjectCols,
    /// Symbol map of a source node.
    SymbolMap,
    /// Sort keys of a sort node.
    SortOrder,
    /// Row-limit expression of a tuple-limit node.
    MaxTupleLimit,
    /// Offset expression of a tuple-limit node.
    OffsetTupleCount,
    /// Set operation of a set-op node.
    SetOperation,
    /// Whether the set operation keeps duplicates.
    UseAll,
    /// Resolved output columns of a node.
    OutputCols,
    /// Cardinality estimate from the planner.
    EstCardinality,
    /// Whether this access node may be pushed down verbatim.
    IsVerbatim,
}

/// A property value: a tagged union over the types the [`Info`] keys use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// A single expression.
    Expr(Expression),
    /// An ordered expression list.
    ExprList(Vec<Expression>),
    /// A symbol map.
    SymbolMap(SymbolMap),
    /// A boolean flag.
    Bool(bool),
    /// A row-count estimate.
    Number(f64),
    /// A join type.
    JoinType(JoinType),
    /// A set operation kind.
    SetOp(SetOpKind),
    /// Sort keys.
    SortKeys(Vec<OrderByItem>),
    /// Resolved output elements.
    Elements(Vec<ElementSymbol>),
    /// A serialized command fragment.
    Text(String),
}

impl PropertyValue {
    /// The expression inside, if this is an expression value.
    #[must_use]
    pub const fn as_expr(&self) -> Option<&Expression> {
        match self {
            Self::Expr(e) => Some(e),
            _ => None,
        }
    }

    /// The expression list inside, if this is a list value.
    #[must_use]
    pub fn as_expr_list(&self) -> Option<&[Expression]> {
        match self {
            Self::ExprList(list) => Some(list),
            _ => None,
        }
    }

    /// The symbol map inside, if this is a symbol-map value.
    #[must_use]
    pub const fn as_symbol_map(&self) -> Option<&SymbolMap> {
        match self {
            Self::SymbolMap(m) => Some(m),
            _ => None,
        }
    }

    /// The boolean inside, if this is a flag value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// One node of a plan tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanNode {
    node_type: NodeType,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    groups: HashSet<GroupSymbol>,
    properties: HashMap<Info, PropertyValue>,
}

impl PlanNode {
    fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            parent: None,
            children: Vec::new(),
            groups: HashSet::new(),
            properties: HashMap::new(),
        }
    }

    /// The type tag of this node.
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// The parent node, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The ordered children of this node.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The groups owned by this node.
    #[must_use]
    pub const fn groups(&self) -> &HashSet<GroupSymbol> {
        &self.groups
    }

    /// Retrieves a property; absent properties yield `None`, never a default.
    #[must_use]
    pub fn get_property(&self, key: Info) -> Option<&PropertyValue> {
        self.properties.get(&key)
    }

    /// Sets a property, replacing any prior value.
    ///
    /// No cross-node validation happens here; that is the rewriter's and
    /// optimizer's job.
    pub fn set_property(&mut self, key: Info, value: PropertyValue) {
        self.properties.insert(key, value);
    }

    /// Removes and returns a property.
    pub fn remove_property(&mut self, key: Info) -> Option<PropertyValue> {
        self.properties.remove(&key)
    }

    /// Adds a group to this node's owned set.
    pub fn add_group(&mut self, group: GroupSymbol) {
        self.groups.insert(group);
    }
}

/// An arena-backed plan tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanTree {
    nodes: Vec<PlanNode>,
    root: Option<NodeId>,
}

impl PlanTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new unattached node and returns its id.
    pub fn new_node(&mut self, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(PlanNode::new(node_type));
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// The root node, conventionally the first allocated.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Overrides the root node.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrows a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.0]
    }

    /// Mutably borrows a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this tree.
    pub fn node_mut(&mut self, id: NodeId) -> &mut PlanNode {
        &mut self.nodes[id.0]
    }

    /// Attaches `child` as the last child of `parent`.
    ///
    /// Detaches the child from any previous parent first.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> PlanResult<()> {
        if parent.0 >= self.nodes.len() || child.0 >= self.nodes.len() {
            return Err(PlanError::InvalidNode(parent.0.max(child.0)));
        }
        if parent == child {
            return Err(PlanError::CycleDetected(parent.0));
        }
        if let Some(old) = self.nodes[child.0].parent {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// The next sibling of a node, if any.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let siblings = self.node(parent).children();
        let pos = siblings.iter().position(|c| *c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// The first child of a node, if any.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children().first().copied()
    }

    /// Pre-order traversal starting at `id`.
    #[must_use]
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            for child in self.node(next).children().iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Whether `group` is owned by `id` or any of its ancestors.
    #[must_use]
    pub fn group_in_scope(&self, id: NodeId, group: &GroupSymbol) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.node(node).groups().contains(group) {
                return true;
            }
            current = self.node(node).parent();
        }
        false
    }

    /// Checks the structural invariants: acyclicity through parent links
    /// and group-scope coverage for every group referenced by a property
    /// value.
    pub fn validate(&self) -> PlanResult<()> {
        if let Some(root) = self.root {
            let mut seen = HashSet::new();
            for id in self.preorder(root) {
                if !seen.insert(id) {
                    return Err(PlanError::CycleDetected(id.0));
                }
            }
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            let id = NodeId(idx);
            for value in node.properties.values() {
                let mut referenced: Vec<GroupSymbol> = Vec::new();
                collect_groups(value, &mut referenced);
                for group in referenced {
                    if !self.group_in_scope(id, &group) {
                        return Err(PlanError::GroupNotInScope {
                            group: group.name().to_string(),
                            node: node.node_type().to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn collect_groups(value: &PropertyValue, out: &mut Vec<GroupSymbol>) {
    let mut push_elem = |e: &ElementSymbol| out.push(e.group().clone());
    match value {
        PropertyValue::Expr(e) => for_each_element(e, &mut push_elem),
        PropertyValue::ExprList(list) => {
            for e in list {
                for_each_element(e, &mut push_elem);
            }
        }
        PropertyValue::SortKeys(items) => {
            for item in items {
                for_each_element(&item.expr, &mut push_elem);
            }
        }
        PropertyValue::Elements(elems) => {
            for e in elems {
                push_elem(e);
            }
        }
        PropertyValue::SymbolMap(map) => {
            for (_, expr) in map.iter() {
                for_each_element(expr, &mut push_elem);
            }
        }
        PropertyValue::Bool(_)
        | PropertyValue::Number(_)
        | PropertyValue::JoinType(_)
        | PropertyValue::SetOp(_)
        | PropertyValue::Text(_) => {}
    }
}

impl fmt::Display for PlanTree {
    /// Renders the tree with two-space indentation per depth level.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render(
            tree: &PlanTree,
            id: NodeId,
            depth: usize,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            let node = tree.node(id);
            writeln!(f, "{:indent$}{}({})", "", node.node_type(), id, indent = depth * 2)?;
            for child in node.children() {
                render(tree, *child, depth + 1, f)?;
            }
            Ok(())
        }
        match self.root {
            Some(root) => render(self, root, 0, f),
            None => writeln!(f, "<empty plan>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Value;

    #[test]
    fn navigation_in_all_directions() {
        let mut tree = PlanTree::new();
        let project = tree.new_node(NodeType::Project);
        let join = tree.new_node(NodeType::Join);
        let left = tree.new_node(NodeType::Access);
        let right = tree.new_node(NodeType::Access);

        tree.add_child(project, join).unwrap();
        tree.add_child(join, left).unwrap();
        tree.add_child(join, right).unwrap();

        assert_eq!(tree.root(), Some(project));
        assert_eq!(tree.first_child(project), Some(join));
        assert_eq!(tree.node(left).parent(), Some(join));
        assert_eq!(tree.next_sibling(left), Some(right));
        assert_eq!(tree.next_sibling(right), None);
        assert_eq!(tree.preorder(project), vec![project, join, left, right]);
    }

    #[test]
    fn absent_property_is_none() {
        let mut tree = PlanTree::new();
        let node = tree.new_node(NodeType::Select);
        assert!(tree.node(node).get_property(Info::SelectCriteria).is_none());

        tree.node_mut(node)
            .set_property(Info::SelectCriteria, PropertyValue::Bool(true));
        assert_eq!(
            tree.node(node).get_property(Info::SelectCriteria).and_then(PropertyValue::as_bool),
            Some(true)
        );
    }

    #[test]
    fn label_is_total_over_unknown_tags() {
        assert_eq!(NodeType::label_for(NodeType::Join.code()), "Join");
        assert_eq!(NodeType::label_for(999), "999");
    }

    #[test]
    fn self_child_rejected() {
        let mut tree = PlanTree::new();
        let node = tree.new_node(NodeType::Null);
        assert!(matches!(tree.add_child(node, node), Err(PlanError::CycleDetected(_))));
    }

    #[test]
    fn reparent_detaches_from_old_parent() {
        let mut tree = PlanTree::new();
        let a = tree.new_node(NodeType::Project);
        let b = tree.new_node(NodeType::Select);
        let c = tree.new_node(NodeType::Access);

        tree.add_child(a, c).unwrap();
        tree.add_child(b, c).unwrap();

        assert!(tree.node(a).children().is_empty());
        assert_eq!(tree.node(b).children(), &[c]);
        assert_eq!(tree.node(c).parent(), Some(b));
    }

    #[test]
    fn validate_group_scope() {
        use crate::sql::ElementSymbol;

        let mut tree = PlanTree::new();
        let select = tree.new_node(NodeType::Select);
        let access = tree.new_node(NodeType::Access);
        tree.add_child(select, access).unwrap();

        let group = GroupSymbol::new("t");
        let criteria = Expression::eq(
            Expression::Element(ElementSymbol::new(group.clone(), "a")),
            Expression::Constant(Value::Integer(1)),
        );
        tree.node_mut(select)
            .set_property(Info::SelectCriteria, PropertyValue::Expr(criteria));

        // Group not owned anywhere: invalid.
        assert!(tree.validate().is_err());

        // Owning it at the node itself (or an ancestor) fixes the scope.
        tree.node_mut(select).add_group(group);
        assert!(tree.validate().is_ok());
    }
}
