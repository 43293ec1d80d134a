//! Node and edge identities.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeLabel {
    Weapon,
    Resource,
    Recipe,
    Category,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 4] = [
        NodeLabel::Weapon,
        NodeLabel::Resource,
        NodeLabel::Recipe,
        NodeLabel::Category,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Weapon => "Weapon",
            NodeLabel::Resource => "Resource",
            NodeLabel::Recipe => "Recipe",
            NodeLabel::Category => "Category",
        }
    }

    /// Property holding the natural key for this label.
    pub fn key_property(&self) -> &'static str {
        match self {
            NodeLabel::Category => "name",
            _ => "uniqueName",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a node: its label plus natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label, self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Recipe → the Weapon or Resource it produces.
    Builds,
    /// Recipe → an ingredient Resource.
    Requires,
    /// Weapon → its Category.
    BelongsTo,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 3] = [EdgeKind::Builds, EdgeKind::Requires, EdgeKind::BelongsTo];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Builds => "BUILDS",
            EdgeKind::Requires => "REQUIRES",
            EdgeKind::BelongsTo => "BELONGS_TO",
        }
    }

    pub fn carries_quantity(&self) -> bool {
        !matches!(self, EdgeKind::BelongsTo)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An edge to merge. `(kind, from, to)` is the edge key; `quantity` is its
/// only attribute and is overwritten on every merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSpec {
    pub kind: EdgeKind,
    pub from: NodeRef,
    pub to: NodeRef,
    pub quantity: Option<i64>,
}

impl EdgeSpec {
    pub fn builds(recipe: NodeRef, product: NodeRef, quantity: i64) -> Self {
        Self {
            kind: EdgeKind::Builds,
            from: recipe,
            to: product,
            quantity: Some(quantity),
        }
    }

    pub fn requires(recipe: NodeRef, resource: NodeRef, quantity: i64) -> Self {
        Self {
            kind: EdgeKind::Requires,
            from: recipe,
            to: resource,
            quantity: Some(quantity),
        }
    }

    pub fn belongs_to(weapon: NodeRef, category: NodeRef) -> Self {
        Self {
            kind: EdgeKind::BelongsTo,
            from: weapon,
            to: category,
            quantity: None,
        }
    }
}

impl fmt::Display for EdgeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.kind, self.to)
    }
}
