//! The read-only view of a tree that the evaluator walks.
//!
//! Data trees and schema trees both implement [`TreeNode`]; the grammar walker
//! is written once against the trait.

use std::fmt::Debug;
use std::hash::Hash;
use yangkit_tree::{
    Attribute, DataNodeRef, LeafType, Module, SchemaKind, SchemaNodeRef, SchemaTree, WhenStatus,
};

/// Structural type of a node as seen by XPath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
}

/// A navigable node handle. `'t` is the lifetime of the borrowed tree.
pub trait TreeNode<'t>: Debug + Clone + Copy + PartialEq + Eq + Hash + 't {
    fn root(&self) -> Self;

    /// Parent in the data view, `None` for the root.
    fn parent(&self) -> Option<Self>;

    fn first_child(&self) -> Option<Self>;

    fn next_sibling(&self) -> Option<Self>;

    /// Metadata annotations (always empty in a schema tree).
    fn attributes(&self) -> &'t [Attribute];

    fn node_type(&self) -> NodeType;

    fn name(&self) -> &'t str;

    fn module(&self) -> Option<&'t Module>;

    /// Value of a leaf or leaf-list instance.
    fn value(&self) -> Option<&'t str>;

    fn is_config(&self) -> bool;

    /// Pre-order position, used for document order.
    fn document_position(&self) -> u32;

    fn when_status(&self) -> WhenStatus;

    fn leaf_type(&self) -> Option<&'t LeafType>;

    fn schema_kind(&self) -> SchemaKind;

    fn schema_tree(&self) -> &'t SchemaTree;

    /// False for nodes brought in by an augment that is not applied yet.
    fn is_augment_target_resolved(&self) -> bool;

    fn in_rpc_output(&self) -> bool;

    fn in_rpc_input(&self) -> bool;

    /// Absolute path of the node, for messages.
    fn path(&self) -> String;

    fn children(&self) -> Children<'t, Self> {
        Children {
            next: self.first_child(),
            _tree: std::marker::PhantomData,
        }
    }

    /// Closest `module:name` style label, used in messages.
    fn label(&self) -> String {
        match (self.node_type(), self.module()) {
            (NodeType::Root, _) => "/".to_string(),
            (_, Some(module)) => format!("{}:{}", module.name, self.name()),
            (_, None) => self.name().to_string(),
        }
    }
}

pub struct Children<'t, N> {
    next: Option<N>,
    _tree: std::marker::PhantomData<&'t ()>,
}

impl<'t, N: TreeNode<'t>> Iterator for Children<'t, N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        let current = self.next?;
        self.next = current.next_sibling();
        Some(current)
    }
}

impl<'t> TreeNode<'t> for DataNodeRef<'t> {
    fn root(&self) -> Self {
        self.tree().root()
    }

    fn parent(&self) -> Option<Self> {
        DataNodeRef::parent(self)
    }

    fn first_child(&self) -> Option<Self> {
        DataNodeRef::first_child(self)
    }

    fn next_sibling(&self) -> Option<Self> {
        DataNodeRef::next_sibling(self)
    }

    fn attributes(&self) -> &'t [Attribute] {
        DataNodeRef::attributes(self)
    }

    fn node_type(&self) -> NodeType {
        if self.is_root() { NodeType::Root } else { NodeType::Element }
    }

    fn name(&self) -> &'t str {
        DataNodeRef::name(self)
    }

    fn module(&self) -> Option<&'t Module> {
        DataNodeRef::module(self)
    }

    fn value(&self) -> Option<&'t str> {
        DataNodeRef::value(self)
    }

    fn is_config(&self) -> bool {
        DataNodeRef::is_config(self)
    }

    fn document_position(&self) -> u32 {
        self.position()
    }

    fn when_status(&self) -> WhenStatus {
        DataNodeRef::when_status(self)
    }

    fn leaf_type(&self) -> Option<&'t LeafType> {
        DataNodeRef::leaf_type(self)
    }

    fn schema_kind(&self) -> SchemaKind {
        self.kind()
    }

    fn schema_tree(&self) -> &'t SchemaTree {
        self.tree().schema()
    }

    fn is_augment_target_resolved(&self) -> bool {
        true
    }

    fn in_rpc_output(&self) -> bool {
        self.schema().in_output()
    }

    fn in_rpc_input(&self) -> bool {
        !self.is_root() && self.schema().in_input()
    }

    fn path(&self) -> String {
        DataNodeRef::path(self)
    }
}

impl<'t> TreeNode<'t> for SchemaNodeRef<'t> {
    fn root(&self) -> Self {
        self.tree().root()
    }

    fn parent(&self) -> Option<Self> {
        self.data_parent()
    }

    fn first_child(&self) -> Option<Self> {
        self.first_data_child()
    }

    fn next_sibling(&self) -> Option<Self> {
        self.next_data_sibling()
    }

    fn attributes(&self) -> &'t [Attribute] {
        &[]
    }

    fn node_type(&self) -> NodeType {
        if self.is_root() { NodeType::Root } else { NodeType::Element }
    }

    fn name(&self) -> &'t str {
        SchemaNodeRef::name(self)
    }

    fn module(&self) -> Option<&'t Module> {
        SchemaNodeRef::module(self)
    }

    fn value(&self) -> Option<&'t str> {
        None
    }

    fn is_config(&self) -> bool {
        SchemaNodeRef::is_config(self)
    }

    fn document_position(&self) -> u32 {
        self.position()
    }

    fn when_status(&self) -> WhenStatus {
        WhenStatus::NotApplicable
    }

    fn leaf_type(&self) -> Option<&'t LeafType> {
        SchemaNodeRef::leaf_type(self)
    }

    fn schema_kind(&self) -> SchemaKind {
        self.kind()
    }

    fn schema_tree(&self) -> &'t SchemaTree {
        self.tree()
    }

    fn is_augment_target_resolved(&self) -> bool {
        self.is_augment_resolved()
    }

    fn in_rpc_output(&self) -> bool {
        self.in_output()
    }

    fn in_rpc_input(&self) -> bool {
        self.in_input()
    }

    fn path(&self) -> String {
        SchemaNodeRef::path(self)
    }
}
