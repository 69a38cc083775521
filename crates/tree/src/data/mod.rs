//! Instance data trees.
//!
//! A [`DataTree`] is an arena of data nodes, each bound to a schema node of a
//! shared [`SchemaTree`]. Index 0 is the synthetic document root. Trees are
//! built with a [`DataBuilder`] (or loaded from JSON) and are immutable after.

mod builder;
mod json;

pub use builder::DataBuilder;

use crate::schema::{LeafType, Module, SchemaId, SchemaKind, SchemaNodeRef, SchemaTree};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataId(pub(crate) u32);

impl DataId {
    pub const ROOT: DataId = DataId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Result of the `when` conditions guarding a data node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhenStatus {
    /// The node has no `when` in scope.
    #[default]
    NotApplicable,
    /// Not evaluated yet.
    Unresolved,
    True,
    False,
}

/// A metadata annotation on a data node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub module: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub(crate) struct DataNodeData {
    pub(crate) schema: SchemaId,
    pub(crate) parent: Option<DataId>,
    pub(crate) children: Vec<DataId>,
    pub(crate) next: Option<DataId>,
    pub(crate) value: Option<String>,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) when: WhenStatus,
    pub(crate) position: u32,
}

impl DataNodeData {
    pub(crate) fn new(schema: SchemaId, parent: Option<DataId>) -> Self {
        Self {
            schema,
            parent,
            children: Vec::new(),
            next: None,
            value: None,
            attributes: Vec::new(),
            when: WhenStatus::NotApplicable,
            position: 0,
        }
    }
}

/// An immutable instance data tree.
#[derive(Debug)]
pub struct DataTree {
    pub(crate) schema: Arc<SchemaTree>,
    pub(crate) nodes: Vec<DataNodeData>,
}

impl DataTree {
    /// Loads RFC 7951 JSON instance data.
    pub fn from_json(schema: Arc<SchemaTree>, json: &str) -> Result<Self, crate::TreeError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        json::load(schema, &value)
    }

    pub fn from_file(schema: Arc<SchemaTree>, path: impl AsRef<std::path::Path>) -> Result<Self, crate::TreeError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(schema, &json)
    }

    pub fn from_value(
        schema: Arc<SchemaTree>,
        value: &serde_json::Value,
    ) -> Result<Self, crate::TreeError> {
        json::load(schema, value)
    }

    pub fn schema(&self) -> &SchemaTree {
        &self.schema
    }

    pub fn schema_arc(&self) -> &Arc<SchemaTree> {
        &self.schema
    }

    pub fn root(&self) -> DataNodeRef<'_> {
        self.node(DataId::ROOT)
    }

    pub fn node(&self, id: DataId) -> DataNodeRef<'_> {
        DataNodeRef { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Every node in document order, root first.
    pub fn iter(&self) -> impl Iterator<Item = DataNodeRef<'_>> {
        let mut order: Vec<DataId> = (0..self.nodes.len() as u32).map(DataId).collect();
        order.sort_by_key(|id| self.nodes[id.index()].position);
        order.into_iter().map(move |id| self.node(id))
    }
}

/// A borrowed handle to one data node.
#[derive(Clone, Copy)]
pub struct DataNodeRef<'t> {
    tree: &'t DataTree,
    id: DataId,
}

impl PartialEq for DataNodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.tree, other.tree)
    }
}
impl Eq for DataNodeRef<'_> {}

impl Hash for DataNodeRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DataNodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "DataNode({} = {:?})", self.path(), value),
            None => write!(f, "DataNode({})", self.path()),
        }
    }
}

impl<'t> DataNodeRef<'t> {
    pub fn id(&self) -> DataId {
        self.id
    }

    pub fn tree(&self) -> &'t DataTree {
        self.tree
    }

    fn data(&self) -> &'t DataNodeData {
        &self.tree.nodes[self.id.index()]
    }

    fn at(&self, id: DataId) -> DataNodeRef<'t> {
        DataNodeRef { tree: self.tree, id }
    }

    pub fn is_root(&self) -> bool {
        self.id == DataId::ROOT
    }

    pub fn schema(&self) -> SchemaNodeRef<'t> {
        let schema: &'t SchemaTree = &self.tree.schema;
        schema.node(self.data().schema)
    }

    pub fn kind(&self) -> SchemaKind {
        self.schema().kind()
    }

    pub fn name(&self) -> &'t str {
        self.schema().name()
    }

    pub fn module(&self) -> Option<&'t Module> {
        self.schema().module()
    }

    pub fn module_name(&self) -> Option<&'t str> {
        self.schema().module_name()
    }

    pub fn value(&self) -> Option<&'t str> {
        self.data().value.as_deref()
    }

    pub fn leaf_type(&self) -> Option<&'t LeafType> {
        self.schema().leaf_type()
    }

    pub fn is_config(&self) -> bool {
        self.schema().is_config()
    }

    pub fn when_status(&self) -> WhenStatus {
        self.data().when
    }

    pub fn attributes(&self) -> &'t [Attribute] {
        &self.data().attributes
    }

    pub fn position(&self) -> u32 {
        self.data().position
    }

    pub fn parent(&self) -> Option<DataNodeRef<'t>> {
        self.data().parent.map(|id| self.at(id))
    }

    pub fn first_child(&self) -> Option<DataNodeRef<'t>> {
        self.data().children.first().map(|&id| self.at(id))
    }

    pub fn next_sibling(&self) -> Option<DataNodeRef<'t>> {
        self.data().next.map(|id| self.at(id))
    }

    pub fn children(&self) -> impl Iterator<Item = DataNodeRef<'t>> + 't {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .map(move |&id| DataNodeRef { tree, id })
    }

    /// First child with the given name (and module, when given).
    pub fn find_child(&self, module: Option<&str>, name: &str) -> Option<DataNodeRef<'t>> {
        self.children()
            .find(|c| c.name() == name && (module.is_none() || c.module_name() == module))
    }

    /// Data path with list keys as predicates, e.g. `/ex:a/b[name='x']`.
    pub fn path(&self) -> String {
        if self.is_root() {
            return "/".to_string();
        }
        let mut nodes = Vec::new();
        let mut current = Some(*self);
        while let Some(node) = current {
            if node.is_root() {
                break;
            }
            nodes.push(node);
            current = node.parent();
        }
        let mut path = String::new();
        let mut last_module = None;
        for node in nodes.iter().rev() {
            path.push('/');
            if node.module_name() != last_module {
                if let Some(module) = node.module_name() {
                    path.push_str(module);
                    path.push(':');
                }
                last_module = node.module_name();
            }
            path.push_str(node.name());
            for key in node.schema().keys() {
                if let Some(value) = node.find_child(None, key).and_then(|k| k.value()) {
                    path.push_str(&format!("[{key}='{value}']"));
                }
            }
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures;

    #[test]
    fn test_navigation_follows_insertion_order() {
        let data = fixtures::data();
        let interfaces = data.root().first_child().unwrap();
        assert_eq!(interfaces.name(), "interfaces");
        let first = interfaces.first_child().unwrap();
        let second = first.next_sibling().unwrap();
        assert_eq!(first.find_child(None, "name").unwrap().value(), Some("eth0"));
        assert_eq!(second.find_child(None, "name").unwrap().value(), Some("eth1"));
        assert_eq!(second.parent().unwrap(), interfaces);
        assert_eq!(interfaces.parent().unwrap(), data.root());
    }

    #[test]
    fn test_positions_are_preorder() {
        let data = fixtures::data();
        let positions: Vec<u32> = data.iter().map(|n| n.position()).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
        assert_eq!(data.root().position(), 0);
    }

    #[test]
    fn test_path_includes_keys() {
        let data = fixtures::data();
        let mtu = data
            .root()
            .first_child()
            .and_then(|i| i.first_child())
            .and_then(|i| i.find_child(None, "mtu"))
            .unwrap();
        assert_eq!(mtu.path(), "/example:interfaces/interface[name='eth0']/mtu");
    }
}
