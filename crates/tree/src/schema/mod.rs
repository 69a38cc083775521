//! The compiled schema tree.
//!
//! A [`SchemaTree`] is an arena of schema nodes rooted in a synthetic document
//! root (index 0). The raw structure keeps schema-only nodes (`choice`, `case`,
//! `uses`, `augment`, `input`, `output`); the *data view* computed at build time
//! skips them, which is what instance data and XPath navigation see.

mod builder;
mod def;

pub use builder::SchemaBuilder;
pub use def::{AugmentDef, IdentityDef, ModuleDef, MustDef, NodeDef};

use serde::Deserialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of a node in a [`SchemaTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) u32);

impl SchemaId {
    /// The synthetic document root.
    pub const ROOT: SchemaId = SchemaId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a module in a [`SchemaTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaKind {
    Root,
    Container,
    List,
    Leaf,
    LeafList,
    Anydata,
    Choice,
    Case,
    Uses,
    Augment,
    Rpc,
    Action,
    Input,
    Output,
    Notification,
}

impl SchemaKind {
    /// Schema-only statements that never appear as data nodes.
    pub fn is_transparent(self) -> bool {
        matches!(
            self,
            SchemaKind::Choice
                | SchemaKind::Case
                | SchemaKind::Uses
                | SchemaKind::Augment
                | SchemaKind::Input
                | SchemaKind::Output
        )
    }

    /// Nodes whose instances carry a value (and therefore a text child).
    pub fn has_value(self) -> bool {
        matches!(self, SchemaKind::Leaf | SchemaKind::LeafList)
    }

    /// Operation and notification subtrees have no configuration semantics.
    pub fn is_operation(self) -> bool {
        matches!(
            self,
            SchemaKind::Rpc | SchemaKind::Action | SchemaKind::Notification
        )
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchemaKind::Root => "root",
            SchemaKind::Container => "container",
            SchemaKind::List => "list",
            SchemaKind::Leaf => "leaf",
            SchemaKind::LeafList => "leaf-list",
            SchemaKind::Anydata => "anydata",
            SchemaKind::Choice => "choice",
            SchemaKind::Case => "case",
            SchemaKind::Uses => "uses",
            SchemaKind::Augment => "augment",
            SchemaKind::Rpc => "rpc",
            SchemaKind::Action => "action",
            SchemaKind::Input => "input",
            SchemaKind::Output => "output",
            SchemaKind::Notification => "notification",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub namespace: String,
    pub prefix: String,
}

/// A member of an `enumeration` type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnumMember {
    pub name: String,
    #[serde(default)]
    pub value: Option<i64>,
}

/// The built-in type of a leaf or leaf-list, reduced to what XPath needs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "base", rename_all = "kebab-case")]
pub enum LeafType {
    #[default]
    String,
    Integer,
    Decimal,
    Boolean,
    Empty,
    Leafref {
        path: String,
    },
    InstanceIdentifier,
    Identityref {
        #[serde(default)]
        bases: Vec<String>,
    },
    Enumeration {
        enums: Vec<EnumMember>,
    },
    Bits {
        bits: Vec<String>,
    },
}

impl LeafType {
    /// Value of an enum member; members without an explicit value follow the
    /// previous one (starting at 0).
    pub fn enum_value(&self, name: &str) -> Option<i64> {
        let LeafType::Enumeration { enums } = self else {
            return None;
        };
        let mut next = 0i64;
        for member in enums {
            let value = member.value.unwrap_or(next);
            if member.name == name {
                return Some(value);
            }
            next = value.saturating_add(1);
        }
        None
    }

    pub fn has_bit(&self, name: &str) -> bool {
        matches!(self, LeafType::Bits { bits } if bits.iter().any(|b| b == name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Must {
    pub condition: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct When {
    pub condition: String,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub module: ModuleId,
    pub name: String,
    pub(crate) bases: Vec<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct SchemaNodeData {
    pub(crate) kind: SchemaKind,
    pub(crate) name: String,
    pub(crate) module: Option<ModuleId>,
    pub(crate) parent: Option<SchemaId>,
    pub(crate) children: Vec<SchemaId>,
    pub(crate) config: bool,
    pub(crate) musts: Vec<Must>,
    pub(crate) when: Option<When>,
    pub(crate) leaf_type: Option<LeafType>,
    pub(crate) keys: Vec<String>,
    pub(crate) augment_target: Option<SchemaId>,
    pub(crate) augment_resolved: bool,
    // Data view, filled in by the builder.
    pub(crate) data_parent: Option<SchemaId>,
    pub(crate) data_children: Vec<SchemaId>,
    pub(crate) next_data_sibling: Option<SchemaId>,
    pub(crate) position: u32,
}

impl SchemaNodeData {
    pub(crate) fn new(kind: SchemaKind, name: String, module: Option<ModuleId>) -> Self {
        Self {
            kind,
            name,
            module,
            parent: None,
            children: Vec::new(),
            config: true,
            musts: Vec::new(),
            when: None,
            leaf_type: None,
            keys: Vec::new(),
            augment_target: None,
            augment_resolved: true,
            data_parent: None,
            data_children: Vec::new(),
            next_data_sibling: None,
            position: 0,
        }
    }
}

/// An immutable, compiled set of modules.
#[derive(Debug)]
pub struct SchemaTree {
    pub(crate) modules: Vec<Module>,
    pub(crate) nodes: Vec<SchemaNodeData>,
    pub(crate) identities: Vec<Identity>,
}

impl SchemaTree {
    /// Compiles a list of module definitions given as JSON (either a single
    /// module object or an array of them).
    pub fn from_json(json: &str) -> Result<Self, crate::TreeError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::TreeError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, crate::TreeError> {
        let defs: Vec<ModuleDef> = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            other => vec![serde_json::from_value(other)?],
        };
        let mut builder = SchemaBuilder::new();
        for def in defs {
            builder.add_module(def)?;
        }
        builder.build()
    }

    pub fn root(&self) -> SchemaNodeRef<'_> {
        self.node(SchemaId::ROOT)
    }

    pub fn node(&self, id: SchemaId) -> SchemaNodeRef<'_> {
        SchemaNodeRef { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Every node in arena order, schema-only nodes included.
    pub fn iter(&self) -> impl Iterator<Item = SchemaNodeRef<'_>> {
        (0..self.nodes.len()).map(move |i| self.node(SchemaId(i as u32)))
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn module_by_name(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|m| m.name == name)
            .map(|i| ModuleId(i as u32))
    }

    /// Finds a top-level data node (`module:name`).
    pub fn find_top(&self, module: &str, name: &str) -> Option<SchemaNodeRef<'_>> {
        self.root()
            .data_children()
            .find(|n| n.name() == name && n.module_name() == Some(module))
    }

    /// Looks up an identity by module and name.
    pub fn identity(&self, module: &str, name: &str) -> Option<usize> {
        let module = self.module_by_name(module)?;
        self.identities
            .iter()
            .position(|i| i.module == module && i.name == name)
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// True if `derived` is derived (transitively) from `base`, or equal to it
    /// when `or_self` is set.
    pub fn is_derived_from(&self, derived: usize, base: usize, or_self: bool) -> bool {
        if derived == base {
            return or_self;
        }
        let mut stack = self.identities[derived].bases.clone();
        let mut seen = vec![false; self.identities.len()];
        while let Some(id) = stack.pop() {
            if id == base {
                return true;
            }
            if !seen[id] {
                seen[id] = true;
                stack.extend(self.identities[id].bases.iter().copied());
            }
        }
        false
    }

    fn data(&self, id: SchemaId) -> &SchemaNodeData {
        &self.nodes[id.index()]
    }
}

/// A borrowed handle to one schema node.
#[derive(Clone, Copy)]
pub struct SchemaNodeRef<'t> {
    tree: &'t SchemaTree,
    id: SchemaId,
}

impl PartialEq for SchemaNodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.tree, other.tree)
    }
}
impl Eq for SchemaNodeRef<'_> {}

impl Hash for SchemaNodeRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for SchemaNodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaNode({} {})", self.kind(), self.path())
    }
}

impl<'t> SchemaNodeRef<'t> {
    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn tree(&self) -> &'t SchemaTree {
        self.tree
    }

    fn data(&self) -> &'t SchemaNodeData {
        self.tree.data(self.id)
    }

    fn at(&self, id: SchemaId) -> SchemaNodeRef<'t> {
        SchemaNodeRef { tree: self.tree, id }
    }

    pub fn kind(&self) -> SchemaKind {
        self.data().kind
    }

    pub fn is_root(&self) -> bool {
        self.id == SchemaId::ROOT
    }

    pub fn name(&self) -> &'t str {
        &self.data().name
    }

    pub fn module(&self) -> Option<&'t Module> {
        self.data().module.map(|m| self.tree.module(m))
    }

    pub fn module_name(&self) -> Option<&'t str> {
        self.module().map(|m| m.name.as_str())
    }

    pub fn is_config(&self) -> bool {
        self.data().config
    }

    pub fn musts(&self) -> &'t [Must] {
        &self.data().musts
    }

    pub fn when(&self) -> Option<&'t When> {
        self.data().when.as_ref()
    }

    pub fn leaf_type(&self) -> Option<&'t LeafType> {
        self.data().leaf_type.as_ref()
    }

    pub fn keys(&self) -> &'t [String] {
        &self.data().keys
    }

    pub fn position(&self) -> u32 {
        self.data().position
    }

    /// Target of an `augment` node.
    pub fn augment_target(&self) -> Option<SchemaNodeRef<'t>> {
        self.data().augment_target.map(|id| self.at(id))
    }

    /// False for nodes contributed by an augment that has not been applied yet.
    pub fn is_augment_resolved(&self) -> bool {
        self.data().augment_resolved
    }

    /// The statement this node is defined in (may be schema-only).
    pub fn raw_parent(&self) -> Option<SchemaNodeRef<'t>> {
        self.data().parent.map(|id| self.at(id))
    }

    pub fn raw_children(&self) -> impl Iterator<Item = SchemaNodeRef<'t>> + 't {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .map(move |&id| SchemaNodeRef { tree, id })
    }

    /// Closest ancestor that is a data node (or the root).
    pub fn data_parent(&self) -> Option<SchemaNodeRef<'t>> {
        self.data().data_parent.map(|id| self.at(id))
    }

    pub fn first_data_child(&self) -> Option<SchemaNodeRef<'t>> {
        self.data().data_children.first().map(|&id| self.at(id))
    }

    pub fn next_data_sibling(&self) -> Option<SchemaNodeRef<'t>> {
        self.data().next_data_sibling.map(|id| self.at(id))
    }

    pub fn data_children(&self) -> impl Iterator<Item = SchemaNodeRef<'t>> + 't {
        let tree = self.tree;
        self.data()
            .data_children
            .iter()
            .map(move |&id| SchemaNodeRef { tree, id })
    }

    /// Finds a data child by name, matching the module when one is given.
    pub fn find_child(&self, module: Option<&str>, name: &str) -> Option<SchemaNodeRef<'t>> {
        self.data_children()
            .find(|c| c.name() == name && (module.is_none() || c.module_name() == module))
    }

    /// The `input` or `output` statement this node belongs to, if any.
    fn operation_section(&self) -> Option<SchemaKind> {
        let mut current = self.raw_parent();
        while let Some(node) = current {
            match node.kind() {
                kind @ (SchemaKind::Input | SchemaKind::Output) => return Some(kind),
                SchemaKind::Rpc | SchemaKind::Action => return None,
                _ => current = node.raw_parent(),
            }
        }
        None
    }

    /// True if the node sits in the `output` of an RPC or action.
    pub fn in_output(&self) -> bool {
        self.operation_section() == Some(SchemaKind::Output)
    }

    pub fn in_input(&self) -> bool {
        self.operation_section() == Some(SchemaKind::Input)
    }

    /// All `when` conditions guarding instances of this node: its own and the
    /// ones on schema-only ancestors up to its data parent.
    pub fn whens_in_scope(&self) -> Vec<(SchemaNodeRef<'t>, &'t When)> {
        let mut found = Vec::new();
        if let Some(when) = self.when() {
            found.push((*self, when));
        }
        let mut current = self.raw_parent();
        while let Some(node) = current {
            if !node.kind().is_transparent() {
                break;
            }
            if let Some(when) = node.when() {
                found.push((node, when));
            }
            current = if node.kind() == SchemaKind::Augment {
                node.augment_target()
            } else {
                node.raw_parent()
            };
        }
        found
    }

    /// Schema path of the node, prefixing a name whenever the module changes.
    pub fn path(&self) -> String {
        if self.is_root() {
            return "/".to_string();
        }
        let mut segments = Vec::new();
        let mut current = Some(*self);
        while let Some(node) = current {
            if node.is_root() {
                break;
            }
            if !node.kind().is_transparent() {
                segments.push(node);
            }
            current = if node.kind() == SchemaKind::Augment {
                node.augment_target()
            } else {
                node.raw_parent()
            };
        }
        let mut path = String::new();
        let mut last_module = None;
        for node in segments.iter().rev() {
            path.push('/');
            if node.module_name() != last_module {
                if let Some(module) = node.module_name() {
                    path.push_str(module);
                    path.push(':');
                }
                last_module = node.module_name();
            }
            path.push_str(node.name());
        }
        path
    }
}
