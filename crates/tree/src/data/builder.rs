use super::{Attribute, DataId, DataNodeData, DataTree, WhenStatus};
use crate::TreeError;
use crate::schema::{LeafType, SchemaKind, SchemaNodeRef, SchemaTree};
use std::sync::Arc;

/// Builds a [`DataTree`] node by node, checking each node against the schema.
///
/// Nodes guarded by a `when` start out with the builder's default status
/// ([`WhenStatus::True`] unless changed with [`when_default`](Self::when_default)).
pub struct DataBuilder {
    schema: Arc<SchemaTree>,
    nodes: Vec<DataNodeData>,
    when_default: WhenStatus,
}

impl DataBuilder {
    pub fn new(schema: Arc<SchemaTree>) -> Self {
        Self {
            nodes: vec![DataNodeData::new(crate::schema::SchemaId::ROOT, None)],
            schema,
            when_default: WhenStatus::True,
        }
    }

    pub fn when_default(mut self, status: WhenStatus) -> Self {
        self.when_default = status;
        self
    }

    pub fn root(&self) -> DataId {
        DataId::ROOT
    }

    fn schema_of(&self, id: DataId) -> SchemaNodeRef<'_> {
        self.schema.node(self.nodes[id.index()].schema)
    }

    pub(crate) fn child_kind(&self, parent: DataId, module: &str, name: &str) -> Result<SchemaKind, TreeError> {
        let parent_schema = self.schema_of(parent);
        parent_schema
            .find_child(Some(module), name)
            .map(|s| s.kind())
            .ok_or_else(|| TreeError::UnknownNode {
                parent: parent_schema.path(),
                name: format!("{module}:{name}"),
            })
    }

    /// Adds a child named `name` or `module:name` under `parent`.
    pub fn add(&mut self, parent: DataId, name: &str, value: Option<&str>) -> Result<DataId, TreeError> {
        let parent_schema = self.schema_of(parent);
        let (module, local) = match name.split_once(':') {
            Some((module, local)) => (Some(module), local),
            None => (None, name),
        };
        let schema = parent_schema
            .find_child(module, local)
            .ok_or_else(|| TreeError::UnknownNode {
                parent: parent_schema.path(),
                name: name.to_string(),
            })?;
        check_value(schema, value)?;

        let when = if schema.whens_in_scope().is_empty() {
            WhenStatus::NotApplicable
        } else {
            self.when_default
        };
        let schema_id = schema.id();

        let id = DataId(self.nodes.len() as u32);
        let mut node = DataNodeData::new(schema_id, Some(parent));
        node.value = value.map(str::to_string);
        node.when = when;
        self.nodes.push(node);
        self.nodes[parent.index()].children.push(id);
        Ok(id)
    }

    pub fn add_attribute(&mut self, node: DataId, module: &str, name: &str, value: &str) {
        self.nodes[node.index()].attributes.push(Attribute {
            module: module.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn set_when(&mut self, node: DataId, status: WhenStatus) {
        self.nodes[node.index()].when = status;
    }

    fn number(&mut self, id: DataId, position: &mut u32) {
        self.nodes[id.index()].position = *position;
        *position += 1;
        let children = self.nodes[id.index()].children.clone();
        for pair in children.windows(2) {
            self.nodes[pair[0].index()].next = Some(pair[1]);
        }
        for child in children {
            self.number(child, position);
        }
    }

    pub fn build(mut self) -> DataTree {
        let mut position = 0;
        self.number(DataId::ROOT, &mut position);
        log::debug!("Built data tree with {} nodes", self.nodes.len());
        DataTree {
            schema: self.schema,
            nodes: self.nodes,
        }
    }
}

fn invalid(schema: SchemaNodeRef<'_>, message: impl Into<String>) -> TreeError {
    TreeError::InvalidValue {
        node: schema.path(),
        message: message.into(),
    }
}

fn check_value(schema: SchemaNodeRef<'_>, value: Option<&str>) -> Result<(), TreeError> {
    let kind = schema.kind();
    let Some(value) = value else {
        return match (kind, schema.leaf_type()) {
            (SchemaKind::Leaf | SchemaKind::LeafList, Some(LeafType::Empty)) => Ok(()),
            (SchemaKind::Leaf | SchemaKind::LeafList, _) => Err(invalid(schema, "missing value")),
            _ => Ok(()),
        };
    };
    if !kind.has_value() {
        return Err(invalid(schema, format!("a {kind} cannot carry a value")));
    }
    match schema.leaf_type() {
        Some(LeafType::Integer) if value.trim().parse::<i64>().is_err() => {
            Err(invalid(schema, format!("'{value}' is not an integer")))
        }
        Some(LeafType::Decimal) if value.trim().parse::<f64>().is_err() => {
            Err(invalid(schema, format!("'{value}' is not a decimal number")))
        }
        Some(LeafType::Boolean) if value != "true" && value != "false" => {
            Err(invalid(schema, format!("'{value}' is not a boolean")))
        }
        Some(LeafType::Empty) if !value.is_empty() => Err(invalid(schema, "empty leaf with a value")),
        Some(ty @ LeafType::Enumeration { .. }) if ty.enum_value(value).is_none() => {
            Err(invalid(schema, format!("'{value}' is not an enum member")))
        }
        Some(ty @ LeafType::Bits { .. }) => match value.split_whitespace().find(|b| !ty.has_bit(b)) {
            Some(bit) => Err(invalid(schema, format!("'{bit}' is not a defined bit"))),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}
