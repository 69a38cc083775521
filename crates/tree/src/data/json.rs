//! RFC 7951 JSON instance data loader.
//!
//! Member names are `module:name` whenever the module differs from the
//! parent's, lists and leaf-lists are arrays, `[null]` encodes an `empty` leaf,
//! and metadata is carried by `"@"` (on the enclosing object) or `"@leaf"`.

use super::{DataBuilder, DataId, DataTree};
use crate::TreeError;
use crate::schema::{SchemaKind, SchemaTree};
use serde_json::{Map, Value};
use std::sync::Arc;

pub(super) fn load(schema: Arc<SchemaTree>, value: &Value) -> Result<DataTree, TreeError> {
    let mut builder = DataBuilder::new(schema);
    let Value::Object(members) = value else {
        return Err(TreeError::InvalidJson {
            path: "/".to_string(),
            message: "top-level value must be an object".to_string(),
        });
    };
    load_members(&mut builder, DataId::ROOT, None, "", members)?;
    Ok(builder.build())
}

fn json_error(path: &str, message: impl Into<String>) -> TreeError {
    TreeError::InvalidJson {
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        message: message.into(),
    }
}

fn load_members(
    builder: &mut DataBuilder,
    parent: DataId,
    parent_module: Option<&str>,
    path: &str,
    members: &Map<String, Value>,
) -> Result<(), TreeError> {
    for (key, value) in members {
        if key.starts_with('@') {
            continue;
        }
        let (module, name) = match key.split_once(':') {
            Some((module, name)) => (module.to_string(), name),
            None => match parent_module {
                Some(module) => (module.to_string(), key.as_str()),
                None => return Err(json_error(path, format!("top-level member '{key}' needs a module"))),
            },
        };
        let qualified = format!("{module}:{name}");
        let child_path = format!("{path}/{qualified}");
        let kind = builder.child_kind(parent, &module, name)?;
        let metadata = members.get(&format!("@{key}"));

        match (kind, value) {
            (SchemaKind::List, Value::Array(entries)) => {
                for entry in entries {
                    let Value::Object(entry) = entry else {
                        return Err(json_error(&child_path, "list entry must be an object"));
                    };
                    let id = builder.add(parent, &qualified, None)?;
                    load_node_metadata(builder, id, &child_path, entry.get("@"))?;
                    load_members(builder, id, Some(&module), &child_path, entry)?;
                }
            }
            (SchemaKind::LeafList, Value::Array(entries)) => {
                for (index, entry) in entries.iter().enumerate() {
                    let id = builder.add(parent, &qualified, scalar(&child_path, entry)?.as_deref())?;
                    if let Some(Value::Array(meta)) = metadata {
                        load_node_metadata(builder, id, &child_path, meta.get(index))?;
                    }
                }
            }
            (SchemaKind::Leaf, _) => {
                let id = builder.add(parent, &qualified, scalar(&child_path, value)?.as_deref())?;
                load_node_metadata(builder, id, &child_path, metadata)?;
            }
            (SchemaKind::Container | SchemaKind::Rpc | SchemaKind::Action | SchemaKind::Notification, Value::Object(inner)) => {
                let id = builder.add(parent, &qualified, None)?;
                load_node_metadata(builder, id, &child_path, inner.get("@"))?;
                load_members(builder, id, Some(&module), &child_path, inner)?;
            }
            (SchemaKind::Anydata, _) => {
                builder.add(parent, &qualified, None)?;
            }
            (kind, _) => {
                return Err(json_error(&child_path, format!("unexpected JSON shape for a {kind}")));
            }
        }
    }
    Ok(())
}

/// Leaf value as text; `None` for the `[null]` encoding of `empty`.
fn scalar(path: &str, value: &Value) -> Result<Option<String>, TreeError> {
    match value {
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(items) if items.len() == 1 && items[0].is_null() => Ok(None),
        _ => Err(json_error(path, "expected a scalar value")),
    }
}

fn load_node_metadata(
    builder: &mut DataBuilder,
    node: DataId,
    path: &str,
    metadata: Option<&Value>,
) -> Result<(), TreeError> {
    let Some(metadata) = metadata else {
        return Ok(());
    };
    let Value::Object(entries) = metadata else {
        return Err(json_error(path, "metadata must be an object"));
    };
    for (key, value) in entries {
        let Some((module, name)) = key.split_once(':') else {
            return Err(json_error(path, format!("metadata '{key}' needs a module")));
        };
        let value = scalar(path, value)?.unwrap_or_default();
        builder.add_attribute(node, module, name, &value);
    }
    Ok(())
}
