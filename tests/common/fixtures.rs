use std::sync::Arc;
use yangkit::tree::{DataNodeRef, DataTree, SchemaNodeRef, SchemaTree, fixtures};
use yangkit::xpath::{ContextKind, EvalOptions, Outcome, Set, evaluate};

/// Three interfaces named `a`, `b` and `c`.
pub const THREE_INTERFACES: &str = r#"{
  "example:interfaces": {
    "interface": [
      { "name": "a", "mtu": 1500 },
      { "name": "b", "mtu": 1500 },
      { "name": "c", "mtu": 9000 }
    ]
  }
}"#;

pub fn data() -> DataTree {
    fixtures::data()
}

pub fn data_from(json: &str) -> DataTree {
    DataTree::from_json(fixtures::schema(), json).expect("test data is valid")
}

pub fn schema() -> Arc<SchemaTree> {
    fixtures::schema()
}

pub fn data_node<'t>(tree: &'t DataTree, path: &str) -> DataNodeRef<'t> {
    tree.iter()
        .find(|n| n.path() == path)
        .unwrap_or_else(|| panic!("no data node at {path}"))
}

pub fn schema_node<'t>(tree: &'t SchemaTree, path: &str) -> SchemaNodeRef<'t> {
    tree.iter()
        .find(|n| n.path() == path && !n.kind().is_transparent())
        .unwrap_or_else(|| panic!("no schema node at {path}"))
}

/// Evaluates `expr` from the document root with no restriction.
pub fn eval<'t>(tree: &'t DataTree, expr: &str) -> Set<DataNodeRef<'t>> {
    match evaluate(expr, tree.root(), ContextKind::Root, None, EvalOptions::default()) {
        Ok(Outcome::Complete(set)) => set,
        other => panic!("'{expr}' did not complete: {other:?}"),
    }
}

pub fn strings(set: &Set<DataNodeRef<'_>>) -> Vec<String> {
    set.items().iter().map(|i| i.string_value()).collect()
}
