mod common;

use common::fixtures::{schema, schema_node};
use yangkit::tree::SchemaTree;
use yangkit::xpath::{
    AtomizeOptions, ContextKind, Outcome, Unresolved, XPathError, atomize, check_syntax, find_schema_path,
    node_atomize,
};

#[test]
fn test_missing_sibling_is_forward_reference() {
    let schema = schema();
    let name = schema_node(&schema, "/example:interfaces/interface/name");
    let outcome = atomize("../sibling", name, ContextKind::Element, AtomizeOptions::default()).unwrap();
    assert!(matches!(
        outcome,
        Outcome::Unresolved(Unresolved::ForwardReference { ref name, .. }) if name == "sibling"
    ));
}

#[test]
fn test_existing_sibling_is_selected() {
    let schema = schema();
    let name = schema_node(&schema, "/example:interfaces/interface/name");
    let atomized = atomize("../mtu", name, ContextKind::Element, AtomizeOptions::must())
        .unwrap()
        .complete()
        .unwrap();
    let selected: Vec<_> = atomized.selected().map(|n| n.path()).collect();
    assert_eq!(selected, vec!["/example:interfaces/interface/mtu"]);
    assert!(atomized.contains(schema_node(&schema, "/example:interfaces/interface")));
}

#[test]
fn test_absolute_path_through_choice() {
    let schema = schema();
    let found = find_schema_path(schema.root(), "/ex:routing/ex:static-route", false).unwrap();
    let paths: Vec<_> = found.iter().map(|n| n.path()).collect();
    assert_eq!(paths, vec!["/example:routing/static-route"]);
}

#[test]
fn test_every_fixture_node_compiles_and_resolves() {
    let schema = schema();
    for node in schema.iter() {
        check_syntax(node).unwrap();
        if node.is_root() || node.kind().is_transparent() {
            continue;
        }
        let outcome = node_atomize(node, false).unwrap();
        assert!(outcome.is_complete(), "{}: {:?}", node.path(), outcome.unresolved());
    }
}

#[test]
fn test_node_atomize_merges_must_and_when() {
    let schema = schema();
    let hostname = schema_node(&schema, "/example:system/hostname");
    let set = node_atomize(hostname, false).unwrap().complete().unwrap();
    let paths: Vec<_> = set.schema_items_ref().iter().map(|a| a.node.path()).collect();
    assert!(paths.contains(&"/example:interfaces/interface/name".to_string()));

    let speed = schema_node(&schema, "/example:interfaces/interface/ext:speed");
    let set = node_atomize(speed, false).unwrap().complete().unwrap();
    let paths: Vec<_> = set.schema_items_ref().iter().map(|a| a.node.path()).collect();
    assert!(paths.contains(&"/example:interfaces/interface/type".to_string()));
}

#[test]
fn test_bad_syntax_in_schema_is_reported() {
    let schema = SchemaTree::from_json(
        r#"{"name": "m", "namespace": "urn:m", "prefix": "m", "nodes": [
            {"kind": "leaf", "name": "a", "type": {"base": "string"}, "when": "count(../b"}
        ]}"#,
    )
    .unwrap();
    let a = schema.find_top("m", "a").unwrap();
    assert!(matches!(check_syntax(a), Err(XPathError::Syntax { .. })));
}
