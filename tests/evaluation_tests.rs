mod common;

use common::fixtures::{THREE_INTERFACES, data, data_from, data_node, eval, strings};
use std::num::NonZeroUsize;
use yangkit::xpath::{
    ContextKind, EvalOptions, ExprCache, Outcome, Set, Unresolved, XPathError, check_musts, check_when, evaluate,
    evaluate_expr, validate,
};

#[test]
fn test_addition() {
    let data = data();
    assert_eq!(eval(&data, "1 + 1"), Set::Number(2.0));
}

#[test]
fn test_position_of_second_of_three() {
    let data = data_from(THREE_INTERFACES);
    let second = eval(&data, "/example:interfaces/interface[position() = 2]/name");
    assert_eq!(strings(&second), vec!["b"]);
    let positions = eval(&data, "/example:interfaces/interface[position() = last() - 1]/name");
    assert_eq!(strings(&positions), vec!["b"]);
}

#[test]
fn test_numeric_predicate_selects_second() {
    let data = data_from(THREE_INTERFACES);
    assert_eq!(strings(&eval(&data, "/example:interfaces/interface[2]/name")), vec!["b"]);
    assert_eq!(eval(&data, "/example:interfaces/interface[4]"), Set::Empty);
}

#[test]
fn test_count_of_nothing_is_zero() {
    let data = data();
    assert_eq!(eval(&data, "count(//nonexistent)"), Set::Number(0.0));
}

#[test]
fn test_or_of_comparisons() {
    let data = data();
    assert_eq!(eval(&data, "'a' = 'b' or 'a' = 'a'"), Set::Boolean(true));
    assert_eq!(eval(&data, "'a' = 'b' and 'a' = 'a'"), Set::Boolean(false));
}

#[test]
fn test_node_set_to_node_set_comparison() {
    let data = data_from(THREE_INTERFACES);
    // b and a share an MTU, so some pair is equal and some pair differs.
    assert_eq!(
        eval(&data, "//interface[name = 'a']/mtu = //interface/mtu"),
        Set::Boolean(true)
    );
    assert_eq!(eval(&data, "//interface/mtu != //interface/mtu"), Set::Boolean(true));
    assert_eq!(eval(&data, "sum(//mtu)"), Set::Number(12000.0));
}

#[test]
fn test_string_library() {
    let data = data();
    assert_eq!(
        eval(&data, "concat(substring-before('10.0.0.1', '.'), '-', string-length('abc'))"),
        Set::String("10-3".to_string())
    );
    assert_eq!(
        eval(&data, "normalize-space('  a   b ')"),
        Set::String("a b".to_string())
    );
    assert_eq!(
        eval(&data, "re-match(//interface[1]/name, 'eth[0-9]+')"),
        Set::Boolean(true)
    );
}

#[test]
fn test_compiled_expression_is_reusable() {
    let data = data();
    let cache = ExprCache::new(NonZeroUsize::new(8).unwrap());
    let expr = cache.get_or_parse("count(address)").unwrap();
    let counts: Vec<_> = data
        .iter()
        .filter(|n| n.name() == "interface")
        .map(|n| evaluate_expr(&expr, n, ContextKind::Element, None, EvalOptions::default()).unwrap())
        .collect();
    assert_eq!(
        counts,
        vec![
            Outcome::Complete(Set::Number(2.0)),
            Outcome::Complete(Set::Number(1.0))
        ]
    );
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_unknown_local_module() {
    let data = data();
    let err = evaluate("1", data.root(), ContextKind::Root, Some("nope"), EvalOptions::default()).unwrap_err();
    assert!(matches!(err, XPathError::UnknownModule { .. }));
}

#[test]
fn test_unknown_function_is_hard_error() {
    let data = data();
    let err = evaluate("frobnicate(1)", data.root(), ContextKind::Root, None, EvalOptions::default()).unwrap_err();
    assert!(matches!(err, XPathError::UnknownFunction { ref name, .. } if name == "frobnicate"));
}

#[test]
fn test_when_with_unresolved_dependency() {
    let schema = common::fixtures::schema();
    let mut builder = yangkit::tree::DataBuilder::new(schema);
    let root = builder.root();
    let system = builder.add(root, "example:system", None).unwrap();
    let hostname = builder.add(system, "hostname", Some("r1")).unwrap();
    builder.set_when(hostname, yangkit::tree::WhenStatus::Unresolved);
    let data = builder.build();

    let system = data_node(&data, "/example:system");
    let outcome = evaluate("hostname = 'r1'", system, ContextKind::Element, None, EvalOptions::when()).unwrap();
    assert!(matches!(
        outcome,
        Outcome::Unresolved(Unresolved::WhenDependency { .. })
    ));
    // Plain queries ignore `when` state.
    let plain = evaluate("hostname = 'r1'", system, ContextKind::Element, None, EvalOptions::default()).unwrap();
    assert_eq!(plain, Outcome::Complete(Set::Boolean(true)));
}

#[test]
fn test_validation_over_custom_data() {
    let data = data_from(
        r#"{
          "example:interfaces": { "interface": [ { "name": "lo", "mtu": 20 } ] },
          "example:system": { "hostname": "r2" }
        }"#,
    );
    let mtu = data_node(&data, "/example:interfaces/interface[name='lo']/mtu");
    assert_eq!(check_musts(mtu).unwrap().len(), 1);

    // hostname requires an interface named eth0.
    let hostname = data_node(&data, "/example:system/hostname");
    assert_eq!(check_when(hostname).unwrap(), Outcome::Complete(false));

    let messages: Vec<_> = validate(&data).unwrap().into_iter().map(|v| v.message).collect();
    assert!(messages.contains(&"MTU too small".to_string()));
    assert!(messages.iter().any(|m| m.contains("'when' condition is false")));
}
