mod common;

use common::fixtures::{data, eval};
use yangkit::tree::DataNodeRef;
use yangkit::xpath::{ContextKind, EvalOptions, Expr, Set, SetType, evaluate_expr, parse_expr};

/// Equality that treats two NaNs as the same value.
fn same(a: &Set<DataNodeRef<'_>>, b: &Set<DataNodeRef<'_>>) -> bool {
    match (a, b) {
        (Set::Number(x), Set::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a == b,
    }
}

fn is_document_ordered(set: &Set<DataNodeRef<'_>>) -> bool {
    set.items().windows(2).all(|pair| pair[0].pos < pair[1].pos)
}

#[test]
fn test_parsing_twice_is_identical() {
    let data = data();
    for text in [
        "count(/example:interfaces/interface[enabled = 'true' and mtu > 1000])",
        "../name | ../type",
        "-(1 + 2) * 3 div 4 mod 5",
        "//interface[derived-from-or-self(type, 'ex:ethernet')][last()]/name",
    ] {
        let first = parse_expr(text).unwrap();
        let second = parse_expr(text).unwrap();
        assert_eq!(first, second, "{text}");
        assert_eq!(first.tokens(), second.tokens());

        let run = |expr: &Expr| evaluate_expr(expr, data.root(), ContextKind::Root, None, EvalOptions::default());
        assert_eq!(run(&first).unwrap(), run(&second).unwrap(), "{text}");
    }
}

#[test]
fn test_cast_is_idempotent() {
    let data = data();
    let values = vec![
        Set::Empty,
        eval(&data, "//address"),
        eval(&data, "//mtu"),
        Set::Boolean(true),
        Set::Boolean(false),
        Set::Number(0.0),
        Set::Number(-2.5),
        Set::Number(f64::NAN),
        Set::Number(f64::INFINITY),
        Set::String(String::new()),
        Set::String("1500".to_string()),
        Set::String("abc".to_string()),
    ];
    for value in values {
        for target in [SetType::Boolean, SetType::Number, SetType::String] {
            let mut once = value.clone();
            once.cast(target).unwrap();
            let mut twice = once.clone();
            twice.cast(target).unwrap();
            assert!(same(&once, &twice), "{value:?} as {target:?}: {once:?} vs {twice:?}");
        }
        if value.is_node_set() {
            let mut node_set = value.clone();
            node_set.cast(SetType::NodeSet).unwrap();
            assert_eq!(node_set, value);
        } else {
            assert!(value.clone().cast(SetType::NodeSet).is_err());
        }
    }
}

#[test]
fn test_union_laws() {
    let data = data();
    let a = eval(&data, "//address");
    let b = eval(&data, "/example:interfaces/interface[1]/*");
    let c = eval(&data, "//mtu | /example:system");

    let ab = a.clone().union(b.clone()).unwrap();
    let ba = b.clone().union(a.clone()).unwrap();
    assert_eq!(ab, ba);

    let ab_c = ab.clone().union(c.clone()).unwrap();
    let a_bc = a.clone().union(b.clone().union(c.clone()).unwrap()).unwrap();
    assert_eq!(ab_c, a_bc);

    assert_eq!(a.clone().union(a.clone()).unwrap(), a);
    assert_eq!(a.clone().union(Set::Empty).unwrap(), a);

    for set in [&ab, &ab_c] {
        assert!(is_document_ordered(set));
    }
    // The addresses of eth0 are in both operands.
    assert_eq!(ab.items().len(), a.items().len() + b.items().len() - 2);
}

#[test]
fn test_union_of_scalars_is_type_error() {
    assert!(Set::<DataNodeRef<'static>>::Number(1.0).union(Set::Empty).is_err());
    assert!(Set::<DataNodeRef<'static>>::Empty.union(Set::String("x".to_string())).is_err());
}

#[test]
fn test_nan_equality() {
    let data = data();
    assert_eq!(eval(&data, "number('abc') = number('abc')"), Set::Boolean(false));
    assert_eq!(eval(&data, "number('abc') != number('abc')"), Set::Boolean(true));
    assert_eq!(eval(&data, "0 div 0 < 1 or 0 div 0 >= 1"), Set::Boolean(false));
}
