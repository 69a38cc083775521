//! Entry points: evaluation over data, atomization over the schema, and the
//! schema-level helpers built on them.

use crate::adapter::{NodeType, TreeNode};
use crate::error::{Halt, Outcome, Unresolved, XPathError};
use crate::eval::{Evaluator, Mode};
use crate::options::{AtomizeOptions, ContextKind, EvalOptions, Restriction};
use crate::set::{InContext, NodeItem, NodeKind, RootKind, SchemaItem, Set};
use crate::token::Expr;
use yangkit_tree::{DataNodeRef, LeafType, Module, SchemaKind, SchemaNodeRef};

/// Result of atomizing an expression over the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Atomized<'t> {
    /// Every schema node the expression touches; the ones still `Active`
    /// are what a path expression selects.
    pub atoms: Vec<SchemaItem<SchemaNodeRef<'t>>>,
    /// The context node actually used (a `when` on a schema-only node moves
    /// up to the nearest data node).
    pub context: SchemaNodeRef<'t>,
    pub context_kind: ContextKind,
}

impl<'t> Atomized<'t> {
    pub fn nodes(&self) -> impl Iterator<Item = SchemaNodeRef<'t>> + '_ {
        self.atoms.iter().map(|a| a.node)
    }

    /// Nodes left in context.
    pub fn selected(&self) -> impl Iterator<Item = SchemaNodeRef<'t>> + '_ {
        self.atoms
            .iter()
            .filter(|a| a.in_ctx == InContext::Active)
            .map(|a| a.node)
    }

    pub fn contains(&self, node: SchemaNodeRef<'t>) -> bool {
        self.atoms.iter().any(|a| a.node == node)
    }
}

/// Compiles `text` without evaluating it.
pub fn parse_expr(text: &str) -> Result<Expr, XPathError> {
    Expr::parse(text)
}

// --- Evaluation ---

/// Evaluates `expr` with `context` as the context node.
///
/// `local_module` names the module unprefixed name tests belong to; with
/// `None` they match any module.
pub fn evaluate<'t, N: TreeNode<'t>>(
    expr: &str,
    context: N,
    context_kind: ContextKind,
    local_module: Option<&str>,
    options: EvalOptions,
) -> Result<Outcome<Set<N>>, XPathError> {
    let expr = Expr::parse(expr)?;
    evaluate_expr(&expr, context, context_kind, local_module, options)
}

pub fn evaluate_expr<'t, N: TreeNode<'t>>(
    expr: &Expr,
    context: N,
    context_kind: ContextKind,
    local_module: Option<&str>,
    options: EvalOptions,
) -> Result<Outcome<Set<N>>, XPathError> {
    let local = local_module
        .map(|name| {
            find_module(context.schema_tree().modules(), name).ok_or_else(|| XPathError::UnknownModule {
                name: name.to_string(),
                offset: 0,
            })
        })
        .transpose()?;
    let root_kind = root_kind(context, options.restriction);
    let item = context_item(context, context_kind, root_kind);
    log::debug!("Evaluating '{}' from {}", expr, context.label());

    let evaluator = Evaluator::new(
        expr,
        Mode::Evaluate,
        item,
        root_kind,
        local,
        options.restriction,
        false,
    );
    settle(evaluator.run(Set::Nodes(vec![item])).map(|(set, _)| set))
}

// --- Atomization ---

/// Lists the schema nodes `expr` can touch when evaluated from `context`.
///
/// A name test that matches nothing is reported as
/// [`Unresolved::ForwardReference`]; hard errors take precedence.
pub fn atomize<'t>(
    expr: &str,
    context: SchemaNodeRef<'t>,
    context_kind: ContextKind,
    options: AtomizeOptions,
) -> Result<Outcome<Atomized<'t>>, XPathError> {
    let expr = Expr::parse(expr)?;
    atomize_expr(&expr, context, context_kind, options)
}

pub fn atomize_expr<'t>(
    expr: &Expr,
    context: SchemaNodeRef<'t>,
    context_kind: ContextKind,
    options: AtomizeOptions,
) -> Result<Outcome<Atomized<'t>>, XPathError> {
    let (atomized, unresolved) = atomize_inner(expr, context, context_kind, options)?;
    Ok(match unresolved {
        Some(status) => Outcome::Unresolved(status),
        None => Outcome::Complete(atomized),
    })
}

fn atomize_inner<'t>(
    expr: &Expr,
    context: SchemaNodeRef<'t>,
    context_kind: ContextKind,
    options: AtomizeOptions,
) -> Result<(Atomized<'t>, Option<Unresolved>), XPathError> {
    let local = context.module();
    let (context, context_kind) = match options.restriction {
        Restriction::When => when_context(context, context_kind),
        _ => (context, context_kind),
    };
    let root_kind = root_kind(context, options.restriction);
    let item = context_item(context, context_kind, root_kind);
    log::debug!("Atomizing '{}' from {}", expr, context.path());

    let evaluator = Evaluator::new(
        expr,
        Mode::Atomize,
        item,
        root_kind,
        local,
        options.restriction,
        options.output,
    );
    let initial = Set::Schema(vec![SchemaItem {
        node: item.node,
        kind: item.kind,
        in_ctx: InContext::Active,
    }]);
    let (set, unresolved) = match evaluator.run(initial) {
        Ok(done) => done,
        Err(Halt::Fail(err)) => return Err(err),
        Err(Halt::WhenDependency(node)) => (Set::Schema(Vec::new()), Some(Unresolved::WhenDependency { node })),
    };
    let atomized = Atomized {
        atoms: set.schema_items_ref().to_vec(),
        context,
        context_kind,
    };
    Ok((atomized, unresolved))
}

/// A `when` on a schema-only node is evaluated from the closest data node
/// above it, which may be the document root.
fn when_context(node: SchemaNodeRef<'_>, kind: ContextKind) -> (SchemaNodeRef<'_>, ContextKind) {
    let mut current = node;
    while current.kind().is_transparent() {
        let next = match current.kind() {
            SchemaKind::Augment => current.augment_target(),
            _ => current.raw_parent(),
        };
        match next {
            Some(parent) => current = parent,
            None => return (node.tree().root(), ContextKind::Root),
        }
    }
    if current.is_root() {
        (current, ContextKind::Root)
    } else if current == node {
        (current, kind)
    } else {
        (current, ContextKind::Element)
    }
}

/// Atomizes every `must` and `when` of `node` into one schema set.
///
/// With `warn_on_fwd_ref` a forward reference is logged and the remaining
/// expressions are still atomized; otherwise it is returned as the outcome.
pub fn node_atomize<'t>(
    node: SchemaNodeRef<'t>,
    warn_on_fwd_ref: bool,
) -> Result<Outcome<Set<SchemaNodeRef<'t>>>, XPathError> {
    let output = node.in_output();
    let mut merged = Set::Schema(Vec::new());

    let musts = node.musts().iter().map(|must| {
        (
            must.condition.as_str(),
            node,
            AtomizeOptions {
                restriction: Restriction::Must,
                output,
            },
        )
    });
    let whens = node.whens_in_scope().into_iter().map(|(owner, when)| {
        (
            when.condition.as_str(),
            owner,
            AtomizeOptions {
                restriction: Restriction::When,
                output,
            },
        )
    });

    for (condition, owner, options) in musts.chain(whens) {
        let expr = Expr::parse(condition)?;
        let (atomized, unresolved) = atomize_inner(&expr, owner, ContextKind::Element, options)?;
        if let Some(status) = unresolved {
            if !warn_on_fwd_ref {
                return Ok(Outcome::Unresolved(status));
            }
            log::warn!("Expression '{}' on {}: {}", condition, node.path(), status);
        }
        merged.merge_atoms(Set::Schema(atomized.atoms));
    }
    Ok(Outcome::Complete(merged))
}

/// Compiles every expression `node` carries: its `must` and `when`
/// conditions and a leafref `path`.
pub fn check_syntax(node: SchemaNodeRef<'_>) -> Result<(), XPathError> {
    for must in node.musts() {
        Expr::parse(&must.condition)?;
    }
    if let Some(when) = node.when() {
        Expr::parse(&when.condition)?;
    }
    if let Some(LeafType::Leafref { path }) = node.leaf_type() {
        Expr::parse(path)?;
    }
    Ok(())
}

// --- Path lookups ---

/// Data nodes selected by `expr` from `node`.
pub fn find_path<'t>(node: DataNodeRef<'t>, expr: &str) -> Result<Vec<DataNodeRef<'t>>, XPathError> {
    match evaluate(expr, node, ContextKind::Element, None, EvalOptions::default())? {
        Outcome::Complete(set) if set.is_node_set() => Ok(set.nodes()),
        Outcome::Complete(set) => Err(XPathError::Type(format!(
            "'{expr}' evaluates to a {}, not a node-set",
            set.type_name()
        ))),
        Outcome::Unresolved(_) => Ok(Vec::new()),
    }
}

/// Schema nodes `expr` leads to from `node`.
pub fn find_schema_path<'t>(
    node: SchemaNodeRef<'t>,
    expr: &str,
    output: bool,
) -> Result<Vec<SchemaNodeRef<'t>>, XPathError> {
    let expr = Expr::parse(expr)?;
    let options = AtomizeOptions {
        restriction: Restriction::None,
        output,
    };
    let (atomized, unresolved) = atomize_inner(&expr, node, ContextKind::Element, options)?;
    if let Some(status) = unresolved {
        log::debug!("Schema path '{}' from {}: {}", expr, node.path(), status);
    }
    Ok(atomized.selected().filter(|n| !n.is_root()).collect())
}

// --- Helpers ---

pub(crate) fn find_module<'t>(modules: &'t [Module], name: &str) -> Option<&'t Module> {
    modules
        .iter()
        .find(|m| m.name == name)
        .or_else(|| modules.iter().find(|m| m.prefix == name))
}

/// With a `must`/`when` restriction a configuration node sees only the
/// configuration datastore.
fn root_kind<'t, N: TreeNode<'t>>(context: N, restriction: Restriction) -> RootKind {
    if restriction.is_constraint() && context.is_config() {
        RootKind::Config
    } else {
        RootKind::State
    }
}

fn context_item<'t, N: TreeNode<'t>>(context: N, kind: ContextKind, root_kind: RootKind) -> NodeItem<N> {
    match kind {
        ContextKind::Root => NodeItem::new(context.root(), NodeKind::Root(root_kind)),
        _ if context.node_type() == NodeType::Root => NodeItem::new(context, NodeKind::Root(root_kind)),
        ContextKind::Element => NodeItem::new(context, NodeKind::Element),
        ContextKind::Text => NodeItem::new(context, NodeKind::Text),
    }
}

fn settle<T>(result: Result<T, Halt>) -> Result<Outcome<T>, XPathError> {
    match result {
        Ok(value) => Ok(Outcome::Complete(value)),
        Err(Halt::WhenDependency(node)) => Ok(Outcome::Unresolved(Unresolved::WhenDependency { node })),
        Err(Halt::Fail(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yangkit_tree::{DataBuilder, DataId, DataTree, SchemaTree, WhenStatus, fixtures};

    fn eval<'t>(tree: &'t DataTree, expr: &str) -> Set<DataNodeRef<'t>> {
        evaluate(expr, tree.root(), ContextKind::Root, None, EvalOptions::default())
            .unwrap()
            .complete()
            .unwrap()
    }

    fn eval_from<'t>(node: DataNodeRef<'t>, expr: &str, options: EvalOptions) -> Outcome<Set<DataNodeRef<'t>>> {
        evaluate(expr, node, ContextKind::Element, None, options).unwrap()
    }

    fn strings(set: &Set<DataNodeRef<'_>>) -> Vec<String> {
        set.items().iter().map(|i| i.string_value()).collect()
    }

    fn data_node<'t>(tree: &'t DataTree, path: &str) -> DataNodeRef<'t> {
        tree.iter().find(|n| n.path() == path).unwrap()
    }

    fn schema_node<'t>(tree: &'t SchemaTree, path: &str) -> SchemaNodeRef<'t> {
        tree.iter()
            .find(|n| n.path() == path && !n.kind().is_transparent())
            .unwrap()
    }

    fn selected(outcome: Outcome<Atomized<'_>>) -> Vec<String> {
        outcome.complete().unwrap().selected().map(|n| n.path()).collect()
    }

    // --- Evaluation ---

    #[test]
    fn test_arithmetic() {
        let data = fixtures::data();
        assert_eq!(eval(&data, "1 + 1"), Set::Number(2.0));
        assert_eq!(eval(&data, "7 mod 3 * 2 - -1"), Set::Number(3.0));
        assert_eq!(eval(&data, "1 div 0"), Set::Number(f64::INFINITY));
    }

    #[test]
    fn test_position_and_numeric_predicates() {
        let data = fixtures::data();
        let by_position = eval(&data, "/example:interfaces/interface[position() = 2]/name");
        assert_eq!(strings(&by_position), vec!["eth1"]);
        let numeric = eval(&data, "/example:interfaces/interface[2]/name");
        assert_eq!(strings(&numeric), vec!["eth1"]);
        let last = eval(&data, "/example:interfaces/interface[name = 'eth0']/address[last()]");
        assert_eq!(strings(&last), vec!["10.0.0.2"]);
    }

    #[test]
    fn test_predicates_are_per_context_node() {
        let data = fixtures::data();
        let first = eval(&data, "/example:interfaces/interface/address[1]");
        assert_eq!(strings(&first), vec!["10.0.0.1", "10.0.1.1"]);
    }

    #[test]
    fn test_count_nonexistent() {
        let data = fixtures::data();
        assert_eq!(eval(&data, "count(//nonexistent)"), Set::Number(0.0));
        assert_eq!(eval(&data, "count(//address)"), Set::Number(3.0));
    }

    #[test]
    fn test_boolean_short_circuit() {
        let data = fixtures::data();
        assert_eq!(eval(&data, "'a' = 'b' or 'a' = 'a'"), Set::Boolean(true));
        assert_eq!(eval(&data, "false() and count(1)"), Set::Boolean(false));
    }

    #[test]
    fn test_skipped_operand_does_not_resolve_modules() {
        let data = fixtures::data();
        assert_eq!(eval(&data, "false() and /nope:x"), Set::Boolean(false));
        assert_eq!(eval(&data, "true() or //nope:x[nope:y]"), Set::Boolean(true));
        let err = evaluate("true() and /nope:x", data.root(), ContextKind::Root, None, EvalOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            XPathError::UnknownModule {
                name: "nope".to_string(),
                offset: 12
            }
        );
    }

    #[test]
    fn test_nan_comparisons() {
        let data = fixtures::data();
        assert_eq!(eval(&data, "number('x') = number('x')"), Set::Boolean(false));
        assert_eq!(eval(&data, "number('x') != number('x')"), Set::Boolean(true));
    }

    #[test]
    fn test_node_set_comparisons_are_existential() {
        let data = fixtures::data();
        assert_eq!(eval(&data, "//address = '10.0.1.1'"), Set::Boolean(true));
        assert_eq!(eval(&data, "//address != '10.0.1.1'"), Set::Boolean(true));
        assert_eq!(eval(&data, "//mtu > 8000"), Set::Boolean(true));
        assert_eq!(eval(&data, "//mtu > 9000"), Set::Boolean(false));
    }

    #[test]
    fn test_union_is_in_document_order() {
        let data = fixtures::data();
        let set = eval(&data, "/example:system | /example:interfaces | /example:system");
        let names: Vec<_> = set.nodes().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["interfaces", "system"]);
    }

    #[test]
    fn test_attributes() {
        let data = fixtures::data();
        let origin = eval(&data, "/example:interfaces/interface[1]/@ietf-origin:origin");
        assert_eq!(strings(&origin), vec!["intended"]);
        assert_eq!(eval(&data, "count(//@*)"), Set::Number(2.0));
        assert_eq!(eval(&data, "count(//mtu/@origin)"), Set::Number(1.0));
    }

    #[test]
    fn test_text_nodes() {
        let data = fixtures::data();
        let text = eval(&data, "/example:system/hostname/text()");
        assert_eq!(strings(&text), vec!["r1"]);
        assert_eq!(eval(&data, "string(/example:system)"), Set::String("r1".to_string()));
    }

    #[test]
    fn test_current_and_deref() {
        let data = fixtures::data();
        let default_if = data_node(&data, "/example:routing/default-interface");
        let by_current = eval_from(
            default_if,
            "/example:interfaces/interface[name = current()]/mtu",
            EvalOptions::default(),
        );
        assert_eq!(strings(&by_current.complete().unwrap()), vec!["9000"]);

        let by_deref = eval_from(default_if, "deref(.)/../mtu", EvalOptions::default());
        assert_eq!(strings(&by_deref.complete().unwrap()), vec!["9000"]);

        let next_hop = data_node(&data, "/example:routing/next-hop");
        let target = eval_from(next_hop, "deref(.)", EvalOptions::default());
        assert_eq!(strings(&target.complete().unwrap()), vec!["1500"]);
    }

    #[test]
    fn test_identity_functions() {
        let data = fixtures::data();
        let derived = eval(&data, "/example:interfaces/interface[derived-from(type, 'ex:ethernet')]/name");
        assert_eq!(strings(&derived), vec!["eth1"]);
        let or_self = eval(
            &data,
            "/example:interfaces/interface[derived-from-or-self(type, 'example:ethernet')]/name",
        );
        assert_eq!(strings(&or_self), vec!["eth0", "eth1"]);
        let err = evaluate(
            "derived-from(//type, 'ex:token-ring')",
            data.root(),
            ContextKind::Root,
            None,
            EvalOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, XPathError::Type(_)));
    }

    #[test]
    fn test_enum_and_bits() {
        let data = fixtures::data();
        let status = "/example:interfaces/interface[name = 'eth1']/oper-status";
        assert_eq!(eval(&data, &format!("enum-value({status})")), Set::Number(2.0));
        assert_eq!(
            eval(&data, "bit-is-set(/example:interfaces/interface[1]/flags, 'broadcast')"),
            Set::Boolean(true)
        );
        assert_eq!(
            eval(&data, "bit-is-set(/example:interfaces/interface[1]/flags, 'loopback')"),
            Set::Boolean(false)
        );
        match eval(&data, "enum-value(/example:system)") {
            Set::Number(n) => assert!(n.is_nan()),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_string_functions() {
        let data = fixtures::data();
        assert_eq!(
            eval(&data, "concat(name(/example:system), '-', local-name(/example:system))"),
            Set::String("example:system-system".to_string())
        );
        assert_eq!(
            eval(&data, "namespace-uri(//ext:speed)"),
            Set::String("urn:ext".to_string())
        );
        assert_eq!(
            eval(&data, "normalize-space('  a   b ')"),
            Set::String("a b".to_string())
        );
        assert_eq!(
            eval(&data, r"re-match('10.0.0.1', '\d+(\.\d+){3}')"),
            Set::Boolean(true)
        );
        assert_eq!(eval(&data, "sum(//mtu)"), Set::Number(10500.0));
        assert_eq!(eval(&data, "round(-0.5) = 0"), Set::Boolean(true));
    }

    #[test]
    fn test_type_errors() {
        let data = fixtures::data();
        let root = data.root();
        for expr in ["count(1)", "1/a", "(1)[1]", "1 | //mtu"] {
            let err = evaluate(expr, root, ContextKind::Root, None, EvalOptions::default()).unwrap_err();
            assert!(matches!(err, XPathError::Type(_)), "{expr}: {err}");
        }
        let err = evaluate("/foo:bar", root, ContextKind::Root, None, EvalOptions::default()).unwrap_err();
        assert!(matches!(err, XPathError::UnknownModule { .. }));
    }

    #[test]
    fn test_local_module_scopes_unprefixed_names() {
        let data = fixtures::data();
        let count = |module| {
            evaluate("count(interfaces)", data.root(), ContextKind::Root, Some(module), EvalOptions::default())
                .unwrap()
                .complete()
                .unwrap()
        };
        assert_eq!(count("example"), Set::Number(1.0));
        assert_eq!(count("ext"), Set::Number(0.0));
    }

    #[test]
    fn test_constraints_hide_state_data() {
        let data = fixtures::data();
        let mtu = data_node(&data, "/example:interfaces/interface[name='eth0']/mtu");
        let expr = "count(/example:interfaces/interface/oper-status)";
        let plain = eval_from(mtu, expr, EvalOptions::default()).complete().unwrap();
        assert_eq!(plain, Set::Number(2.0));
        let must = eval_from(mtu, expr, EvalOptions::must()).complete().unwrap();
        assert_eq!(must, Set::Number(0.0));
    }

    #[test]
    fn test_when_dependency() {
        let mut builder = DataBuilder::new(fixtures::schema()).when_default(WhenStatus::Unresolved);
        let system = builder.add(DataId::ROOT, "example:system", None).unwrap();
        builder.add(system, "hostname", Some("r1")).unwrap();
        builder.add(system, "contact", Some("noc")).unwrap();
        let data = builder.build();
        let system = data.node(system);

        let outcome = eval_from(system, "hostname", EvalOptions::when());
        assert_eq!(
            outcome,
            Outcome::Unresolved(Unresolved::WhenDependency {
                node: "/example:system/hostname".to_string()
            })
        );
        // Nodes without a pending `when` are reachable.
        let contact = eval_from(system, "contact", EvalOptions::when()).complete().unwrap();
        assert_eq!(strings(&contact), vec!["noc"]);
        // Without the restriction the pending status does not matter.
        assert!(eval_from(system, "hostname", EvalOptions::default()).is_complete());

        let mut builder = DataBuilder::new(fixtures::schema());
        let system = builder.add(DataId::ROOT, "example:system", None).unwrap();
        let hostname_false = builder.add(system, "hostname", Some("r1")).unwrap();
        builder.set_when(hostname_false, WhenStatus::False);
        let data = builder.build();
        let outcome = eval_from(data.node(system), "count(hostname)", EvalOptions::when());
        assert_eq!(outcome, Outcome::Complete(Set::Number(0.0)));
    }

    #[test]
    fn test_find_path() {
        let data = fixtures::data();
        let names = find_path(data.root(), "/example:interfaces/interface/name").unwrap();
        let values: Vec<_> = names.iter().filter_map(|n| n.value()).collect();
        assert_eq!(values, vec!["eth0", "eth1"]);
        assert!(find_path(data.root(), "1 + 1").is_err());
    }

    // --- Atomization ---

    #[test]
    fn test_atomize_relative_path() {
        let schema = fixtures::schema();
        let mtu = schema_node(&schema, "/example:interfaces/interface/mtu");
        let outcome = atomize("../name", mtu, ContextKind::Element, AtomizeOptions::default()).unwrap();
        let atomized = outcome.complete().unwrap();
        let selected: Vec<_> = atomized.selected().map(|n| n.path()).collect();
        assert_eq!(selected, vec!["/example:interfaces/interface/name"]);
        assert!(atomized.contains(mtu));
        assert_eq!(atomized.nodes().count(), 3);
    }

    #[test]
    fn test_atomize_forward_reference() {
        let schema = fixtures::schema();
        let mtu = schema_node(&schema, "/example:interfaces/interface/mtu");
        let outcome = atomize("../sibling", mtu, ContextKind::Element, AtomizeOptions::default()).unwrap();
        assert_eq!(
            outcome,
            Outcome::Unresolved(Unresolved::ForwardReference {
                name: "sibling".to_string(),
                offset: 3
            })
        );
    }

    #[test]
    fn test_atomize_hard_error_wins() {
        let schema = fixtures::schema();
        let mtu = schema_node(&schema, "/example:interfaces/interface/mtu");
        let err = atomize("../sibling = /nope:x", mtu, ContextKind::Element, AtomizeOptions::default()).unwrap_err();
        assert!(matches!(err, XPathError::UnknownModule { .. }));
    }

    #[test]
    fn test_atomize_predicates_and_current() {
        let schema = fixtures::schema();
        let default_if = schema_node(&schema, "/example:routing/default-interface");
        let outcome = atomize(
            "/ex:interfaces/ex:interface[ex:name = current()]/ex:mtu",
            default_if,
            ContextKind::Element,
            AtomizeOptions::default(),
        )
        .unwrap();
        let atomized = outcome.complete().unwrap();
        let selected: Vec<_> = atomized.selected().map(|n| n.path()).collect();
        assert_eq!(selected, vec!["/example:interfaces/interface/mtu"]);
        assert!(atomized.contains(schema_node(&schema, "/example:interfaces/interface/name")));
        assert!(atomized.contains(default_if));
    }

    #[test]
    fn test_atomize_deref() {
        let schema = fixtures::schema();
        let default_if = schema_node(&schema, "/example:routing/default-interface");
        let outcome = atomize("deref(.)/../mtu", default_if, ContextKind::Element, AtomizeOptions::default());
        assert_eq!(selected(outcome.unwrap()), vec!["/example:interfaces/interface/mtu"]);
    }

    #[test]
    fn test_atomize_when_context() {
        let schema = fixtures::schema();
        let interface = schema_node(&schema, "/example:interfaces/interface");
        let augment = interface
            .raw_children()
            .find(|n| n.kind() == SchemaKind::Augment)
            .unwrap();
        let atomized = atomize(&augment.when().unwrap().condition, augment, ContextKind::Element, AtomizeOptions::when())
            .unwrap()
            .complete()
            .unwrap();
        assert_eq!(atomized.context, interface);
        assert!(atomized.contains(schema_node(&schema, "/example:interfaces/interface/type")));

        let uses = schema
            .root()
            .raw_children()
            .find(|n| n.kind() == SchemaKind::Uses)
            .unwrap();
        let atomized = atomize("ex:system/ex:hostname", uses, ContextKind::Element, AtomizeOptions::when())
            .unwrap()
            .complete()
            .unwrap();
        assert!(atomized.context.is_root());
        assert_eq!(atomized.context_kind, ContextKind::Root);
    }

    #[test]
    fn test_atomize_rpc_sections() {
        let schema = fixtures::schema();
        let reset = schema.find_top("example", "reset").unwrap();
        let input = atomize("status", reset, ContextKind::Element, AtomizeOptions::default()).unwrap();
        assert!(!input.is_complete());
        let output = atomize("status", reset, ContextKind::Element, AtomizeOptions::default().output()).unwrap();
        assert_eq!(selected(output), vec!["/example:reset/status"]);
    }

    #[test]
    fn test_atomize_constraint_hides_state() {
        let schema = fixtures::schema();
        let mtu = schema_node(&schema, "/example:interfaces/interface/mtu");
        let plain = atomize("../oper-status", mtu, ContextKind::Element, AtomizeOptions::default()).unwrap();
        assert!(plain.is_complete());
        let must = atomize("../oper-status", mtu, ContextKind::Element, AtomizeOptions::must()).unwrap();
        assert!(matches!(must, Outcome::Unresolved(Unresolved::ForwardReference { .. })));
    }

    #[test]
    fn test_atomize_descendants() {
        let schema = fixtures::schema();
        let outcome = atomize("//ex:name", schema.root(), ContextKind::Root, AtomizeOptions::default()).unwrap();
        assert_eq!(selected(outcome), vec!["/example:interfaces/interface/name"]);
    }

    #[test]
    fn test_node_atomize() {
        let schema = fixtures::schema();
        let system = schema.find_top("example", "system").unwrap();
        let set = node_atomize(system, false).unwrap().complete().unwrap();
        let paths: Vec<_> = set.schema_items_ref().iter().map(|i| i.node.path()).collect();
        assert!(paths.contains(&"/example:interfaces/interface".to_string()));

        let hostname = schema_node(&schema, "/example:system/hostname");
        let set = node_atomize(hostname, false).unwrap().complete().unwrap();
        let paths: Vec<_> = set.schema_items_ref().iter().map(|i| i.node.path()).collect();
        assert!(paths.contains(&"/example:interfaces/interface/name".to_string()));
    }

    #[test]
    fn test_node_atomize_forward_reference() {
        let schema = SchemaTree::from_json(
            r#"{"name": "m", "namespace": "urn:m", "prefix": "m", "nodes": [
                {"kind": "container", "name": "c", "must": ["missing = 1"]}
            ]}"#,
        )
        .unwrap();
        let c = schema.find_top("m", "c").unwrap();
        let strict = node_atomize(c, false).unwrap();
        assert!(matches!(strict, Outcome::Unresolved(Unresolved::ForwardReference { .. })));
        let lenient = node_atomize(c, true).unwrap();
        assert!(lenient.is_complete());
    }

    #[test]
    fn test_check_syntax() {
        let schema = fixtures::schema();
        for node in schema.iter() {
            check_syntax(node).unwrap();
        }
        let broken = SchemaTree::from_json(
            r#"{"name": "m", "namespace": "urn:m", "prefix": "m", "nodes": [
                {"kind": "leaf", "name": "l", "type": {"base": "leafref", "path": "../a["}}
            ]}"#,
        )
        .unwrap();
        let leaf = broken.find_top("m", "l").unwrap();
        assert!(matches!(check_syntax(leaf).unwrap_err(), XPathError::Syntax { .. }));
    }

    #[test]
    fn test_find_schema_path() {
        let schema = fixtures::schema();
        let found = find_schema_path(schema.root(), "/ex:interfaces/ex:interface/ext:speed", false).unwrap();
        let paths: Vec<_> = found.iter().map(|n| n.path()).collect();
        assert_eq!(paths, vec!["/example:interfaces/interface/ext:speed"]);
        assert!(find_schema_path(schema.root(), "/ex:nothing", false).unwrap().is_empty());
    }
}
