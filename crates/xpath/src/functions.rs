//! The XPath 1.0 core library plus the YANG functions.
//!
//! Arity is checked once when the expression is compiled, so the
//! implementations take their arguments in order without re-checking; a
//! missing argument reads as an empty node-set.

use crate::adapter::{NodeType, TreeNode};
use crate::error::{Halt, Unresolved, XPathError};
use crate::eval::{Evaluator, Mode, Step};
use crate::options::Restriction;
use crate::set::{InContext, NodeItem, NodeKind, SchemaItem, Set};
use crate::token::Expr;
use regex::Regex;
use std::fmt;
use yangkit_tree::{LeafType, Module};

/// Accepted argument counts of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Signature {
    min: usize,
    max: Option<usize>,
}

impl Signature {
    pub(crate) fn accepts(&self, found: usize) -> bool {
        found >= self.min && self.max.is_none_or(|max| found <= max)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{max}"),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

const FUNCTIONS: &[(&str, usize, Option<usize>)] = &[
    ("last", 0, Some(0)),
    ("position", 0, Some(0)),
    ("count", 1, Some(1)),
    ("local-name", 0, Some(1)),
    ("namespace-uri", 0, Some(1)),
    ("name", 0, Some(1)),
    ("string", 0, Some(1)),
    ("concat", 2, None),
    ("starts-with", 2, Some(2)),
    ("contains", 2, Some(2)),
    ("substring-before", 2, Some(2)),
    ("substring-after", 2, Some(2)),
    ("substring", 2, Some(3)),
    ("string-length", 0, Some(1)),
    ("normalize-space", 0, Some(1)),
    ("translate", 3, Some(3)),
    ("boolean", 1, Some(1)),
    ("not", 1, Some(1)),
    ("true", 0, Some(0)),
    ("false", 0, Some(0)),
    ("lang", 1, Some(1)),
    ("number", 0, Some(1)),
    ("sum", 1, Some(1)),
    ("floor", 1, Some(1)),
    ("ceiling", 1, Some(1)),
    ("round", 1, Some(1)),
    ("current", 0, Some(0)),
    ("deref", 1, Some(1)),
    ("re-match", 2, Some(2)),
    ("derived-from", 2, Some(2)),
    ("derived-from-or-self", 2, Some(2)),
    ("enum-value", 1, Some(1)),
    ("bit-is-set", 2, Some(2)),
];

/// Looks up a function by name.
pub(crate) fn signature(name: &str) -> Option<Signature> {
    FUNCTIONS
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|&(_, min, max)| Signature { min, max })
}


/// Functions whose single argument defaults to the context node.
const CONTEXT_DEFAULT: &[&str] = &[
    "local-name",
    "namespace-uri",
    "name",
    "string",
    "string-length",
    "normalize-space",
    "number",
];

/// Evaluates `name` over data, replacing `set` (the context) with the result.
pub(crate) fn call<'e, 't, N: TreeNode<'t>>(
    ev: &mut Evaluator<'e, 't, N>,
    name: &str,
    mut args: Vec<Set<N>>,
    set: &mut Set<N>,
) -> Step {
    let context = set.items().iter().min_by_key(|i| i.pos).copied();
    if args.is_empty() && CONTEXT_DEFAULT.contains(&name) {
        args.push(context.map_or(Set::Empty, |item| Set::Nodes(vec![item])));
    }
    let count = args.len();
    let mut args = args.into_iter();
    let mut next = move || args.next().unwrap_or_default();

    let result = match name {
        // --- Node-set functions ---
        "last" => Set::Number(ev.size as f64),
        "position" => Set::Number(ev.position as f64),
        "count" => Set::Number(node_set(next(), name)?.items().len() as f64),
        "local-name" | "namespace-uri" | "name" => {
            let nodes = node_set(next(), name)?;
            let first = nodes.items().first().copied();
            Set::String(first.map(|item| func_node_name(name, &item)).unwrap_or_default())
        }
        "current" => Set::Nodes(vec![ev.current]),
        "deref" => func_deref(ev, &node_set(next(), name)?)?,

        // --- String functions ---
        "string" => Set::String(next().to_string_value()),
        "concat" => {
            let mut out = String::new();
            for _ in 0..count {
                out.push_str(&next().to_string_value());
            }
            Set::String(out)
        }
        "starts-with" => {
            let (s1, s2) = (next().to_string_value(), next().to_string_value());
            Set::Boolean(s1.starts_with(&s2))
        }
        "contains" => {
            let (s1, s2) = (next().to_string_value(), next().to_string_value());
            Set::Boolean(s1.contains(&s2))
        }
        "substring-before" => {
            let (s1, s2) = (next().to_string_value(), next().to_string_value());
            Set::String(s1.find(&s2).map(|i| s1[..i].to_string()).unwrap_or_default())
        }
        "substring-after" => {
            let (s1, s2) = (next().to_string_value(), next().to_string_value());
            Set::String(
                s1.find(&s2)
                    .map(|i| s1[i + s2.len()..].to_string())
                    .unwrap_or_default(),
            )
        }
        "substring" => {
            let s = next().to_string_value();
            let start = next().to_number();
            let length = (count == 3).then(|| next().to_number());
            Set::String(func_substring(&s, start, length))
        }
        "string-length" => Set::Number(next().to_string_value().chars().count() as f64),
        "normalize-space" => Set::String(func_normalize_space(&next().to_string_value())),
        "translate" => {
            let source = next().to_string_value();
            let from: Vec<char> = next().to_string_value().chars().collect();
            let to: Vec<char> = next().to_string_value().chars().collect();
            Set::String(func_translate(&source, &from, &to))
        }
        "re-match" => {
            let subject = next().to_string_value();
            let pattern = next().to_string_value();
            Set::Boolean(func_re_match(&subject, &pattern)?)
        }

        // --- Boolean functions ---
        "boolean" => Set::Boolean(next().to_boolean()),
        "not" => Set::Boolean(!next().to_boolean()),
        "true" => Set::Boolean(true),
        "false" => Set::Boolean(false),
        "lang" => Set::Boolean(func_lang(&next().to_string_value(), context)),
        "derived-from" | "derived-from-or-self" => {
            let nodes = node_set(next(), name)?;
            let identity = next().to_string_value();
            Set::Boolean(func_derived_from(ev, &nodes, &identity, name == "derived-from-or-self")?)
        }
        "bit-is-set" => {
            let nodes = node_set(next(), name)?;
            let bit = next().to_string_value();
            Set::Boolean(func_bit_is_set(&nodes, &bit))
        }

        // --- Number functions ---
        "number" => Set::Number(next().to_number()),
        "sum" => {
            let nodes = node_set(next(), name)?;
            Set::Number(
                nodes
                    .items()
                    .iter()
                    .map(|i| crate::set::parse_number(&i.string_value()))
                    .sum(),
            )
        }
        "floor" => Set::Number(next().to_number().floor()),
        "ceiling" => Set::Number(next().to_number().ceil()),
        "round" => Set::Number(xpath_round(next().to_number())),
        "enum-value" => Set::Number(func_enum_value(&node_set(next(), name)?)),

        other => {
            return Err(XPathError::UnknownFunction {
                name: other.to_string(),
                offset: ev.expr.source().len(),
            }
            .into());
        }
    };
    *set = result;
    Ok(())
}

/// Atomizing a call: the context is cleared and the atoms of every argument
/// are kept. `current()` and `deref()` put their nodes back into context.
pub(crate) fn atomize<'e, 't, N: TreeNode<'t>>(
    ev: &mut Evaluator<'e, 't, N>,
    name: &str,
    args: Vec<Set<N>>,
    set: &mut Set<N>,
) -> Step {
    set.clear_context();
    let targets: Vec<N> = match name {
        "deref" => args
            .first()
            .map(|arg| arg.active().map(|i| i.node).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    for arg in args {
        set.merge_atoms(arg);
    }
    match name {
        "current" => set.insert_schema(ev.current.node, ev.current.kind, false),
        "deref" => {
            for node in targets {
                deref_schema(ev, node, set)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn node_set<'t, N: TreeNode<'t>>(set: Set<N>, function: &str) -> Result<Set<N>, XPathError> {
    if set.is_node_set() {
        Ok(set)
    } else {
        Err(XPathError::Type(format!(
            "{function}() expects a node-set, got a {}",
            set.type_name()
        )))
    }
}

/// Evaluates or atomizes a dependent expression (leafref path or
/// instance-identifier) starting from `start`.
fn nested<'t, N: TreeNode<'t>>(
    ev: &Evaluator<'_, 't, N>,
    expr: &Expr,
    start: NodeItem<N>,
    local_module: Option<&'t Module>,
) -> Result<(Set<N>, Option<Unresolved>), Halt> {
    let initial = match ev.mode {
        Mode::Evaluate => Set::Nodes(vec![start]),
        Mode::Atomize => Set::Schema(vec![SchemaItem {
            node: start.node,
            kind: start.kind,
            in_ctx: InContext::Active,
        }]),
    };
    Evaluator::new(
        expr,
        ev.mode,
        start,
        ev.root_kind,
        local_module,
        Restriction::None,
        ev.output,
    )
    .run(initial)
}

// --- Node-set helpers ---

fn func_node_name<'t, N: TreeNode<'t>>(function: &str, item: &NodeItem<N>) -> String {
    let (module, local) = match item.kind {
        NodeKind::Element => (item.node.module().map(|m| m.name.as_str()), item.node.name()),
        NodeKind::Attribute(index) => match item.node.attributes().get(index) {
            Some(attr) => (Some(attr.module.as_str()), attr.name.as_str()),
            None => return String::new(),
        },
        NodeKind::Root(_) | NodeKind::Text => return String::new(),
    };
    match function {
        "local-name" => local.to_string(),
        "namespace-uri" => module
            .and_then(|name| {
                item.node
                    .schema_tree()
                    .modules()
                    .iter()
                    .find(|m| m.name == name)
            })
            .map(|m| m.namespace.clone())
            .unwrap_or_default(),
        _ => match module {
            Some(module) => format!("{module}:{local}"),
            None => local.to_string(),
        },
    }
}

fn func_deref<'t, N: TreeNode<'t>>(ev: &Evaluator<'_, 't, N>, nodes: &Set<N>) -> Result<Set<N>, Halt> {
    let Some(item) = nodes.items().first().copied() else {
        return Ok(Set::Empty);
    };
    let leaf = item.node;
    let Some(value) = leaf.value() else {
        return Ok(Set::Empty);
    };
    match leaf.leaf_type() {
        Some(LeafType::Leafref { path }) => {
            let expr = Expr::parse(path)?;
            let start = NodeItem::new(leaf, NodeKind::Element);
            let (found, _) = nested(ev, &expr, start, leaf.module())?;
            let target = found
                .into_items()
                .into_iter()
                .find(|i| i.node.value() == Some(value));
            Ok(target.map_or(Set::Empty, |t| Set::single(t.node, NodeKind::Element)))
        }
        Some(LeafType::InstanceIdentifier) => {
            let expr = match Expr::parse(value) {
                Ok(expr) => expr,
                Err(err) => {
                    log::debug!("Instance-identifier '{}' does not parse: {}", value, err);
                    return Ok(Set::Empty);
                }
            };
            let root = NodeItem::new(leaf.root(), NodeKind::Root(ev.root_kind));
            let (found, _) = nested(ev, &expr, root, None)?;
            Ok(if found.is_node_set() { found } else { Set::Empty })
        }
        _ => Ok(Set::Empty),
    }
}

/// Puts the targets of a leafref schema node into context.
fn deref_schema<'t, N: TreeNode<'t>>(ev: &mut Evaluator<'_, 't, N>, node: N, set: &mut Set<N>) -> Step {
    let Some(LeafType::Leafref { path }) = node.leaf_type() else {
        return Ok(());
    };
    let expr = Expr::parse(path)?;
    let start = NodeItem::new(node, NodeKind::Element);
    let (found, unresolved) = nested(ev, &expr, start, node.module())?;
    if let Some(Unresolved::ForwardReference { name, offset }) = unresolved {
        ev.record_forward_reference(&name, offset);
    }
    set.merge_union(found);
    Ok(())
}

// --- String helpers ---

fn func_substring(s: &str, start: f64, length: Option<f64>) -> String {
    let first = xpath_round(start);
    let last = length.map_or(f64::INFINITY, |l| first + xpath_round(l));
    s.chars()
        .enumerate()
        .filter(|(i, _)| {
            let pos = (i + 1) as f64;
            pos >= first && pos < last
        })
        .map(|(_, c)| c)
        .collect()
}

/// Collapses runs of XML whitespace (space, tab, CR, LF) only.
fn func_normalize_space(s: &str) -> String {
    s.split([' ', '\t', '\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn func_translate(source: &str, from: &[char], to: &[char]) -> String {
    source
        .chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(pos) => to.get(pos).copied(),
            None => Some(c),
        })
        .collect()
}

/// XSD patterns always match the whole string.
fn func_re_match(subject: &str, pattern: &str) -> Result<bool, XPathError> {
    let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| XPathError::Regex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(regex.is_match(subject))
}

// --- Boolean helpers ---

fn func_lang<'t, N: TreeNode<'t>>(target: &str, context: Option<NodeItem<N>>) -> bool {
    let target = target.to_lowercase();
    let mut current = context.map(|i| i.node);
    while let Some(node) = current {
        if let Some(attr) = node.attributes().iter().find(|a| a.name == "lang") {
            let lang = attr.value.to_lowercase();
            return lang == target || lang.strip_prefix(&target).is_some_and(|rest| rest.starts_with('-'));
        }
        current = node.parent().filter(|p| p.node_type() == NodeType::Element);
    }
    false
}

/// Resolves `prefix:name` (or a bare name in `default`) to an identity.
fn resolve_identity<'t, N: TreeNode<'t>>(
    ev: &Evaluator<'_, 't, N>,
    text: &str,
    default: Option<&'t Module>,
) -> Option<usize> {
    let (module, name) = match text.split_once(':') {
        Some((prefix, name)) => (ev.resolve_module(prefix)?, name),
        None => (default?, text),
    };
    ev.current.node.schema_tree().identity(&module.name, name)
}

fn func_derived_from<'t, N: TreeNode<'t>>(
    ev: &Evaluator<'_, 't, N>,
    nodes: &Set<N>,
    identity: &str,
    or_self: bool,
) -> Result<bool, XPathError> {
    let default = ev.local_module.or_else(|| ev.current.node.module());
    let base = resolve_identity(ev, identity, default)
        .ok_or_else(|| XPathError::Type(format!("unknown identity '{identity}'")))?;
    let tree = ev.current.node.schema_tree();
    for item in nodes.items() {
        let node = item.node;
        if !matches!(node.leaf_type(), Some(LeafType::Identityref { .. })) {
            continue;
        }
        let Some(value) = node.value() else {
            continue;
        };
        if resolve_identity(ev, value, node.module()).is_some_and(|derived| tree.is_derived_from(derived, base, or_self)) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn func_bit_is_set<'t, N: TreeNode<'t>>(nodes: &Set<N>, bit: &str) -> bool {
    nodes.items().first().is_some_and(|item| {
        item.node.leaf_type().is_some_and(|t| t.has_bit(bit))
            && item
                .node
                .value()
                .is_some_and(|value| value.split([' ', '\t', '\r', '\n']).any(|b| b == bit))
    })
}

// --- Number helpers ---

fn func_enum_value<'t, N: TreeNode<'t>>(nodes: &Set<N>) -> f64 {
    nodes
        .items()
        .first()
        .and_then(|item| {
            let value = item.node.value()?;
            item.node.leaf_type()?.enum_value(value)
        })
        .map_or(f64::NAN, |v| v as f64)
}

/// XPath `round()`: halves go up, and values in [-0.5, 0] give negative zero.
pub(crate) fn xpath_round(n: f64) -> f64 {
    if !n.is_finite() || n == 0.0 {
        n
    } else if (-0.5..0.0).contains(&n) {
        -0.0
    } else {
        (n + 0.5).floor()
    }
}
