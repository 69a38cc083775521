//! The evaluation set: the value every grammar production transforms.

use crate::adapter::TreeNode;
use crate::error::XPathError;
use std::fmt;

/// Which flavour of document root a root item stands for.
///
/// With `must`/`when` restrictions on a configuration node only configuration
/// data is visible from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    Config,
    State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root(RootKind),
    Element,
    /// The text child of a leaf or leaf-list instance.
    Text,
    /// Index into the owner's attributes.
    Attribute(usize),
}

/// Document-order key: node position, then element < attributes < text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPos {
    pub node: u32,
    pub rank: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeItem<N> {
    pub node: N,
    pub kind: NodeKind,
    pub pos: DocPos,
}

impl<'t, N: TreeNode<'t>> NodeItem<N> {
    pub fn new(node: N, kind: NodeKind) -> Self {
        let rank = match kind {
            NodeKind::Root(_) | NodeKind::Element => 0,
            NodeKind::Attribute(index) => index as u32 + 1,
            NodeKind::Text => u32::MAX,
        };
        Self {
            node,
            kind,
            pos: DocPos {
                node: node.document_position(),
                rank,
            },
        }
    }

    /// String-value per XPath 1.0: a leaf's value, an attribute's value, or
    /// the concatenated values of all descendants for inner nodes.
    pub fn string_value(&self) -> String {
        match self.kind {
            NodeKind::Text => self.node.value().unwrap_or_default().to_string(),
            NodeKind::Attribute(index) => self
                .node
                .attributes()
                .get(index)
                .map(|a| a.value.clone())
                .unwrap_or_default(),
            NodeKind::Root(_) | NodeKind::Element => match self.node.value() {
                Some(value) => value.to_string(),
                None => {
                    let mut out = String::new();
                    collect_text(self.node, &mut out);
                    out
                }
            },
        }
    }
}

fn collect_text<'t, N: TreeNode<'t>>(node: N, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Some(value) => out.push_str(value),
            None => collect_text(child, out),
        }
    }
}

/// Schema-node marking used while atomizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InContext {
    /// Touched by the expression but no longer a context node.
    Excluded,
    Active,
    /// Added by the running move; becomes `Active` once that move is done.
    JustAdded,
    /// Parked by the predicate at this nesting depth.
    Deferred(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaItem<N> {
    pub node: N,
    pub kind: NodeKind,
    pub in_ctx: InContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetType {
    NodeSet,
    Boolean,
    Number,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CompareOp {
    fn flipped(self) -> Self {
        match self {
            CompareOp::Less => CompareOp::Greater,
            CompareOp::LessEqual => CompareOp::GreaterEqual,
            CompareOp::Greater => CompareOp::Less,
            CompareOp::GreaterEqual => CompareOp::LessEqual,
            other => other,
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, CompareOp::Equal | CompareOp::NotEqual)
    }
}

/// Result of evaluating (or atomizing) an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Set<N> {
    /// The empty node-set.
    Empty,
    /// Data nodes in document order without duplicates.
    Nodes(Vec<NodeItem<N>>),
    /// Schema nodes touched during atomization.
    Schema(Vec<SchemaItem<N>>),
    Boolean(bool),
    Number(f64),
    String(String),
}

/// Scalar operand of a comparison.
enum Atom {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Atom {
    fn number(&self) -> f64 {
        match self {
            Atom::Bool(b) => bool_number(*b),
            Atom::Num(n) => *n,
            Atom::Str(s) => parse_number(s),
        }
    }

    fn boolean(&self) -> bool {
        match self {
            Atom::Bool(b) => *b,
            Atom::Num(n) => number_bool(*n),
            Atom::Str(s) => !s.is_empty(),
        }
    }

    fn string(&self) -> String {
        match self {
            Atom::Bool(b) => b.to_string(),
            Atom::Num(n) => format_number(*n),
            Atom::Str(s) => s.clone(),
        }
    }
}

fn compare_atoms(left: &Atom, op: CompareOp, right: &Atom) -> bool {
    if op.is_equality() {
        let equal = match (left, right) {
            (Atom::Bool(_), _) | (_, Atom::Bool(_)) => left.boolean() == right.boolean(),
            (Atom::Num(_), _) | (_, Atom::Num(_)) => left.number() == right.number(),
            _ => left.string() == right.string(),
        };
        return if op == CompareOp::Equal { equal } else { !equal };
    }
    let (l, r) = (left.number(), right.number());
    match op {
        CompareOp::Less => l < r,
        CompareOp::LessEqual => l <= r,
        CompareOp::Greater => l > r,
        CompareOp::GreaterEqual => l >= r,
        CompareOp::Equal | CompareOp::NotEqual => false,
    }
}

fn bool_number(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn number_bool(n: f64) -> bool {
    n != 0.0 && !n.is_nan()
}

/// Parses the XPath `Number` lexical form (optional `-`, surrounding
/// whitespace). Anything else is NaN.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut parts = digits.splitn(2, '.');
    let int = parts.next().unwrap_or_default();
    let frac = parts.next();
    let valid = int.bytes().all(|b| b.is_ascii_digit())
        && frac.is_none_or(|f| f.bytes().all(|b| b.is_ascii_digit()))
        && (!int.is_empty() || frac.is_some_and(|f| !f.is_empty()));
    if !valid {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// Formats a number per the XPath string conversion rules.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n == n.trunc() {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl<N> Default for Set<N> {
    fn default() -> Self {
        Set::Empty
    }
}

impl<'t, N: TreeNode<'t>> Set<N> {
    pub fn single(node: N, kind: NodeKind) -> Self {
        Set::Nodes(vec![NodeItem::new(node, kind)])
    }

    pub fn is_node_set(&self) -> bool {
        matches!(self, Set::Empty | Set::Nodes(_))
    }

    /// Node items of a node-set; empty for every other variant.
    pub fn items(&self) -> &[NodeItem<N>] {
        match self {
            Set::Nodes(items) => items,
            _ => &[],
        }
    }

    pub fn into_items(self) -> Vec<NodeItem<N>> {
        match self {
            Set::Nodes(items) => items,
            _ => Vec::new(),
        }
    }

    /// Element nodes of a node-set (text items stand for their leaf).
    pub fn nodes(&self) -> Vec<N> {
        let mut nodes: Vec<N> = Vec::new();
        for item in self.items() {
            if matches!(item.kind, NodeKind::Element | NodeKind::Text) && !nodes.contains(&item.node) {
                nodes.push(item.node);
            }
        }
        nodes
    }

    pub fn set_type(&self) -> SetType {
        match self {
            Set::Empty | Set::Nodes(_) | Set::Schema(_) => SetType::NodeSet,
            Set::Boolean(_) => SetType::Boolean,
            Set::Number(_) => SetType::Number,
            Set::String(_) => SetType::String,
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Set::Empty => false,
            Set::Nodes(items) => !items.is_empty(),
            Set::Schema(items) => !items.is_empty(),
            Set::Boolean(b) => *b,
            Set::Number(n) => number_bool(*n),
            Set::String(s) => !s.is_empty(),
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Set::Boolean(b) => bool_number(*b),
            Set::Number(n) => *n,
            other => parse_number(&other.to_string_value()),
        }
    }

    pub fn to_string_value(&self) -> String {
        match self {
            Set::Empty | Set::Schema(_) => String::new(),
            Set::Nodes(items) => items
                .iter()
                .min_by_key(|i| i.pos)
                .map(|i| i.string_value())
                .unwrap_or_default(),
            Set::Boolean(b) => b.to_string(),
            Set::Number(n) => format_number(*n),
            Set::String(s) => s.clone(),
        }
    }

    /// Converts in place. A schema set stays a schema set with its context
    /// cleared; converting a scalar to a node-set is a type error.
    pub fn cast(&mut self, target: SetType) -> Result<(), XPathError> {
        if let Set::Schema(_) = self {
            self.clear_context();
            return Ok(());
        }
        *self = match target {
            SetType::NodeSet if self.is_node_set() => return Ok(()),
            SetType::NodeSet => {
                return Err(XPathError::Type(format!(
                    "cannot convert {} to a node-set",
                    self.type_name()
                )));
            }
            SetType::Boolean => Set::Boolean(self.to_boolean()),
            SetType::Number => Set::Number(self.to_number()),
            SetType::String => Set::String(self.to_string_value()),
        };
        Ok(())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Set::Empty | Set::Nodes(_) => "node-set",
            Set::Schema(_) => "schema node-set",
            Set::Boolean(_) => "boolean",
            Set::Number(_) => "number",
            Set::String(_) => "string",
        }
    }

    /// Restores document order and drops duplicates.
    pub fn sort_dedup(&mut self) {
        if let Set::Nodes(items) = self {
            items.sort_by_key(|i| i.pos);
            items.dedup_by_key(|i| i.pos);
            if items.is_empty() {
                *self = Set::Empty;
            }
        }
    }

    /// Node-set union.
    pub fn union(self, other: Set<N>) -> Result<Set<N>, XPathError> {
        if !self.is_node_set() || !other.is_node_set() {
            return Err(XPathError::Type(format!(
                "union of {} and {}",
                self.type_name(),
                other.type_name()
            )));
        }
        let mut items = self.into_items();
        items.extend(other.into_items());
        let mut set = Set::Nodes(items);
        set.sort_dedup();
        Ok(set)
    }

    fn atom(&self) -> Option<Atom> {
        match self {
            Set::Boolean(b) => Some(Atom::Bool(*b)),
            Set::Number(n) => Some(Atom::Num(*n)),
            Set::String(s) => Some(Atom::Str(s.clone())),
            _ => None,
        }
    }

    fn node_atoms(&self, like: &Atom) -> Vec<Atom> {
        self.items()
            .iter()
            .map(|i| {
                let text = i.string_value();
                match like {
                    Atom::Num(_) => Atom::Num(parse_number(&text)),
                    _ => Atom::Str(text),
                }
            })
            .collect()
    }

    /// XPath 1.0 comparison; node-sets compare existentially.
    pub fn compare(&self, op: CompareOp, other: &Set<N>) -> bool {
        match (self.atom(), other.atom()) {
            (Some(left), Some(right)) => compare_atoms(&left, op, &right),
            (None, Some(right)) => self.compare_nodes_atom(op, &right),
            (Some(left), None) => other.compare_nodes_atom(op.flipped(), &left),
            (None, None) => {
                let right: Vec<String> = other.items().iter().map(|i| i.string_value()).collect();
                self.items().iter().any(|l| {
                    let left = Atom::Str(l.string_value());
                    right
                        .iter()
                        .any(|r| compare_atoms(&left, op, &Atom::Str(r.clone())))
                })
            }
        }
    }

    fn compare_nodes_atom(&self, op: CompareOp, atom: &Atom) -> bool {
        if let Atom::Bool(_) = atom {
            return compare_atoms(&Atom::Bool(self.to_boolean()), op, atom);
        }
        self.node_atoms(atom)
            .iter()
            .any(|node| compare_atoms(node, op, atom))
    }

    // --- Schema marking ---

    /// Runs `f` on the schema items, turning any other variant into an
    /// empty schema set first.
    fn with_schema<R>(&mut self, f: impl FnOnce(&mut Vec<SchemaItem<N>>) -> R) -> R {
        let mut items = match std::mem::take(self) {
            Set::Schema(items) => items,
            _ => Vec::new(),
        };
        let result = f(&mut items);
        *self = Set::Schema(items);
        result
    }

    /// Inserts a schema node into the context. A `fresh` node is marked
    /// `JustAdded` until the running move calls [`Set::finish_move`]; a node
    /// parked by a predicate keeps its `Deferred` mark.
    pub(crate) fn insert_schema(&mut self, node: N, kind: NodeKind, fresh: bool) {
        let state = if fresh {
            InContext::JustAdded
        } else {
            InContext::Active
        };
        self.with_schema(|items| match items.iter_mut().find(|i| i.node == node) {
            Some(item) => {
                if !matches!(item.in_ctx, InContext::Deferred(_)) {
                    item.in_ctx = state;
                }
            }
            None => items.push(SchemaItem {
                node,
                kind,
                in_ctx: state,
            }),
        });
    }

    /// Starts a move: the context nodes are returned and leave the context,
    /// so nothing the move inserts is visited by the same move.
    pub(crate) fn take_context(&mut self) -> Vec<SchemaItem<N>> {
        self.with_schema(|items| {
            items
                .iter_mut()
                .filter(|i| i.in_ctx == InContext::Active)
                .map(|i| {
                    let taken = *i;
                    i.in_ctx = InContext::Excluded;
                    taken
                })
                .collect()
        })
    }

    /// Records a node as touched without putting it in context.
    pub(crate) fn insert_excluded(&mut self, node: N, kind: NodeKind) {
        self.with_schema(|items| {
            if !items.iter().any(|i| i.node == node) {
                items.push(SchemaItem {
                    node,
                    kind,
                    in_ctx: InContext::Excluded,
                });
            }
        });
    }

    /// Every context node becomes a plain atom.
    pub(crate) fn clear_context(&mut self) {
        self.with_schema(|items| {
            for item in items {
                if matches!(item.in_ctx, InContext::Active | InContext::JustAdded) {
                    item.in_ctx = InContext::Excluded;
                }
            }
        });
    }

    /// Replaces one marking with another across the set.
    pub(crate) fn remark(&mut self, from: InContext, to: InContext) {
        self.with_schema(|items| {
            for item in items.iter_mut().filter(|i| i.in_ctx == from) {
                item.in_ctx = to;
            }
        });
    }

    pub(crate) fn finish_move(&mut self) {
        self.remark(InContext::JustAdded, InContext::Active);
    }

    /// Adds the atoms of `other` without touching the context.
    pub(crate) fn merge_atoms(&mut self, other: Set<N>) {
        let others = match other {
            Set::Schema(items) => items,
            _ => Vec::new(),
        };
        self.with_schema(|items| {
            for item in others {
                if !items.iter().any(|i| i.node == item.node) {
                    items.push(SchemaItem {
                        in_ctx: InContext::Excluded,
                        ..item
                    });
                }
            }
        });
    }

    /// Atomizing union: atoms and context of both sides.
    pub(crate) fn merge_union(&mut self, other: Set<N>) {
        let others = match other {
            Set::Schema(items) => items,
            _ => Vec::new(),
        };
        for item in others {
            if matches!(item.in_ctx, InContext::Active | InContext::JustAdded) {
                self.insert_schema(item.node, item.kind, false);
            } else {
                self.insert_excluded(item.node, item.kind);
            }
        }
        self.with_schema(|_| ());
    }

    /// Context nodes of a schema set.
    pub fn active(&self) -> impl Iterator<Item = &SchemaItem<N>> {
        let items: &[SchemaItem<N>] = match self {
            Set::Schema(items) => items,
            _ => &[],
        };
        items.iter().filter(|i| i.in_ctx == InContext::Active)
    }

    pub fn schema_items_ref(&self) -> &[SchemaItem<N>] {
        match self {
            Set::Schema(items) => items,
            _ => &[],
        }
    }
}

impl<'t, N: TreeNode<'t>> fmt::Display for Set<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Set::Empty => f.write_str("empty node-set"),
            Set::Nodes(items) => {
                f.write_str("node-set [")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item.kind {
                        NodeKind::Root(_) => f.write_str("/")?,
                        NodeKind::Element => f.write_str(&item.node.label())?,
                        NodeKind::Text => write!(f, "{}/text()", item.node.label())?,
                        NodeKind::Attribute(index) => match item.node.attributes().get(index) {
                            Some(attr) => write!(f, "{}/@{}:{}", item.node.label(), attr.module, attr.name)?,
                            None => write!(f, "{}/@?", item.node.label())?,
                        },
                    }
                }
                f.write_str("]")
            }
            Set::Schema(items) => write!(f, "schema node-set ({} atoms)", items.len()),
            Set::Boolean(b) => write!(f, "{b}"),
            Set::Number(n) => f.write_str(&format_number(*n)),
            Set::String(s) => write!(f, "\"{s}\""),
        }
    }
}
