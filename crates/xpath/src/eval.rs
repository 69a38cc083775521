//! Single-pass parse-and-evaluate over a validated token stream.
//!
//! Every production receives the set holding its context and leaves its
//! result in the same set. Passing `None` parses the production without
//! evaluating it (short-circuited operands, empty contexts). The `repeat`
//! annotation on the first token of an operand tells each level how many
//! operators follow, so the context is copied only when an operator needs it.
//!
//! In atomization mode the sets hold schema nodes: steps mark nodes instead of
//! testing data, and everything that is not a location path just clears the
//! context while keeping the touched nodes.

use crate::adapter::{NodeType, TreeNode};
use crate::error::{Halt, Unresolved, XPathError};
use crate::functions;
use crate::options::Restriction;
use crate::set::{CompareOp, InContext, NodeItem, NodeKind, RootKind, SchemaItem, Set, SetType};
use crate::token::{Expr, TokenKind};
use yangkit_tree::{LeafType, Module, WhenStatus};

pub(crate) type Step = Result<(), Halt>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Evaluate,
    Atomize,
}

#[derive(Debug, Clone, Copy)]
enum ModuleFilter<'t> {
    Any,
    Is(&'t Module),
}

impl ModuleFilter<'_> {
    fn matches(&self, module: Option<&Module>) -> bool {
        match self {
            ModuleFilter::Any => true,
            ModuleFilter::Is(expected) => module.is_some_and(|m| m.name == expected.name),
        }
    }
}

/// What a location step selects.
#[derive(Debug, Clone, Copy)]
enum NodeTest<'e, 't> {
    /// `name`, `prefix:name`, `*`, `prefix:*`; `name` is `None` for `*`.
    Name {
        module: ModuleFilter<'t>,
        name: Option<&'e str>,
    },
    /// `node()`
    Node,
    /// `text()`
    Text,
}

/// Module part of an attribute test. Annotation modules need not be loaded
/// in the schema, so an unknown prefix is matched literally.
#[derive(Debug, Clone, Copy)]
enum AttrModule<'e, 't> {
    Any,
    Module(&'t Module),
    Raw(&'e str),
}

/// An attribute test: `@name`, `@prefix:name`, `@*` or `@node()`.
#[derive(Debug, Clone, Copy)]
struct AttrTest<'e, 't> {
    module: AttrModule<'e, 't>,
    name: Option<&'e str>,
}

const EQUALITY: &[TokenKind] = &[TokenKind::Equal, TokenKind::NotEqual];
const RELATIONAL: &[TokenKind] = &[
    TokenKind::Less,
    TokenKind::LessEqual,
    TokenKind::Greater,
    TokenKind::GreaterEqual,
];
const ADDITIVE: &[TokenKind] = &[TokenKind::Plus, TokenKind::Minus];
const MULTIPLICATIVE: &[TokenKind] = &[TokenKind::Multiply, TokenKind::Div, TokenKind::Mod];

fn compare_op(kind: TokenKind) -> CompareOp {
    match kind {
        TokenKind::NotEqual => CompareOp::NotEqual,
        TokenKind::Less => CompareOp::Less,
        TokenKind::LessEqual => CompareOp::LessEqual,
        TokenKind::Greater => CompareOp::Greater,
        TokenKind::GreaterEqual => CompareOp::GreaterEqual,
        _ => CompareOp::Equal,
    }
}

pub(crate) struct Evaluator<'e, 't, N: TreeNode<'t>> {
    pub(crate) expr: &'e Expr,
    pub(crate) idx: usize,
    pub(crate) mode: Mode,
    pub(crate) restriction: Restriction,
    /// Atomize inside RPC output instead of input.
    pub(crate) output: bool,
    /// The outermost context node, returned by `current()`.
    pub(crate) current: NodeItem<N>,
    pub(crate) root_kind: RootKind,
    pub(crate) local_module: Option<&'t Module>,
    /// Context position and size (1-based).
    pub(crate) position: usize,
    pub(crate) size: usize,
    depth: u32,
    pub(crate) unresolved: Option<Unresolved>,
}

impl<'e, 't, N: TreeNode<'t>> Evaluator<'e, 't, N> {
    pub(crate) fn new(
        expr: &'e Expr,
        mode: Mode,
        current: NodeItem<N>,
        root_kind: RootKind,
        local_module: Option<&'t Module>,
        restriction: Restriction,
        output: bool,
    ) -> Self {
        Self {
            expr,
            idx: 0,
            mode,
            restriction,
            output,
            current,
            root_kind,
            local_module,
            position: 1,
            size: 1,
            depth: 0,
            unresolved: None,
        }
    }

    /// Evaluates the whole expression starting from `set`.
    pub(crate) fn run(mut self, mut set: Set<N>) -> Result<(Set<N>, Option<Unresolved>), Halt> {
        log::trace!("Evaluating '{}' ({:?})", self.expr, self.mode);
        self.or_expr(Some(&mut set))?;
        if self.mode == Mode::Evaluate {
            set.sort_dedup();
        }
        Ok((set, self.unresolved))
    }

    pub(crate) fn atomizing(&self) -> bool {
        self.mode == Mode::Atomize
    }

    fn kind(&self) -> Option<TokenKind> {
        self.expr.kind(self.idx)
    }

    fn offset(&self, index: usize) -> usize {
        self.expr.tokens().get(index).map_or(self.expr.source().len(), |t| t.offset)
    }

    /// Number of operators of this level chained to the operand at `idx`.
    fn chain(&self, kinds: &[TokenKind]) -> usize {
        let tokens = self.expr.tokens();
        tokens.get(self.idx).map_or(0, |token| {
            token
                .repeat
                .iter()
                .filter(|&&i| kinds.contains(&tokens[i].kind))
                .count()
        })
    }

    fn skip_chain(&mut self, ops: usize, operand: fn(&mut Self, Option<&mut Set<N>>) -> Step) -> Step {
        operand(self, None)?;
        for _ in 0..ops {
            self.idx += 1;
            operand(self, None)?;
        }
        Ok(())
    }

    pub(crate) fn record_forward_reference(&mut self, name: &str, offset: usize) {
        log::debug!("Schema node '{}' not found while atomizing '{}'", name, self.expr);
        if self.unresolved.is_none() {
            self.unresolved = Some(Unresolved::ForwardReference {
                name: name.to_string(),
                offset,
            });
        }
    }

    // --- Boolean levels ---

    pub(crate) fn or_expr(&mut self, set: Option<&mut Set<N>>) -> Step {
        self.logical(set, TokenKind::Or, Self::and_expr)
    }

    fn and_expr(&mut self, set: Option<&mut Set<N>>) -> Step {
        self.logical(set, TokenKind::And, Self::equality_expr)
    }

    /// `or`/`and`: short-circuit when evaluating, visit both sides when atomizing.
    fn logical(
        &mut self,
        set: Option<&mut Set<N>>,
        op: TokenKind,
        operand: fn(&mut Self, Option<&mut Set<N>>) -> Step,
    ) -> Step {
        let ops = self.chain(&[op]);
        if ops == 0 {
            return operand(self, set);
        }
        let Some(set) = set else {
            return self.skip_chain(ops, operand);
        };
        let decided = op == TokenKind::Or;
        let orig = set.clone();
        operand(self, Some(&mut *set))?;
        if !self.atomizing() {
            set.cast(SetType::Boolean)?;
        }
        for _ in 0..ops {
            self.idx += 1;
            if !self.atomizing() && set.to_boolean() == decided {
                operand(self, None)?;
                continue;
            }
            let mut right = orig.clone();
            operand(self, Some(&mut right))?;
            if self.atomizing() {
                set.merge_atoms(right);
            } else {
                *set = Set::Boolean(right.to_boolean());
            }
        }
        if self.atomizing() {
            set.clear_context();
        }
        Ok(())
    }

    // --- Comparison levels ---

    fn equality_expr(&mut self, set: Option<&mut Set<N>>) -> Step {
        self.comparison(set, EQUALITY, Self::relational_expr)
    }

    fn relational_expr(&mut self, set: Option<&mut Set<N>>) -> Step {
        self.comparison(set, RELATIONAL, Self::additive_expr)
    }

    fn comparison(
        &mut self,
        set: Option<&mut Set<N>>,
        kinds: &[TokenKind],
        operand: fn(&mut Self, Option<&mut Set<N>>) -> Step,
    ) -> Step {
        let ops = self.chain(kinds);
        if ops == 0 {
            return operand(self, set);
        }
        let Some(set) = set else {
            return self.skip_chain(ops, operand);
        };
        let orig = set.clone();
        operand(self, Some(&mut *set))?;
        for _ in 0..ops {
            let op = compare_op(self.kind().unwrap_or(TokenKind::Equal));
            self.idx += 1;
            let mut right = orig.clone();
            operand(self, Some(&mut right))?;
            if self.atomizing() {
                self.warn_operands(set, &right, op);
                set.merge_atoms(right);
                set.clear_context();
            } else {
                let result = set.compare(op, &right);
                *set = Set::Boolean(result);
            }
        }
        Ok(())
    }

    /// Atomization hint: relational operators on leaves that are not numbers.
    fn warn_operands(&self, left: &Set<N>, right: &Set<N>, op: CompareOp) {
        if matches!(op, CompareOp::Equal | CompareOp::NotEqual) {
            return;
        }
        for item in left.active().chain(right.active()) {
            let numeric = match item.node.leaf_type() {
                Some(LeafType::Integer | LeafType::Decimal) | None => true,
                Some(LeafType::Leafref { .. }) => true,
                Some(_) => false,
            };
            if !numeric {
                log::warn!(
                    "Node '{}' of a non-numeric type is compared with {:?} in '{}'",
                    item.node.label(),
                    op,
                    self.expr
                );
            }
        }
    }

    // --- Arithmetic levels ---

    fn additive_expr(&mut self, set: Option<&mut Set<N>>) -> Step {
        self.arithmetic(set, ADDITIVE, Self::multiplicative_expr)
    }

    fn multiplicative_expr(&mut self, set: Option<&mut Set<N>>) -> Step {
        self.arithmetic(set, MULTIPLICATIVE, Self::unary_expr)
    }

    fn arithmetic(
        &mut self,
        set: Option<&mut Set<N>>,
        kinds: &[TokenKind],
        operand: fn(&mut Self, Option<&mut Set<N>>) -> Step,
    ) -> Step {
        let ops = self.chain(kinds);
        if ops == 0 {
            return operand(self, set);
        }
        let Some(set) = set else {
            return self.skip_chain(ops, operand);
        };
        let orig = set.clone();
        operand(self, Some(&mut *set))?;
        for _ in 0..ops {
            let op = self.kind();
            self.idx += 1;
            let mut right = orig.clone();
            operand(self, Some(&mut right))?;
            if self.atomizing() {
                set.merge_atoms(right);
                set.clear_context();
                continue;
            }
            let (l, r) = (set.to_number(), right.to_number());
            let value = match op {
                Some(TokenKind::Plus) => l + r,
                Some(TokenKind::Minus) => l - r,
                Some(TokenKind::Multiply) => l * r,
                Some(TokenKind::Div) => l / r,
                _ => l % r,
            };
            *set = Set::Number(value);
        }
        Ok(())
    }

    fn unary_expr(&mut self, set: Option<&mut Set<N>>) -> Step {
        let mut set = set;
        let mut negations = 0;
        while self.kind() == Some(TokenKind::Negate) {
            negations += 1;
            self.idx += 1;
        }
        self.union_expr(set.as_deref_mut())?;
        if negations > 0 {
            if let Some(set) = set {
                if self.atomizing() {
                    set.clear_context();
                } else {
                    let value = set.to_number();
                    *set = Set::Number(if negations % 2 == 1 { -value } else { value });
                }
            }
        }
        Ok(())
    }

    fn union_expr(&mut self, set: Option<&mut Set<N>>) -> Step {
        let ops = self.chain(&[TokenKind::Union]);
        if ops == 0 {
            return self.path_expr(set);
        }
        let Some(set) = set else {
            return self.skip_chain(ops, Self::path_expr);
        };
        let orig = set.clone();
        self.path_expr(Some(&mut *set))?;
        for _ in 0..ops {
            self.idx += 1;
            let mut right = orig.clone();
            self.path_expr(Some(&mut right))?;
            if self.atomizing() {
                set.merge_union(right);
            } else {
                *set = std::mem::take(set).union(right)?;
            }
        }
        Ok(())
    }

    // --- Paths ---

    fn path_expr(&mut self, set: Option<&mut Set<N>>) -> Step {
        let mut set = set;
        match self.kind() {
            Some(TokenKind::ParenOpen | TokenKind::Literal | TokenKind::Number | TokenKind::FunctionName) => {
                self.primary_expr(set.as_deref_mut())?;
                self.filter_predicates(set.as_deref_mut())?;
                match self.kind() {
                    Some(TokenKind::Slash) => {
                        self.idx += 1;
                        self.relative_path(set, false)
                    }
                    Some(TokenKind::DoubleSlash) => {
                        self.idx += 1;
                        self.relative_path(set, true)
                    }
                    _ => Ok(()),
                }
            }
            Some(TokenKind::Slash) => {
                self.idx += 1;
                self.move_to_root(set.as_deref_mut());
                if self.kind().is_some_and(TokenKind::starts_step) {
                    self.relative_path(set, false)?;
                }
                Ok(())
            }
            Some(TokenKind::DoubleSlash) => {
                self.idx += 1;
                self.move_to_root(set.as_deref_mut());
                self.relative_path(set, true)
            }
            _ => self.relative_path(set, false),
        }
    }

    fn relative_path(&mut self, set: Option<&mut Set<N>>, descendants: bool) -> Step {
        let mut set = set;
        let mut all_desc = descendants;
        loop {
            if !self.atomizing() {
                if let Some(set) = set.as_deref_mut() {
                    if !set.is_node_set() {
                        return Err(XPathError::Type(format!(
                            "location step applied to a {}",
                            set.type_name()
                        ))
                        .into());
                    }
                }
            }
            if all_desc {
                if let Some(set) = set.as_deref_mut() {
                    self.move_descendants(set)?;
                }
            }
            self.step(set.as_deref_mut())?;
            match self.kind() {
                Some(TokenKind::Slash) => all_desc = false,
                Some(TokenKind::DoubleSlash) => all_desc = true,
                _ => return Ok(()),
            }
            self.idx += 1;
        }
    }

    fn step(&mut self, set: Option<&mut Set<N>>) -> Step {
        match self.kind() {
            Some(TokenKind::Dot) => {
                self.idx += 1;
                Ok(())
            }
            Some(TokenKind::DotDot) => {
                self.idx += 1;
                match set {
                    Some(set) => self.move_to_parent(set),
                    None => Ok(()),
                }
            }
            Some(TokenKind::At) => {
                self.idx += 1;
                let test = self.attr_test();
                match set {
                    Some(set) if self.atomizing() => {
                        set.clear_context();
                        self.schema_predicates(set)
                    }
                    Some(set) => self.data_step(set, |ev, item| ev.attribute_candidates(item, test)),
                    None => self.skip_predicates(),
                }
            }
            _ => {
                let name_idx = self.idx;
                let test = self.node_test(set.is_some())?;
                match set {
                    Some(set) if self.atomizing() => self.schema_step(set, test, name_idx),
                    Some(set) => self.data_step(set, |ev, item| ev.child_candidates(item, test)),
                    None => self.skip_predicates(),
                }
            }
        }
    }

    /// Resolves a `prefix` to a module by name first, then by prefix.
    pub(crate) fn resolve_module(&self, prefix: &str) -> Option<&'t Module> {
        let modules = self.current.node.schema_tree().modules();
        modules
            .iter()
            .find(|m| m.name == prefix)
            .or_else(|| modules.iter().find(|m| m.prefix == prefix))
    }

    /// Reads a node test. Prefixes are only resolved when `evaluated`, so a
    /// skipped operand cannot fail on an unknown module.
    fn node_test(&mut self, evaluated: bool) -> Result<NodeTest<'e, 't>, Halt> {
        let expr = self.expr;
        let index = self.idx;
        match self.kind() {
            Some(TokenKind::NodeType) => {
                self.idx += 3;
                Ok(if expr.text(index) == "text" {
                    NodeTest::Text
                } else {
                    NodeTest::Node
                })
            }
            _ => {
                self.idx += 1;
                let text = expr.text(index);
                let (module, local) = match text.split_once(':') {
                    Some((_, local)) if !evaluated => (ModuleFilter::Any, local),
                    Some((prefix, local)) => {
                        let module = self.resolve_module(prefix).ok_or_else(|| XPathError::UnknownModule {
                            name: prefix.to_string(),
                            offset: self.offset(index),
                        })?;
                        (ModuleFilter::Is(module), local)
                    }
                    None => (
                        self.local_module.map_or(ModuleFilter::Any, ModuleFilter::Is),
                        text,
                    ),
                };
                Ok(NodeTest::Name {
                    module,
                    name: (local != "*").then_some(local),
                })
            }
        }
    }

    fn attr_test(&mut self) -> AttrTest<'e, 't> {
        let expr = self.expr;
        let index = self.idx;
        if self.kind() == Some(TokenKind::NodeType) {
            self.idx += 3;
            return AttrTest {
                module: AttrModule::Any,
                name: None,
            };
        }
        self.idx += 1;
        let text = expr.text(index);
        let (module, local) = match text.split_once(':') {
            Some((prefix, local)) => (
                self.resolve_module(prefix)
                    .map_or(AttrModule::Raw(prefix), AttrModule::Module),
                local,
            ),
            None => (AttrModule::Any, text),
        };
        AttrTest {
            module,
            name: (local != "*").then_some(local),
        }
    }

    // --- Data moves ---

    /// Visibility of a data node under the current restriction.
    fn check_data_node(&self, node: N) -> Result<bool, Halt> {
        if self.root_kind == RootKind::Config && !node.is_config() {
            return Ok(false);
        }
        if self.restriction == Restriction::When {
            match node.when_status() {
                WhenStatus::Unresolved => return Err(Halt::WhenDependency(node.path())),
                WhenStatus::False => return Ok(false),
                WhenStatus::True | WhenStatus::NotApplicable => {}
            }
        }
        Ok(true)
    }

    fn child_candidates(&mut self, item: &NodeItem<N>, test: NodeTest<'e, 't>) -> Result<Vec<NodeItem<N>>, Halt> {
        let mut found = Vec::new();
        if !matches!(item.kind, NodeKind::Root(_) | NodeKind::Element) {
            return Ok(found);
        }
        let has_text = item.kind == NodeKind::Element && item.node.value().is_some();
        match test {
            NodeTest::Text => {
                if has_text {
                    found.push(NodeItem::new(item.node, NodeKind::Text));
                }
            }
            NodeTest::Node => {
                for child in item.node.children() {
                    if self.check_data_node(child)? {
                        found.push(NodeItem::new(child, NodeKind::Element));
                    }
                }
                if has_text {
                    found.push(NodeItem::new(item.node, NodeKind::Text));
                }
            }
            NodeTest::Name { module, name } => {
                for child in item.node.children() {
                    if name.is_none_or(|n| child.name() == n)
                        && module.matches(child.module())
                        && self.check_data_node(child)?
                    {
                        found.push(NodeItem::new(child, NodeKind::Element));
                    }
                }
            }
        }
        Ok(found)
    }

    fn attribute_candidates(&mut self, item: &NodeItem<N>, test: AttrTest<'e, 't>) -> Result<Vec<NodeItem<N>>, Halt> {
        if item.kind != NodeKind::Element {
            return Ok(Vec::new());
        }
        let found = item
            .node
            .attributes()
            .iter()
            .enumerate()
            .filter(|(_, attr)| {
                let module_ok = match test.module {
                    AttrModule::Any => true,
                    AttrModule::Module(module) => attr.module == module.name,
                    AttrModule::Raw(prefix) => attr.module == prefix,
                };
                module_ok && test.name.is_none_or(|n| attr.name == n)
            })
            .map(|(index, _)| NodeItem::new(item.node, NodeKind::Attribute(index)))
            .collect();
        Ok(found)
    }

    /// Applies a step to every context node; predicates are evaluated per
    /// context node over its own candidates.
    fn data_step<F>(&mut self, set: &mut Set<N>, candidates: F) -> Step
    where
        F: Fn(&mut Self, &NodeItem<N>) -> Result<Vec<NodeItem<N>>, Halt>,
    {
        let step_idx = self.idx;
        self.skip_predicates()?;
        let pred_end = self.idx;

        let mut result = Vec::new();
        for item in std::mem::take(set).into_items() {
            let found = candidates(self, &item)?;
            if pred_end > step_idx && !found.is_empty() {
                self.idx = step_idx;
                result.extend(self.apply_predicates(found)?);
            } else {
                result.extend(found);
            }
        }
        self.idx = pred_end;
        log::trace!("Step in '{}' selected {} node(s)", self.expr, result.len());
        *set = Set::Nodes(result);
        set.sort_dedup();
        Ok(())
    }

    /// Filters `candidates` (in document order) through the predicates at `idx`.
    fn apply_predicates(&mut self, candidates: Vec<NodeItem<N>>) -> Result<Vec<NodeItem<N>>, Halt> {
        let mut candidates = candidates;
        while self.kind() == Some(TokenKind::BracketOpen) {
            self.idx += 1;
            let start = self.idx;
            if candidates.is_empty() {
                self.or_expr(None)?;
            } else {
                let size = candidates.len();
                let saved = (self.position, self.size);
                let mut kept = Vec::with_capacity(size);
                for (i, item) in candidates.into_iter().enumerate() {
                    self.idx = start;
                    self.position = i + 1;
                    self.size = size;
                    let mut result = Set::Nodes(vec![item]);
                    let outcome = self.or_expr(Some(&mut result));
                    (self.position, self.size) = saved;
                    outcome?;
                    let keep = match result {
                        Set::Number(n) => n == (i + 1) as f64,
                        other => other.to_boolean(),
                    };
                    if keep {
                        kept.push(item);
                    }
                }
                candidates = kept;
            }
            self.idx += 1;
        }
        Ok(candidates)
    }

    fn skip_predicates(&mut self) -> Step {
        while self.kind() == Some(TokenKind::BracketOpen) {
            self.idx += 1;
            self.or_expr(None)?;
            self.idx += 1;
        }
        Ok(())
    }

    /// Predicates after a primary expression filter the whole node-set.
    fn filter_predicates(&mut self, set: Option<&mut Set<N>>) -> Step {
        if self.kind() != Some(TokenKind::BracketOpen) {
            return Ok(());
        }
        match set {
            None => self.skip_predicates(),
            Some(set) if self.atomizing() => self.schema_predicates(set),
            Some(set) => {
                if !set.is_node_set() {
                    return Err(XPathError::Type(format!("predicate applied to a {}", set.type_name())).into());
                }
                let mut items = std::mem::take(set).into_items();
                items.sort_by_key(|i| i.pos);
                let kept = self.apply_predicates(items)?;
                *set = Set::Nodes(kept);
                set.sort_dedup();
                Ok(())
            }
        }
    }

    fn root_item(&self) -> NodeItem<N> {
        NodeItem::new(self.current.node.root(), NodeKind::Root(self.root_kind))
    }

    fn move_to_root(&mut self, set: Option<&mut Set<N>>) {
        let Some(set) = set else {
            return;
        };
        let root = self.root_item();
        if self.atomizing() {
            set.clear_context();
            set.insert_schema(root.node, root.kind, false);
        } else {
            *set = Set::Nodes(vec![root]);
        }
    }

    fn parent_item(&self, node: N) -> Option<NodeItem<N>> {
        node.parent().map(|parent| {
            let kind = match parent.node_type() {
                NodeType::Root => NodeKind::Root(self.root_kind),
                NodeType::Element => NodeKind::Element,
            };
            NodeItem::new(parent, kind)
        })
    }

    fn move_to_parent(&mut self, set: &mut Set<N>) -> Step {
        if self.atomizing() {
            for item in set.take_context() {
                if item.kind == NodeKind::Element {
                    if let Some(parent) = self.parent_item(item.node) {
                        set.insert_schema(parent.node, parent.kind, true);
                    }
                }
            }
            set.finish_move();
            return Ok(());
        }

        let mut result = Vec::new();
        for item in std::mem::take(set).into_items() {
            match item.kind {
                NodeKind::Text | NodeKind::Attribute(_) => {
                    result.push(NodeItem::new(item.node, NodeKind::Element));
                }
                NodeKind::Element => result.extend(self.parent_item(item.node)),
                NodeKind::Root(_) => {}
            }
        }
        *set = Set::Nodes(result);
        set.sort_dedup();
        Ok(())
    }

    /// `descendant-or-self::node()`, the first half of `//`.
    fn move_descendants(&mut self, set: &mut Set<N>) -> Step {
        if self.atomizing() {
            let active: Vec<SchemaItem<N>> = set.active().copied().collect();
            for item in active {
                if matches!(item.kind, NodeKind::Root(_) | NodeKind::Element) {
                    self.schema_descendants(item.node, set);
                }
            }
            return Ok(());
        }

        let mut result = Vec::new();
        for item in std::mem::take(set).into_items() {
            result.push(item);
            if matches!(item.kind, NodeKind::Root(_) | NodeKind::Element) {
                if item.kind == NodeKind::Element && item.node.value().is_some() {
                    result.push(NodeItem::new(item.node, NodeKind::Text));
                }
                self.data_descendants(item.node, &mut result)?;
            }
        }
        *set = Set::Nodes(result);
        set.sort_dedup();
        Ok(())
    }

    fn data_descendants(&self, node: N, out: &mut Vec<NodeItem<N>>) -> Step {
        for child in node.children() {
            if !self.check_data_node(child)? {
                continue;
            }
            out.push(NodeItem::new(child, NodeKind::Element));
            if child.value().is_some() {
                out.push(NodeItem::new(child, NodeKind::Text));
            }
            self.data_descendants(child, out)?;
        }
        Ok(())
    }

    // --- Schema moves ---

    /// Visibility of a schema node while atomizing.
    fn check_schema_node(&self, node: N) -> bool {
        if self.root_kind == RootKind::Config && !node.is_config() {
            return false;
        }
        let wrong_section = if self.output {
            node.in_rpc_input()
        } else {
            node.in_rpc_output()
        };
        !wrong_section && node.is_augment_target_resolved()
    }

    fn schema_descendants(&self, node: N, set: &mut Set<N>) {
        for child in node.children() {
            if self.check_schema_node(child) {
                set.insert_schema(child, NodeKind::Element, false);
                self.schema_descendants(child, set);
            }
        }
    }

    fn schema_step(&mut self, set: &mut Set<N>, test: NodeTest<'e, 't>, name_idx: usize) -> Step {
        let context = set.take_context();
        let had_context = !context.is_empty();
        let mut matched = false;
        for item in context {
            if !matches!(item.kind, NodeKind::Root(_) | NodeKind::Element) {
                continue;
            }
            match test {
                NodeTest::Text => {
                    if item.node.schema_kind().has_value() {
                        set.insert_schema(item.node, item.kind, true);
                        matched = true;
                    }
                }
                NodeTest::Node => {
                    for child in item.node.children().filter(|c| self.check_schema_node(*c)) {
                        set.insert_schema(child, NodeKind::Element, true);
                        matched = true;
                    }
                }
                NodeTest::Name { module, name } => {
                    for child in item.node.children() {
                        if name.is_none_or(|n| child.name() == n)
                            && module.matches(child.module())
                            && self.check_schema_node(child)
                        {
                            set.insert_schema(child, NodeKind::Element, true);
                            matched = true;
                        }
                    }
                }
            }
        }
        set.finish_move();

        if let NodeTest::Name { name: Some(_), .. } = test {
            if had_context && !matched {
                let expr = self.expr;
                self.record_forward_reference(expr.text(name_idx), self.offset(name_idx));
            }
        }
        self.schema_predicates(set)
    }

    /// Each context node is atomized through the predicate on its own; the
    /// nodes waiting their turn are parked as `Deferred` at this depth.
    fn schema_predicates(&mut self, set: &mut Set<N>) -> Step {
        while self.kind() == Some(TokenKind::BracketOpen) {
            self.idx += 1;
            let start = self.idx;
            self.depth += 1;
            let parked = InContext::Deferred(self.depth);
            set.remark(InContext::Active, parked);

            let waiting: Vec<SchemaItem<N>> = set
                .schema_items_ref()
                .iter()
                .filter(|i| i.in_ctx == parked)
                .copied()
                .collect();
            if waiting.is_empty() {
                self.or_expr(None)?;
            }
            for item in waiting {
                self.idx = start;
                let mut single = Set::Schema(vec![SchemaItem {
                    in_ctx: InContext::Active,
                    ..item
                }]);
                self.or_expr(Some(&mut single))?;
                set.merge_atoms(single);
            }

            set.remark(parked, InContext::Active);
            self.depth -= 1;
            self.idx += 1;
        }
        Ok(())
    }

    // --- Primary expressions ---

    fn primary_expr(&mut self, set: Option<&mut Set<N>>) -> Step {
        let expr = self.expr;
        match self.kind() {
            Some(TokenKind::ParenOpen) => {
                self.idx += 1;
                self.or_expr(set)?;
                self.idx += 1;
                Ok(())
            }
            Some(kind @ (TokenKind::Literal | TokenKind::Number)) => {
                let text = expr.text(self.idx);
                self.idx += 1;
                if let Some(set) = set {
                    if self.atomizing() {
                        set.clear_context();
                    } else if kind == TokenKind::Literal {
                        *set = Set::String(text.to_string());
                    } else {
                        *set = Set::Number(crate::set::parse_number(text));
                    }
                }
                Ok(())
            }
            _ => self.function_call(set),
        }
    }

    fn function_call(&mut self, set: Option<&mut Set<N>>) -> Step {
        let expr = self.expr;
        let name = expr.text(self.idx);
        self.idx += 2;

        let Some(set) = set else {
            if self.kind() != Some(TokenKind::ParenClose) {
                self.or_expr(None)?;
                while self.kind() == Some(TokenKind::Comma) {
                    self.idx += 1;
                    self.or_expr(None)?;
                }
            }
            self.idx += 1;
            return Ok(());
        };

        let mut args = Vec::new();
        if self.kind() != Some(TokenKind::ParenClose) {
            loop {
                let mut arg = set.clone();
                self.or_expr(Some(&mut arg))?;
                args.push(arg);
                if self.kind() != Some(TokenKind::Comma) {
                    break;
                }
                self.idx += 1;
            }
        }
        self.idx += 1;

        if self.atomizing() {
            functions::atomize(self, name, args, set)
        } else {
            functions::call(self, name, args, set)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{atomize, find_schema_path};
    use crate::error::{Outcome, Unresolved};
    use crate::options::{AtomizeOptions, ContextKind};
    use yangkit_tree::{SchemaNodeRef, SchemaTree, fixtures};

    fn schema_node<'t>(tree: &'t SchemaTree, path: &str) -> SchemaNodeRef<'t> {
        tree.iter()
            .find(|n| n.path() == path && !n.kind().is_transparent())
            .unwrap()
    }

    fn selected(expr: &str, context: SchemaNodeRef<'_>, kind: ContextKind) -> Vec<String> {
        let outcome = atomize(expr, context, kind, AtomizeOptions::default()).unwrap();
        match outcome {
            Outcome::Complete(atomized) => atomized.selected().map(|n| n.path()).collect(),
            Outcome::Unresolved(status) => panic!("'{expr}' unresolved: {status}"),
        }
    }

    #[test]
    fn test_child_step_keeps_every_level() {
        let schema = fixtures::schema();
        let paths: Vec<_> = find_schema_path(schema.root(), "//*", false)
            .unwrap()
            .iter()
            .map(|n| n.path())
            .collect();
        for expected in [
            "/example:interfaces",
            "/example:interfaces/interface",
            "/example:interfaces/interface/name",
            "/example:routing/default-interface",
            "/example:system/hostname",
        ] {
            assert!(paths.iter().any(|p| p == expected), "{expected} missing from {paths:?}");
        }
    }

    #[test]
    fn test_child_step_after_descendants() {
        let schema = fixtures::schema();
        let outcome = atomize("//*/ex:name", schema.root(), ContextKind::Root, AtomizeOptions::default()).unwrap();
        assert!(
            !matches!(outcome, Outcome::Unresolved(Unresolved::ForwardReference { .. })),
            "{outcome:?}"
        );
        let paths = selected("//*/ex:name", schema.root(), ContextKind::Root);
        assert_eq!(paths, vec!["/example:interfaces/interface/name"]);
    }

    #[test]
    fn test_parent_steps_move_one_level_each() {
        let schema = fixtures::schema();
        let name = schema_node(&schema, "/example:interfaces/interface/name");
        assert_eq!(selected("..", name, ContextKind::Element), vec!["/example:interfaces/interface"]);
        assert_eq!(selected("../..", name, ContextKind::Element), vec!["/example:interfaces"]);
        assert_eq!(
            selected("../../ex:interface/ex:mtu", name, ContextKind::Element),
            vec!["/example:interfaces/interface/mtu"]
        );
    }

    #[test]
    fn test_nested_predicates_restore_context() {
        let schema = fixtures::schema();
        let default_if = schema_node(&schema, "/example:routing/default-interface");
        let expr = "/ex:interfaces/ex:interface[ex:name = current()][ex:address[. = '10.0.0.1']]/ex:type";
        let atomized = atomize(expr, default_if, ContextKind::Element, AtomizeOptions::default())
            .unwrap()
            .complete()
            .unwrap();
        let paths: Vec<_> = atomized.selected().map(|n| n.path()).collect();
        assert_eq!(paths, vec!["/example:interfaces/interface/type"]);
        for touched in [
            "/example:interfaces/interface/name",
            "/example:interfaces/interface/address",
            "/example:routing/default-interface",
        ] {
            assert!(atomized.contains(schema_node(&schema, touched)), "{touched}");
        }
    }

    #[test]
    fn test_predicate_sees_each_context_node() {
        let schema = fixtures::schema();
        let paths = selected(
            "/ex:interfaces/ex:interface/*[. = 'eth0'][../ex:enabled]/../ex:mtu",
            schema.root(),
            ContextKind::Root,
        );
        assert_eq!(paths, vec!["/example:interfaces/interface/mtu"]);
        let outcome = atomize(
            "/ex:interfaces/ex:interface[ex:missing]",
            schema.root(),
            ContextKind::Root,
            AtomizeOptions::default(),
        )
        .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Unresolved(Unresolved::ForwardReference { ref name, .. }) if name == "missing"
        ));
    }
}
