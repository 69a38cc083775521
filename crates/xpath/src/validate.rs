//! `when` and `must` checks over instance data.

use crate::api::evaluate_expr;
use crate::cache::ExprCache;
use crate::error::{Outcome, XPathError};
use crate::options::{ContextKind, EvalOptions};
use std::fmt;
use std::num::NonZeroUsize;
use yangkit_tree::{DataNodeRef, DataTree, Must};

/// Evaluates every `when` guarding `node`, stopping at the first false one.
///
/// A `when` on the node itself is evaluated from the node; one inherited
/// from a `uses`, `choice`, `case` or `augment` is evaluated from the data
/// parent.
pub fn check_when(node: DataNodeRef<'_>) -> Result<Outcome<bool>, XPathError> {
    when_with(&ExprCache::new(NonZeroUsize::MIN), node)
}

fn when_with(cache: &ExprCache, node: DataNodeRef<'_>) -> Result<Outcome<bool>, XPathError> {
    let schema = node.schema();
    for (owner, when) in schema.whens_in_scope() {
        let context = if owner == schema {
            Some(node)
        } else {
            node.parent()
        };
        let Some(context) = context else {
            continue;
        };
        let kind = if context.is_root() {
            ContextKind::Root
        } else {
            ContextKind::Element
        };
        let expr = cache.get_or_parse(&when.condition)?;
        match evaluate_expr(&expr, context, kind, owner.module_name(), EvalOptions::when())? {
            Outcome::Complete(result) if result.to_boolean() => {}
            Outcome::Complete(_) => {
                log::debug!("'when' of {} is false: {}", node.path(), when.condition);
                return Ok(Outcome::Complete(false));
            }
            Outcome::Unresolved(status) => return Ok(Outcome::Unresolved(status)),
        }
    }
    Ok(Outcome::Complete(true))
}

/// Returns the `must` conditions of `node` that do not hold.
pub fn check_musts<'t>(node: DataNodeRef<'t>) -> Result<Vec<&'t Must>, XPathError> {
    musts_with(&ExprCache::new(NonZeroUsize::MIN), node)
}

fn musts_with<'t>(cache: &ExprCache, node: DataNodeRef<'t>) -> Result<Vec<&'t Must>, XPathError> {
    let mut failed = Vec::new();
    for must in node.schema().musts() {
        let expr = cache.get_or_parse(&must.condition)?;
        let outcome = evaluate_expr(
            &expr,
            node,
            ContextKind::Element,
            node.module_name(),
            EvalOptions::must(),
        )?;
        if let Outcome::Complete(result) = outcome {
            if !result.to_boolean() {
                failed.push(must);
            }
        }
    }
    Ok(failed)
}

/// One failed check found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Runs `check_when` and `check_musts` on every node of `tree`.
pub fn validate(tree: &DataTree) -> Result<Vec<Violation>, XPathError> {
    validate_with(&ExprCache::default(), tree)
}

/// Like [`validate`], compiling each condition once through `cache`.
pub fn validate_with(cache: &ExprCache, tree: &DataTree) -> Result<Vec<Violation>, XPathError> {
    let mut violations = Vec::new();
    for node in tree.iter().filter(|n| !n.is_root()) {
        match when_with(cache, node)? {
            Outcome::Complete(true) => {}
            Outcome::Complete(false) => violations.push(Violation {
                path: node.path(),
                message: "'when' condition is false".to_string(),
            }),
            Outcome::Unresolved(status) => violations.push(Violation {
                path: node.path(),
                message: format!("'when' condition unresolved: {status}"),
            }),
        }
        for must in musts_with(cache, node)? {
            violations.push(Violation {
                path: node.path(),
                message: must
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("'must' condition failed: {}", must.condition)),
            });
        }
    }
    Ok(violations)
}
