//! XPath 1.0 for YANG: evaluation over instance data, atomization over the
//! schema, and the YANG 1.1 function library.
//!
//! ```
//! use yangkit_tree::fixtures;
//! use yangkit_xpath::{evaluate, ContextKind, EvalOptions, Outcome, Set};
//!
//! let data = fixtures::data();
//! let result = evaluate(
//!     "count(/example:interfaces/interface[enabled = 'true'])",
//!     data.root(),
//!     ContextKind::Root,
//!     None,
//!     EvalOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(result, Outcome::Complete(Set::Number(1.0)));
//! ```

pub mod adapter;
mod api;
mod cache;
mod error;
mod eval;
mod functions;
mod lexer;
mod options;
mod reparse;
pub mod set;
mod token;
mod validate;

pub use adapter::{NodeType, TreeNode};
pub use api::{
    Atomized, atomize, atomize_expr, check_syntax, evaluate, evaluate_expr, find_path, find_schema_path,
    node_atomize, parse_expr,
};
pub use cache::ExprCache;
pub use error::{Outcome, Unresolved, XPathError};
pub use options::{AtomizeOptions, ContextKind, EvalOptions, Restriction};
pub use set::{CompareOp, InContext, NodeItem, NodeKind, RootKind, SchemaItem, Set, SetType};
pub use token::{Expr, Token, TokenKind};
pub use validate::{Violation, check_musts, check_when, validate, validate_with};
