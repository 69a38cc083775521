//! YANG schema and instance trees with an XPath 1.0 engine on top.
//!
//! The engine lives in [`xpath`]; [`tree`] holds the schema and data arenas it
//! walks. [`cli`] is the library half of the `yangkit` binary.

pub mod cli;
mod error;

pub use error::CliError;
pub use yangkit_tree as tree;
pub use yangkit_xpath as xpath;
