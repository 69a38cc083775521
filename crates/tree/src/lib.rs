//! Read-only YANG schema and instance data trees.
//!
//! Both trees are arenas addressed by small ids and navigated through `Copy`
//! handles ([`SchemaNodeRef`], [`DataNodeRef`]) that borrow the tree.

pub mod data;
mod error;
pub mod fixtures;
pub mod schema;

pub use data::{Attribute, DataBuilder, DataId, DataNodeRef, DataTree, WhenStatus};
pub use error::TreeError;
pub use schema::{
    EnumMember, LeafType, Module, ModuleId, Must, SchemaId, SchemaKind, SchemaNodeRef, SchemaTree,
    When,
};
