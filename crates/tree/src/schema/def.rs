//! Serde definitions for the JSON schema description.

use super::{LeafType, SchemaKind};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleDef {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub identities: Vec<IdentityDef>,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub augments: Vec<AugmentDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityDef {
    pub name: String,
    /// Base identities as `name` or `module:name`.
    #[serde(default)]
    pub bases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeDef {
    pub kind: SchemaKind,
    /// Optional for `input`/`output`, whose name is the keyword itself.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Option<bool>,
    #[serde(default)]
    pub must: Vec<MustDef>,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default, rename = "type")]
    pub leaf_type: Option<LeafType>,
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub children: Vec<NodeDef>,
}

/// A `must` either as a bare condition or with an error message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MustDef {
    Condition(String),
    Full {
        condition: String,
        #[serde(default, rename = "error-message")]
        error_message: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AugmentDef {
    /// Absolute schema path, e.g. `/ex:interfaces/ex:interface`.
    pub target: String,
    #[serde(default)]
    pub when: Option<String>,
    /// An unresolved augment keeps its nodes out of atomization.
    #[serde(default = "default_true")]
    pub resolved: bool,
    #[serde(default)]
    pub children: Vec<NodeDef>,
}

fn default_true() -> bool {
    true
}
