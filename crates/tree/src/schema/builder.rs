//! Compiles [`ModuleDef`]s into a [`SchemaTree`].

use super::def::{AugmentDef, ModuleDef, MustDef, NodeDef};
use super::{
    Identity, Module, ModuleId, Must, SchemaId, SchemaKind, SchemaNodeData, SchemaTree, When,
};
use crate::TreeError;

struct PendingAugment {
    module: ModuleId,
    def: AugmentDef,
}

struct PendingIdentity {
    module: ModuleId,
    name: String,
    bases: Vec<String>,
}

/// Incremental schema compiler: add modules, then [`build`](Self::build).
pub struct SchemaBuilder {
    modules: Vec<Module>,
    nodes: Vec<SchemaNodeData>,
    explicit_config: Vec<Option<bool>>,
    identities: Vec<PendingIdentity>,
    augments: Vec<PendingAugment>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            nodes: vec![SchemaNodeData::new(SchemaKind::Root, String::new(), None)],
            explicit_config: vec![None],
            identities: Vec::new(),
            augments: Vec::new(),
        }
    }

    pub fn add_module(&mut self, def: ModuleDef) -> Result<ModuleId, TreeError> {
        if self.modules.iter().any(|m| m.name == def.name) {
            return Err(TreeError::DuplicateModule(def.name));
        }
        let module = ModuleId(self.modules.len() as u32);
        self.modules.push(Module {
            prefix: def.prefix.unwrap_or_else(|| def.name.clone()),
            name: def.name,
            namespace: def.namespace,
        });

        for identity in def.identities {
            self.identities.push(PendingIdentity {
                module,
                name: identity.name,
                bases: identity.bases,
            });
        }
        for node in def.nodes {
            self.add_node(SchemaId::ROOT, module, node);
        }
        for augment in def.augments {
            self.augments.push(PendingAugment { module, def: augment });
        }
        log::debug!("Registered module '{}'", self.modules[module.0 as usize].name);
        Ok(module)
    }

    fn push(&mut self, parent: SchemaId, data: SchemaNodeData, config: Option<bool>) -> SchemaId {
        let id = SchemaId(self.nodes.len() as u32);
        let mut data = data;
        data.parent = Some(parent);
        self.nodes.push(data);
        self.explicit_config.push(config);
        self.nodes[parent.index()].children.push(id);
        id
    }

    fn add_node(&mut self, parent: SchemaId, module: ModuleId, def: NodeDef) -> SchemaId {
        let name = match (def.name, def.kind) {
            (Some(name), _) => name,
            (None, SchemaKind::Input) => "input".to_string(),
            (None, SchemaKind::Output) => "output".to_string(),
            (None, kind) => kind.to_string(),
        };
        let mut data = SchemaNodeData::new(def.kind, name, Some(module));
        data.musts = def
            .must
            .into_iter()
            .map(|m| match m {
                MustDef::Condition(condition) => Must {
                    condition,
                    error_message: None,
                },
                MustDef::Full {
                    condition,
                    error_message,
                } => Must {
                    condition,
                    error_message,
                },
            })
            .collect();
        data.when = def.when.map(|condition| When { condition });
        data.leaf_type = def.leaf_type;
        data.keys = def.key;

        let id = self.push(parent, data, def.config);
        for child in def.children {
            self.add_node(id, module, child);
        }
        id
    }

    /// Resolves a prefix that may be either a module name or a module prefix.
    fn resolve_module(&self, prefix: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|m| m.name == prefix)
            .or_else(|| self.modules.iter().position(|m| m.prefix == prefix))
            .map(|i| ModuleId(i as u32))
    }

    /// Finds a named child, looking through `uses` and `augment` statements.
    fn find_child(&self, parent: SchemaId, module: Option<ModuleId>, name: &str) -> Option<SchemaId> {
        for &child in &self.nodes[parent.index()].children {
            let data = &self.nodes[child.index()];
            match data.kind {
                SchemaKind::Uses | SchemaKind::Augment => {
                    if let Some(found) = self.find_child(child, module, name) {
                        return Some(found);
                    }
                }
                _ if data.name == name && (module.is_none() || data.module == module) => {
                    return Some(child);
                }
                _ => {}
            }
        }
        None
    }

    fn resolve_target(&self, owner: ModuleId, target: &str) -> Result<Option<SchemaId>, TreeError> {
        let mut current = SchemaId::ROOT;
        let mut module = owner;
        for segment in target.split('/').filter(|s| !s.is_empty()) {
            let name = match segment.split_once(':') {
                Some((prefix, name)) => {
                    module = self
                        .resolve_module(prefix)
                        .ok_or_else(|| TreeError::UnknownModule(prefix.to_string()))?;
                    name
                }
                None => segment,
            };
            match self.find_child(current, Some(module), name) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn apply_augments(&mut self) -> Result<(), TreeError> {
        let mut pending = std::mem::take(&mut self.augments);
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for augment in pending {
                match self.resolve_target(augment.module, &augment.def.target)? {
                    Some(target) => self.add_augment(target, augment),
                    None => waiting.push(augment),
                }
            }
            if waiting.len() == before {
                return Err(TreeError::AugmentTarget(waiting[0].def.target.clone()));
            }
            pending = waiting;
        }
        Ok(())
    }

    fn add_augment(&mut self, target: SchemaId, augment: PendingAugment) {
        let PendingAugment { module, def } = augment;
        log::debug!("Applying augment of '{}'", def.target);
        let mut data = SchemaNodeData::new(SchemaKind::Augment, def.target, Some(module));
        data.when = def.when.map(|condition| When { condition });
        data.augment_target = Some(target);
        data.augment_resolved = def.resolved;
        let id = self.push(target, data, None);
        let first = self.nodes.len();
        for child in def.children {
            self.add_node(id, module, child);
        }
        if !def.resolved {
            for node in &mut self.nodes[first..] {
                node.augment_resolved = false;
            }
        }
    }

    fn resolve_identities(&self) -> Result<Vec<Identity>, TreeError> {
        let mut resolved = Vec::with_capacity(self.identities.len());
        for identity in &self.identities {
            let mut bases = Vec::new();
            for base in &identity.bases {
                let (module, name) = match base.split_once(':') {
                    Some((prefix, name)) => (
                        self.resolve_module(prefix)
                            .ok_or_else(|| TreeError::UnknownModule(prefix.to_string()))?,
                        name,
                    ),
                    None => (identity.module, base.as_str()),
                };
                let index = self
                    .identities
                    .iter()
                    .position(|i| i.module == module && i.name == name)
                    .ok_or_else(|| TreeError::UnknownIdentity(base.clone()))?;
                bases.push(index);
            }
            resolved.push(Identity {
                module: identity.module,
                name: identity.name.clone(),
                bases,
            });
        }
        Ok(resolved)
    }

    fn flatten(&self, id: SchemaId, out: &mut Vec<SchemaId>) {
        for &child in &self.nodes[id.index()].children {
            if self.nodes[child.index()].kind.is_transparent() {
                self.flatten(child, out);
            } else {
                out.push(child);
            }
        }
    }

    /// Computes effective config, positions and the data view in one pre-order walk.
    fn finish_node(&mut self, id: SchemaId, parent_config: bool, data_parent: Option<SchemaId>, position: &mut u32) {
        let index = id.index();
        let kind = self.nodes[index].kind;
        let config = if kind == SchemaKind::Root {
            true
        } else if kind.is_operation() {
            false
        } else {
            parent_config && self.explicit_config[index].unwrap_or(true)
        };
        let node = &mut self.nodes[index];
        node.config = config;
        node.position = *position;
        node.data_parent = data_parent;
        *position += 1;

        let own_data_parent = if kind.is_transparent() { data_parent } else { Some(id) };
        if !kind.is_transparent() {
            let mut flat = Vec::new();
            self.flatten(id, &mut flat);
            for pair in flat.windows(2) {
                self.nodes[pair[0].index()].next_data_sibling = Some(pair[1]);
            }
            self.nodes[index].data_children = flat;
        }

        let children = self.nodes[index].children.clone();
        for child in children {
            self.finish_node(child, config, own_data_parent, position);
        }
    }

    pub fn build(mut self) -> Result<SchemaTree, TreeError> {
        self.apply_augments()?;
        let identities = self.resolve_identities()?;
        let mut position = 0;
        self.finish_node(SchemaId::ROOT, true, None, &mut position);
        log::debug!(
            "Built schema with {} modules and {} nodes",
            self.modules.len(),
            self.nodes.len()
        );
        Ok(SchemaTree {
            modules: self.modules,
            nodes: self.nodes,
            identities,
        })
    }
}
