//! Import Tracking
//!
//! Collects the symbols a module's emitted artifacts reference from elsewhere.
//! Three origin kinds need distinct import forms: another module of the same
//! model, an external library, and (for shared enumerations) the model itself.
//! Same-module references need no import and are dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::flatten::{Flattened, Flattener};
use super::relations::RelationMap;
use super::resolve::Resolver;
use super::{EntityId, EnumScope, ModelGraph, ModuleId, Target};
use crate::error::Result;

/// Where an imported symbol comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportOrigin {
    /// Another module of this model
    Module { module: String },
    /// An external library declared by an import
    Library {
        import: String,
        library: String,
        package_path: String,
    },
    /// Model-level declarations shared by every module
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Entity,
    Enumeration,
}

/// "import `symbol` from `origin`"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImportFact {
    pub origin: ImportOrigin,
    pub symbol: String,
    pub kind: SymbolKind,
}

/// Deduplicated, ordered import facts of one module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportSet {
    facts: BTreeSet<ImportFact>,
}

impl ImportSet {
    pub fn iter(&self) -> impl Iterator<Item = &ImportFact> {
        self.facts.iter()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn contains(&self, fact: &ImportFact) -> bool {
        self.facts.contains(fact)
    }

    /// Facts coming from a given origin
    pub fn from_origin<'s>(&'s self, origin: &'s ImportOrigin) -> impl Iterator<Item = &'s ImportFact> {
        self.facts.iter().filter(move |f| &f.origin == origin)
    }
}

impl<'s> IntoIterator for &'s ImportSet {
    type Item = &'s ImportFact;
    type IntoIter = std::collections::btree_set::Iter<'s, ImportFact>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.iter()
    }
}

/// Accumulates import facts for one module
#[derive(Debug, Clone)]
pub struct ImportTracker<'a> {
    graph: &'a ModelGraph,
    relations: &'a RelationMap,
    module: ModuleId,
    include_enums: bool,
    facts: BTreeSet<ImportFact>,
}

impl<'a> ImportTracker<'a> {
    pub fn new(graph: &'a ModelGraph, relations: &'a RelationMap, module: ModuleId) -> Self {
        Self {
            graph,
            relations,
            module,
            include_enums: true,
            facts: BTreeSet::new(),
        }
    }

    /// Whether enumeration references produce import facts
    pub fn with_enums(mut self, include_enums: bool) -> Self {
        self.include_enums = include_enums;
        self
    }

    /// Record a reference to `target` from this module
    pub fn track(&mut self, target: Target) {
        let graph = self.graph;
        let fact = match target {
            Target::Local(id) => {
                let node = graph.entity(id);
                if node.module == self.module {
                    return;
                }
                ImportFact {
                    origin: ImportOrigin::Module {
                        module: graph.module(node.module).name.clone(),
                    },
                    symbol: node.name.clone(),
                    kind: SymbolKind::Entity,
                }
            }
            Target::Imported(id) => {
                let node = graph.imported(id);
                let lib = graph.library(node.library);
                ImportFact {
                    origin: ImportOrigin::Library {
                        import: lib.name.clone(),
                        library: lib.library.clone(),
                        package_path: lib.package_path.clone(),
                    },
                    symbol: node.name.clone(),
                    kind: SymbolKind::Entity,
                }
            }
            Target::Enum(id) => {
                if !self.include_enums {
                    return;
                }
                let node = graph.enumeration(id);
                let origin = match node.scope {
                    EnumScope::Module(m) if m == self.module => return,
                    EnumScope::Module(m) => ImportOrigin::Module {
                        module: graph.module(m).name.clone(),
                    },
                    EnumScope::Model => ImportOrigin::Model,
                };
                ImportFact {
                    origin,
                    symbol: node.name.clone(),
                    kind: SymbolKind::Enumeration,
                }
            }
        };
        self.facts.insert(fact);
    }

    /// Record everything one entity's emitted artifact references: its direct
    /// superclass plus the targets and enumerations of its flattened members,
    /// inherited ones included
    pub fn track_flattened(&mut self, entity: EntityId, flat: &Flattened) {
        if let Some(parent) = Resolver::new(self.graph).superclass_of(entity) {
            self.track(parent.into());
        }

        for info in &flat.relations {
            self.track(info.target.into());
        }

        for id in flat.enum_attributes.iter().filter_map(|attr| attr.enumeration) {
            self.track(Target::Enum(id));
        }
    }

    /// Flatten `entity` and record what it references
    pub fn track_entity(&mut self, entity: EntityId) -> Result<()> {
        let flat = Flattener::new(self.graph, self.relations).flatten(entity)?;
        self.track_flattened(entity, &flat);
        Ok(())
    }

    /// Record every entity declared in the tracked module
    pub fn track_module(&mut self) -> Result<()> {
        let graph = self.graph;
        for &entity in &graph.module(self.module).entities {
            self.track_entity(entity)?;
        }
        Ok(())
    }

    pub fn finish(self) -> ImportSet {
        ImportSet { facts: self.facts }
    }
}
