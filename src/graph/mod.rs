//! Model Graph
//!
//! Immutable arena built once from the declarative [`Model`]. Every module,
//! entity, enumeration and imported entity gets a stable id; references keep
//! the shape they were declared with ([`Reference`]) and are turned into
//! handles only by the [`Resolver`].
//!
//! The resolution engine lives in the submodules:
//! - `resolve` - reference resolution
//! - `relations` - relation classification and the global relation map
//! - `flatten` - inheritance flattening
//! - `sequence` - dependency-respecting emission order
//! - `imports` - cross-module and cross-library import facts
//! - `analysis` - supertypes, module cycles, DOT export

pub mod analysis;
pub mod diagnostics;
pub mod flatten;
pub mod imports;
pub mod relations;
pub mod resolve;
pub mod sequence;

pub use analysis::{module_cycles, module_dependency_graph, supertypes, to_dot};
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use flatten::{FlatEnumAttribute, Flattened, Flattener};
pub use imports::{ImportFact, ImportOrigin, ImportSet, ImportTracker, SymbolKind};
pub use relations::{build_relation_map, classify, RelationInfo, RelationMap, RelationMapBuilder, RelationRule, Side};
pub use resolve::Resolver;
pub use sequence::{sequence, SequenceCycle};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{ResolveError, Result};
use crate::model::{Attribute, Cardinality, Model};

// =============================================================================
// Ids
// =============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            /// Get the 0-based index.
            pub const fn to_index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// Module identifier.
    ModuleId
);

define_id!(
    /// Local (model-defined) entity identifier.
    EntityId
);

define_id!(
    /// Imported (library-defined) entity identifier.
    ImportedId
);

define_id!(
    /// Enumeration identifier.
    EnumId
);

define_id!(
    /// Library import declaration identifier.
    LibraryId
);

// =============================================================================
// References
// =============================================================================

/// Anything a reference can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Target {
    Local(EntityId),
    Imported(ImportedId),
    Enum(EnumId),
}

impl Target {
    pub fn as_entity(self) -> Option<EntityRef> {
        match self {
            Target::Local(id) => Some(EntityRef::Local(id)),
            Target::Imported(id) => Some(EntityRef::Imported(id)),
            Target::Enum(_) => None,
        }
    }

    pub fn as_enum(self) -> Option<EnumId> {
        match self {
            Target::Enum(id) => Some(id),
            _ => None,
        }
    }

    /// Arena index within the target's own kind
    pub fn index(self) -> usize {
        match self {
            Target::Local(id) => id.to_index(),
            Target::Imported(id) => id.to_index(),
            Target::Enum(id) => id.to_index(),
        }
    }
}

/// A resolved entity handle, local or imported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityRef {
    Local(EntityId),
    Imported(ImportedId),
}

impl EntityRef {
    pub fn as_local(self) -> Option<EntityId> {
        match self {
            EntityRef::Local(id) => Some(id),
            EntityRef::Imported(_) => None,
        }
    }
}

impl From<EntityId> for EntityRef {
    fn from(id: EntityId) -> Self {
        EntityRef::Local(id)
    }
}

impl From<EntityRef> for Target {
    fn from(r: EntityRef) -> Self {
        match r {
            EntityRef::Local(id) => Target::Local(id),
            EntityRef::Imported(id) => Target::Imported(id),
        }
    }
}

/// A reference as declared: either already a handle, or a name to look up
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Direct(Target),
    Named(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Direct(target) => write!(f, "#{}", target.index()),
            Reference::Named(name) => f.write_str(name),
        }
    }
}

impl From<Target> for Reference {
    fn from(t: Target) -> Self {
        Reference::Direct(t)
    }
}

impl From<EntityRef> for Reference {
    fn from(r: EntityRef) -> Self {
        Reference::Direct(r.into())
    }
}

impl From<EntityId> for Reference {
    fn from(id: EntityId) -> Self {
        Reference::Direct(Target::Local(id))
    }
}

impl From<ImportedId> for Reference {
    fn from(id: ImportedId) -> Self {
        Reference::Direct(Target::Imported(id))
    }
}

impl From<EnumId> for Reference {
    fn from(id: EnumId) -> Self {
        Reference::Direct(Target::Enum(id))
    }
}

impl From<&str> for Reference {
    fn from(name: &str) -> Self {
        Reference::Named(name.to_string())
    }
}

impl From<String> for Reference {
    fn from(name: String) -> Self {
        Reference::Named(name)
    }
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub name: String,
    /// Entities in declaration order
    pub entities: Vec<EntityId>,
    pub enums: Vec<EnumId>,
}

#[derive(Debug, Clone)]
pub struct EntityNode {
    pub name: String,
    pub module: ModuleId,
    pub comment: Option<String>,
    pub is_abstract: bool,
    pub superclass: Option<Reference>,
    pub attributes: Vec<Attribute>,
    pub enum_attributes: Vec<EnumAttributeNode>,
    pub relations: Vec<RelationNode>,
}

#[derive(Debug, Clone)]
pub struct EnumAttributeNode {
    pub name: String,
    pub enumeration: Reference,
}

#[derive(Debug, Clone)]
pub struct RelationNode {
    pub name: String,
    pub cardinality: Cardinality,
    pub target: Reference,
    /// Explicit ownership annotation from the model author, if any
    pub owner: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct LibraryNode {
    /// Import name (the qualifier of its entities)
    pub name: String,
    pub library: String,
    pub package_path: String,
    pub entities: Vec<ImportedId>,
}

#[derive(Debug, Clone)]
pub struct ImportedNode {
    pub name: String,
    pub library: LibraryId,
}

/// Where an enumeration is declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumScope {
    Model,
    Module(ModuleId),
}

#[derive(Debug, Clone)]
pub struct EnumNode {
    pub name: String,
    pub scope: EnumScope,
    pub variants: Vec<String>,
}

// =============================================================================
// Model Graph
// =============================================================================

/// The loaded model with stable identities and lookup indexes
#[derive(Debug, Clone, Default)]
pub struct ModelGraph {
    pub(crate) name: Option<String>,
    pub(crate) modules: Vec<ModuleNode>,
    pub(crate) entities: Vec<EntityNode>,
    pub(crate) libraries: Vec<LibraryNode>,
    pub(crate) imported: Vec<ImportedNode>,
    pub(crate) enums: Vec<EnumNode>,

    /// Index: qualified name -> target
    pub(crate) by_qualified: HashMap<String, Target>,
    /// Index: per module, simple name -> entity or enum declared there
    pub(crate) module_scope: Vec<HashMap<String, Target>>,
    /// Index: model-level enum name -> id
    pub(crate) model_enums: HashMap<String, EnumId>,
    /// Index: simple name -> every target with that name (names can collide!)
    pub(crate) by_simple: HashMap<String, Vec<Target>>,
}

impl ModelGraph {
    pub fn builder() -> ModelGraphBuilder {
        ModelGraphBuilder::default()
    }

    /// Build the graph from a loaded model. References stay named.
    pub fn from_model(model: &Model) -> Result<Self> {
        let mut builder = ModelGraphBuilder::default();
        builder.name(model.name.clone());

        for e in &model.enums {
            builder.enumeration(EnumScope::Model, &e.name, e.variants.clone());
        }

        for import in &model.imports {
            let lib = builder.library(&import.name, &import.library, &import.package_path);
            for name in &import.entities {
                builder.imported(lib, name);
            }
        }

        for module in &model.modules {
            let module_id = builder.module(&module.name);
            for e in &module.enums {
                builder.enumeration(EnumScope::Module(module_id), &e.name, e.variants.clone());
            }
            for entity in &module.entities {
                let id = builder.entity(module_id, &entity.name);
                builder.set_abstract(id, entity.is_abstract);
                builder.set_comment(id, entity.comment.clone());
                if let Some(superclass) = &entity.superclass {
                    builder.extends(id, superclass.as_str());
                }
                for attr in &entity.attributes {
                    builder.attribute(id, attr.clone());
                }
                for attr in &entity.enum_attributes {
                    builder.enum_attribute(id, &attr.name, attr.enumeration.as_str());
                }
                for rel in &entity.relations {
                    builder.relation_annotated(
                        id,
                        &rel.name,
                        rel.cardinality,
                        rel.target.as_str(),
                        rel.owner,
                    );
                }
            }
        }

        builder.build()
    }

    // ========== Public API ==========

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn module(&self, id: ModuleId) -> &ModuleNode {
        &self.modules[id.to_index()]
    }

    pub fn entity(&self, id: EntityId) -> &EntityNode {
        &self.entities[id.to_index()]
    }

    pub fn imported(&self, id: ImportedId) -> &ImportedNode {
        &self.imported[id.to_index()]
    }

    pub fn library(&self, id: LibraryId) -> &LibraryNode {
        &self.libraries[id.to_index()]
    }

    pub fn enumeration(&self, id: EnumId) -> &EnumNode {
        &self.enums[id.to_index()]
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// All modules in declaration order
    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len()).map(ModuleId::from_index)
    }

    /// All local entities, module by module in declaration order
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.modules.iter().flat_map(|m| m.entities.iter().copied())
    }

    /// All imported entities in declaration order
    pub fn imported_ids(&self) -> impl Iterator<Item = ImportedId> {
        (0..self.imported.len()).map(ImportedId::from_index)
    }

    /// Whether a handle belongs to this graph
    pub fn contains(&self, target: Target) -> bool {
        match target {
            Target::Local(id) => id.to_index() < self.entities.len(),
            Target::Imported(id) => id.to_index() < self.imported.len(),
            Target::Enum(id) => id.to_index() < self.enums.len(),
        }
    }

    pub fn find_module(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|m| m.name == name)
            .map(ModuleId::from_index)
    }

    /// Look up a local entity by qualified name (`module.Entity`)
    pub fn find_entity(&self, qualified: &str) -> Option<EntityId> {
        match self.by_qualified.get(qualified)? {
            Target::Local(id) => Some(*id),
            _ => None,
        }
    }

    /// Qualified name following the container chain
    pub fn qualified_name(&self, target: Target) -> String {
        match target {
            Target::Local(id) => {
                let node = self.entity(id);
                format!("{}.{}", self.module(node.module).name, node.name)
            }
            Target::Imported(id) => {
                let node = self.imported(id);
                format!("{}.{}", self.library(node.library).name, node.name)
            }
            Target::Enum(id) => {
                let node = self.enumeration(id);
                match node.scope {
                    EnumScope::Model => node.name.clone(),
                    EnumScope::Module(m) => format!("{}.{}", self.module(m).name, node.name),
                }
            }
        }
    }

    pub fn entity_name(&self, id: EntityId) -> String {
        self.qualified_name(Target::Local(id))
    }

    /// Simple (unqualified) name of a target
    pub fn simple_name(&self, target: Target) -> &str {
        match target {
            Target::Local(id) => &self.entity(id).name,
            Target::Imported(id) => &self.imported(id).name,
            Target::Enum(id) => &self.enumeration(id).name,
        }
    }

    /// Human-readable form of a reference for messages: the declared name,
    /// the qualified name of an in-range handle, or `#<index>`
    pub fn describe(&self, reference: &Reference) -> String {
        match reference {
            Reference::Direct(target) if self.contains(*target) => self.qualified_name(*target),
            other => other.to_string(),
        }
    }

    /// Every qualified name in the graph, sorted
    pub fn qualified_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_qualified.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Accumulates nodes, then freezes them into a [`ModelGraph`].
///
/// Handles returned by the builder can be used directly as references.
#[derive(Debug, Default)]
pub struct ModelGraphBuilder {
    graph: ModelGraph,
}

impl ModelGraphBuilder {
    pub fn name(&mut self, name: Option<String>) -> &mut Self {
        self.graph.name = name;
        self
    }

    pub fn module(&mut self, name: &str) -> ModuleId {
        let id = ModuleId::from_index(self.graph.modules.len());
        self.graph.modules.push(ModuleNode {
            name: name.to_string(),
            entities: Vec::new(),
            enums: Vec::new(),
        });
        id
    }

    pub fn entity(&mut self, module: ModuleId, name: &str) -> EntityId {
        let id = EntityId::from_index(self.graph.entities.len());
        self.graph.entities.push(EntityNode {
            name: name.to_string(),
            module,
            comment: None,
            is_abstract: false,
            superclass: None,
            attributes: Vec::new(),
            enum_attributes: Vec::new(),
            relations: Vec::new(),
        });
        self.graph.modules[module.to_index()].entities.push(id);
        id
    }

    pub fn set_abstract(&mut self, entity: EntityId, is_abstract: bool) -> &mut Self {
        self.node(entity).is_abstract = is_abstract;
        self
    }

    pub fn set_comment(&mut self, entity: EntityId, comment: Option<String>) -> &mut Self {
        self.node(entity).comment = comment;
        self
    }

    pub fn extends(&mut self, entity: EntityId, superclass: impl Into<Reference>) -> &mut Self {
        self.node(entity).superclass = Some(superclass.into());
        self
    }

    pub fn attribute(&mut self, entity: EntityId, attribute: Attribute) -> &mut Self {
        self.node(entity).attributes.push(attribute);
        self
    }

    pub fn enum_attribute(
        &mut self,
        entity: EntityId,
        name: &str,
        enumeration: impl Into<Reference>,
    ) -> &mut Self {
        self.node(entity).enum_attributes.push(EnumAttributeNode {
            name: name.to_string(),
            enumeration: enumeration.into(),
        });
        self
    }

    pub fn relation(
        &mut self,
        entity: EntityId,
        name: &str,
        cardinality: Cardinality,
        target: impl Into<Reference>,
    ) -> &mut Self {
        self.relation_annotated(entity, name, cardinality, target, None)
    }

    /// Declare a relation carrying an explicit ownership annotation
    pub fn relation_annotated(
        &mut self,
        entity: EntityId,
        name: &str,
        cardinality: Cardinality,
        target: impl Into<Reference>,
        owner: Option<bool>,
    ) -> &mut Self {
        self.node(entity).relations.push(RelationNode {
            name: name.to_string(),
            cardinality,
            target: target.into(),
            owner,
        });
        self
    }

    pub fn enumeration(&mut self, scope: EnumScope, name: &str, variants: Vec<String>) -> EnumId {
        let id = EnumId::from_index(self.graph.enums.len());
        self.graph.enums.push(EnumNode {
            name: name.to_string(),
            scope,
            variants,
        });
        if let EnumScope::Module(module) = scope {
            self.graph.modules[module.to_index()].enums.push(id);
        }
        id
    }

    pub fn library(&mut self, name: &str, library: &str, package_path: &str) -> LibraryId {
        let id = LibraryId::from_index(self.graph.libraries.len());
        self.graph.libraries.push(LibraryNode {
            name: name.to_string(),
            library: library.to_string(),
            package_path: package_path.to_string(),
            entities: Vec::new(),
        });
        id
    }

    pub fn imported(&mut self, library: LibraryId, name: &str) -> ImportedId {
        let id = ImportedId::from_index(self.graph.imported.len());
        self.graph.imported.push(ImportedNode {
            name: name.to_string(),
            library,
        });
        self.graph.libraries[library.to_index()].entities.push(id);
        id
    }

    fn node(&mut self, entity: EntityId) -> &mut EntityNode {
        &mut self.graph.entities[entity.to_index()]
    }

    /// Freeze the graph and build its lookup indexes.
    ///
    /// Fails on duplicate qualified names.
    pub fn build(self) -> Result<ModelGraph> {
        let mut graph = self.graph;

        // Each module is one scope and one emission unit
        let mut module_names = HashSet::with_capacity(graph.modules.len());
        for module in &graph.modules {
            if !module_names.insert(module.name.as_str()) {
                return Err(ResolveError::DuplicateDefinition {
                    name: module.name.clone(),
                });
            }
        }

        let targets: Vec<Target> = (0..graph.entities.len())
            .map(|i| Target::Local(EntityId::from_index(i)))
            .chain((0..graph.imported.len()).map(|i| Target::Imported(ImportedId::from_index(i))))
            .chain((0..graph.enums.len()).map(|i| Target::Enum(EnumId::from_index(i))))
            .collect();

        let mut by_qualified = HashMap::with_capacity(targets.len());
        let mut module_scope = vec![HashMap::new(); graph.modules.len()];
        let mut model_enums = HashMap::new();
        let mut by_simple: HashMap<String, Vec<Target>> = HashMap::with_capacity(targets.len());

        for target in targets {
            let qualified = graph.qualified_name(target);
            if by_qualified.insert(qualified.clone(), target).is_some() {
                return Err(ResolveError::DuplicateDefinition { name: qualified });
            }

            let simple = graph.simple_name(target).to_string();
            match target {
                Target::Local(id) => {
                    let module = graph.entity(id).module;
                    module_scope[module.to_index()].insert(simple.clone(), target);
                }
                Target::Enum(id) => match graph.enumeration(id).scope {
                    EnumScope::Module(module) => {
                        module_scope[module.to_index()].insert(simple.clone(), target);
                    }
                    EnumScope::Model => {
                        model_enums.insert(simple.clone(), id);
                    }
                },
                Target::Imported(_) => {}
            }
            by_simple.entry(simple).or_default().push(target);
        }

        graph.by_qualified = by_qualified;
        graph.module_scope = module_scope;
        graph.model_enums = model_enums;
        graph.by_simple = by_simple;
        Ok(graph)
    }
}
