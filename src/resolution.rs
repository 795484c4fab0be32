//! Resolution Context
//!
//! Runs the whole resolution pass once and freezes the result:
//!
//! 1. diagnostics for dangling superclasses, enumerations and duplicate attributes
//! 2. the global relation map
//! 3. flattening of every local entity (fails fast on inheritance cycles)
//! 4. sequencing of every emission unit
//! 5. module dependency analysis
//! 6. the warnings gate
//!
//! Emitters read the result through [`EntityView`]s, never through the raw
//! model.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::config::{EmissionUnit, ResolutionConfig};
use crate::error::{ResolveError, Result};
use crate::graph::{
    build_relation_map, module_cycles, sequence, supertypes, DiagnosticItem, Diagnostics,
    EntityId, EntityRef, Flattened, Flattener, ImportSet, ImportTracker, ModelGraph, ModuleId,
    RelationMap, Resolver, SequenceCycle, Severity, Target,
};
use crate::model::{Attribute, Cardinality, Model};

// =============================================================================
// Entity View
// =============================================================================

/// A relation as emitters see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationView {
    /// Qualified name of the other side
    pub target: String,
    pub imported: bool,
    pub cardinality: Cardinality,
    pub owner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumAttributeView {
    pub name: String,
    /// Qualified enumeration name, `None` when dangling
    pub enumeration: Option<String>,
}

/// Pure projection of the resolved facts about one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityView {
    pub name: String,
    pub qualified_name: String,
    pub module: String,
    pub is_abstract: bool,
    /// Some local entity extends this one
    pub is_supertype: bool,
    /// Qualified name of the resolved superclass, local or imported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
    /// Declared attributes only
    pub own_attributes: Vec<Attribute>,
    /// Inherited-then-own attributes
    pub attributes: Vec<Attribute>,
    pub enum_attributes: Vec<EnumAttributeView>,
    /// Inherited-then-own relations
    pub relations: Vec<RelationView>,
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReport {
    pub name: String,
    /// Emission order, qualified names
    pub order: Vec<String>,
    pub imports: ImportSet,
    /// Views in emission order
    pub entities: Vec<EntityView>,
}

/// Serialisable summary of a whole resolution pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub modules: Vec<ModuleReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub module_cycles: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<DiagnosticItem>,
}

// =============================================================================
// Resolution
// =============================================================================

/// Immutable resolution context - frozen after build()
#[derive(Debug, Clone)]
pub struct Resolution {
    graph: ModelGraph,
    config: ResolutionConfig,
    relations: RelationMap,
    flattened: BTreeMap<EntityId, Flattened>,
    /// Emission order per module, indexed by module
    orders: Vec<Vec<EntityId>>,
    supertypes: BTreeSet<EntityId>,
    module_cycles: Vec<Vec<ModuleId>>,
    diagnostics: Diagnostics,
}

impl Resolution {
    /// Build the graph from a loaded model and resolve it
    pub fn from_model(model: &Model, config: &ResolutionConfig) -> Result<Self> {
        Self::build(ModelGraph::from_model(model)?, config)
    }

    /// Run the full resolution pass.
    ///
    /// Any fatal error aborts the pass; there is no partial result.
    pub fn build(graph: ModelGraph, config: &ResolutionConfig) -> Result<Self> {
        let mut diagnostics = Diagnostics::new();

        // Phase 1: per-entity reference checks
        check_references(&graph, &mut diagnostics);

        // Phase 2: relation map
        let relations = build_relation_map(&graph, &mut diagnostics)?;

        // Phase 3: flatten everything
        let flattener = Flattener::new(&graph, &relations);
        let mut flattened = BTreeMap::new();
        for entity in graph.entity_ids() {
            flattened.insert(entity, flattener.flatten(entity)?);
        }
        debug!(entities = flattened.len(), "entities flattened");

        // Phase 4: emission order
        let orders = sequence_units(&graph, config.emission_unit)?;
        debug!(unit = ?config.emission_unit, "emission units sequenced");

        // Phase 5: module analysis
        let supertypes = supertypes(&graph);
        let module_cycles = module_cycles(&graph);
        for cycle in &module_cycles {
            let names: Vec<String> = cycle.iter().map(|m| graph.module(*m).name.clone()).collect();
            diagnostics.module_cycle(&names);
        }

        for item in diagnostics.items() {
            match item.severity() {
                Severity::Warning => warn!(code = %item.code, subject = %item.subject, "{}", item.message),
                Severity::Info => debug!(code = %item.code, subject = %item.subject, "{}", item.message),
            }
        }

        // Phase 6: warnings gate
        if config.deny_warnings && diagnostics.warning_count() > 0 {
            return Err(ResolveError::DeniedWarnings {
                count: diagnostics.warning_count(),
            });
        }

        Ok(Self {
            graph,
            config: config.clone(),
            relations,
            flattened,
            orders,
            supertypes,
            module_cycles,
            diagnostics,
        })
    }

    // ========== Accessors ==========

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    pub fn relation_map(&self) -> &RelationMap {
        &self.relations
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn module_cycles(&self) -> &[Vec<ModuleId>] {
        &self.module_cycles
    }

    /// Flattened members of a local entity
    pub fn flatten(&self, entity: EntityId) -> Result<&Flattened> {
        self.flattened
            .get(&entity)
            .ok_or_else(|| ResolveError::UnknownEntity(format!("{:?}", entity)))
    }

    /// Order an arbitrary set of entities under the configured emission unit
    pub fn sequence(&self, entities: &[EntityId]) -> Result<Vec<EntityId>> {
        for &entity in entities {
            self.check_entity(entity)?;
        }
        sequence(entities, |e| prerequisite_of(&self.graph, self.config.emission_unit, e))
            .map_err(|cycle| cycle_error(&self.graph, cycle))
    }

    /// Emission order of a module's entities
    pub fn sequence_module(&self, module: ModuleId) -> Result<&[EntityId]> {
        self.orders
            .get(module.to_index())
            .map(Vec::as_slice)
            .ok_or_else(|| ResolveError::UnknownModule(format!("{:?}", module)))
    }

    /// Sequenced, non-abstract entities of a module
    pub fn emittable(&self, module: ModuleId) -> Result<Vec<EntityId>> {
        Ok(self
            .sequence_module(module)?
            .iter()
            .copied()
            .filter(|e| !self.graph.entity(*e).is_abstract)
            .collect())
    }

    /// Import facts for everything a module's entities reference
    pub fn imports_for(&self, module: ModuleId) -> Result<ImportSet> {
        self.check_module(module)?;
        let mut tracker = ImportTracker::new(&self.graph, &self.relations, module)
            .with_enums(self.config.enum_imports);
        for &entity in &self.graph.module(module).entities {
            tracker.track_flattened(entity, self.flatten(entity)?);
        }
        Ok(tracker.finish())
    }

    /// Import facts for a single entity, relative to its own module, covering
    /// inherited members
    pub fn imports_for_entity(&self, entity: EntityId) -> Result<ImportSet> {
        self.check_entity(entity)?;
        let module = self.graph.entity(entity).module;
        let mut tracker = ImportTracker::new(&self.graph, &self.relations, module)
            .with_enums(self.config.enum_imports);
        tracker.track_flattened(entity, self.flatten(entity)?);
        Ok(tracker.finish())
    }

    pub fn is_supertype(&self, entity: EntityId) -> bool {
        self.supertypes.contains(&entity)
    }

    /// Entities of a module that some local entity extends
    pub fn supertypes(&self, module: ModuleId) -> Vec<EntityId> {
        self.supertypes
            .iter()
            .copied()
            .filter(|e| self.graph.entity(*e).module == module)
            .collect()
    }

    /// Project everything emitters need about one entity
    pub fn entity_view(&self, entity: EntityId) -> Result<EntityView> {
        let flat = self.flatten(entity)?;
        let graph = &self.graph;
        let node = graph.entity(entity);

        let superclass = Resolver::new(graph)
            .superclass_of(entity)
            .map(|parent| graph.qualified_name(parent.into()));

        let relations = flat
            .relations
            .iter()
            .map(|info| RelationView {
                target: graph.qualified_name(info.target.into()),
                imported: matches!(info.target, EntityRef::Imported(_)),
                cardinality: info.cardinality,
                owner: info.owner,
            })
            .collect();

        let enum_attributes = flat
            .enum_attributes
            .iter()
            .map(|attr| EnumAttributeView {
                name: attr.name.clone(),
                enumeration: attr.enumeration.map(|id| graph.qualified_name(Target::Enum(id))),
            })
            .collect();

        Ok(EntityView {
            name: node.name.clone(),
            qualified_name: graph.entity_name(entity),
            module: graph.module(node.module).name.clone(),
            is_abstract: node.is_abstract,
            is_supertype: self.is_supertype(entity),
            superclass,
            own_attributes: node.attributes.clone(),
            attributes: flat.attributes.clone(),
            enum_attributes,
            relations,
        })
    }

    /// Serialisable summary of the whole pass
    pub fn report(&self) -> Result<ResolutionReport> {
        let graph = &self.graph;
        let mut modules = Vec::with_capacity(graph.module_count());

        for module in graph.module_ids() {
            let order = self.sequence_module(module)?;
            let entities = order
                .iter()
                .map(|e| self.entity_view(*e))
                .collect::<Result<Vec<_>>>()?;

            modules.push(ModuleReport {
                name: graph.module(module).name.clone(),
                order: order.iter().map(|e| graph.entity_name(*e)).collect(),
                imports: self.imports_for(module)?,
                entities,
            });
        }

        let module_cycles = self
            .module_cycles
            .iter()
            .map(|cycle| cycle.iter().map(|m| graph.module(*m).name.clone()).collect())
            .collect();

        Ok(ResolutionReport {
            model: graph.name().map(str::to_string),
            modules,
            module_cycles,
            diagnostics: self.diagnostics.items().to_vec(),
        })
    }

    /// SHA-256 of the serialised report; equal across runs on the same model
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(&self.report()?)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    fn check_entity(&self, entity: EntityId) -> Result<()> {
        if self.graph.contains(Target::Local(entity)) {
            Ok(())
        } else {
            Err(ResolveError::UnknownEntity(format!("{:?}", entity)))
        }
    }

    fn check_module(&self, module: ModuleId) -> Result<()> {
        if module.to_index() < self.graph.module_count() {
            Ok(())
        } else {
            Err(ResolveError::UnknownModule(format!("{:?}", module)))
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn check_references(graph: &ModelGraph, diagnostics: &mut Diagnostics) {
    let resolver = Resolver::new(graph);

    for entity in graph.entity_ids() {
        let node = graph.entity(entity);
        let name = graph.entity_name(entity);

        if let Some(superclass) = &node.superclass {
            if resolver.resolve_entity(superclass, node.module).is_none() {
                diagnostics.dangling_superclass(&name, &graph.describe(superclass));
            }
        }

        for attr in &node.enum_attributes {
            if resolver.resolve_enum(&attr.enumeration, node.module).is_none() {
                diagnostics.dangling_enumeration(&name, &attr.name, &graph.describe(&attr.enumeration));
            }
        }

        let mut seen = HashSet::new();
        for attr in &node.attributes {
            if !seen.insert(attr.name.as_str()) {
                diagnostics.duplicate_attribute(&name, &attr.name);
            }
        }
    }
}

/// The local superclass of `entity`, when it counts as a prerequisite
fn prerequisite_of(graph: &ModelGraph, unit: EmissionUnit, entity: EntityId) -> Option<EntityId> {
    let parent = Resolver::new(graph).superclass_of(entity)?.as_local()?;
    match unit {
        EmissionUnit::Module if graph.entity(parent).module != graph.entity(entity).module => None,
        _ => Some(parent),
    }
}

fn sequence_units(graph: &ModelGraph, unit: EmissionUnit) -> Result<Vec<Vec<EntityId>>> {
    let prerequisites = |e| prerequisite_of(graph, unit, e);

    match unit {
        EmissionUnit::Module => graph
            .module_ids()
            .map(|m| {
                sequence(&graph.module(m).entities, prerequisites)
                    .map_err(|cycle| cycle_error(graph, cycle))
            })
            .collect(),
        EmissionUnit::Model => {
            let all: Vec<EntityId> = graph.entity_ids().collect();
            let global = sequence(&all, prerequisites).map_err(|cycle| cycle_error(graph, cycle))?;
            Ok(graph
                .module_ids()
                .map(|m| {
                    global
                        .iter()
                        .copied()
                        .filter(|e| graph.entity(*e).module == m)
                        .collect()
                })
                .collect())
        }
    }
}

fn cycle_error(graph: &ModelGraph, cycle: SequenceCycle<EntityId>) -> ResolveError {
    ResolveError::CyclicDependency {
        cycle: cycle.cycle.iter().map(|e| graph.entity_name(*e)).collect(),
    }
}
