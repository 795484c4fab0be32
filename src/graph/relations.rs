//! Relation Classification
//!
//! Every relation declaration produces two [`RelationInfo`] records: one on the
//! declaring entity and one on its target. Ownership is never read from the
//! model; it is derived from the declared cardinality with a fixed rule table:
//!
//! | declared on Self | on Self                | on Target              |
//! |------------------|------------------------|------------------------|
//! | OneToOne         | OneToOne, owner        | OneToOne               |
//! | OneToMany        | OneToMany              | ManyToOne, owner       |
//! | ManyToOne        | ManyToOne, owner       | OneToMany              |
//! | ManyToMany       | ManyToMany, owner      | ManyToMany             |
//!
//! The map is built once over every entity of every module and is read-only
//! afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::diagnostics::Diagnostics;
use super::resolve::Resolver;
use super::{EntityId, EntityRef, ModelGraph, Target};
use crate::error::{ResolveError, Result};
use crate::model::Cardinality;

// =============================================================================
// Relation Info
// =============================================================================

/// A relation seen from one of its participating entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationInfo {
    pub target: EntityRef,
    pub cardinality: Cardinality,
    /// Whether this side holds the foreign key or canonical join table
    pub owner: bool,
}

impl RelationInfo {
    pub fn new(target: impl Into<EntityRef>, cardinality: Cardinality, owner: bool) -> Self {
        Self {
            target: target.into(),
            cardinality,
            owner,
        }
    }
}

// =============================================================================
// Rule Table
// =============================================================================

/// Cardinality and ownership for one side of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Side {
    pub cardinality: Cardinality,
    pub owner: bool,
}

/// Both sides derived from one declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationRule {
    pub declaring: Side,
    pub target: Side,
}

/// Derive both sides of a relation from its declared cardinality
pub fn classify(declared: Cardinality) -> RelationRule {
    let (declaring_owner, target_owner) = match declared {
        Cardinality::OneToOne => (true, false),
        Cardinality::OneToMany => (false, true),
        Cardinality::ManyToOne => (true, false),
        Cardinality::ManyToMany => (true, false),
    };

    RelationRule {
        declaring: Side {
            cardinality: declared,
            owner: declaring_owner,
        },
        target: Side {
            cardinality: declared.inverse(),
            owner: target_owner,
        },
    }
}

// =============================================================================
// Relation Map
// =============================================================================

/// Accumulates relation records during the single build phase
#[derive(Debug, Default)]
pub struct RelationMapBuilder {
    map: BTreeMap<EntityId, Vec<RelationInfo>>,
}

impl RelationMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: EntityId, info: RelationInfo) {
        self.map.entry(entity).or_default().push(info);
    }

    /// Freeze the map
    pub fn finish(self) -> RelationMap {
        RelationMap { map: self.map }
    }
}

/// Own (non-inherited) relations per local entity.
///
/// Entities with no relations have no entry; [`get`](Self::get) returns an
/// empty slice for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationMap {
    map: BTreeMap<EntityId, Vec<RelationInfo>>,
}

impl RelationMap {
    pub fn get(&self, entity: EntityId) -> &[RelationInfo] {
        self.map.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.map.contains_key(&entity)
    }

    /// Number of participating entities
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &[RelationInfo])> {
        self.map.iter().map(|(id, rels)| (*id, rels.as_slice()))
    }
}

/// Classify every relation declared anywhere in the graph.
///
/// The owning side's record is appended before the other side's. A relation
/// whose target cannot be resolved aborts the build.
pub fn build_relation_map(graph: &ModelGraph, diagnostics: &mut Diagnostics) -> Result<RelationMap> {
    let resolver = Resolver::new(graph);
    let mut builder = RelationMapBuilder::new();
    let mut many_to_many: BTreeSet<(EntityId, EntityId)> = BTreeSet::new();

    for entity in graph.entity_ids() {
        let node = graph.entity(entity);

        for decl in &node.relations {
            let target = resolver
                .resolve_entity(&decl.target, node.module)
                .ok_or_else(|| ResolveError::DanglingRelationTarget {
                    entity: graph.entity_name(entity),
                    relation: decl.name.clone(),
                    cardinality: decl.cardinality,
                    target: graph.describe(&decl.target),
                    suggestion: match &decl.target {
                        super::Reference::Named(name) => resolver.suggest_entity(name),
                        super::Reference::Direct(_) => None,
                    },
                })?;

            let rule = classify(decl.cardinality);

            if let Some(annotated) = decl.owner {
                if annotated != rule.declaring.owner {
                    diagnostics.ownership_override(
                        &graph.entity_name(entity),
                        &decl.name,
                        annotated,
                        rule.declaring.owner,
                    );
                }
            }

            let on_self = RelationInfo::new(target, rule.declaring.cardinality, rule.declaring.owner);

            match target {
                EntityRef::Local(tgt) => {
                    let on_target = RelationInfo::new(entity, rule.target.cardinality, rule.target.owner);
                    if rule.target.owner {
                        builder.push(tgt, on_target);
                        builder.push(entity, on_self);
                    } else {
                        builder.push(entity, on_self);
                        builder.push(tgt, on_target);
                    }

                    if decl.cardinality == Cardinality::ManyToMany {
                        many_to_many.insert((entity, tgt));
                    }
                }
                EntityRef::Imported(id) => {
                    builder.push(entity, on_self);
                    diagnostics.imported_relation_target(
                        &graph.entity_name(entity),
                        &decl.name,
                        &graph.qualified_name(Target::Imported(id)),
                    );
                }
            }
        }
    }

    for &(a, b) in &many_to_many {
        if a < b && many_to_many.contains(&(b, a)) {
            diagnostics.duplicate_many_to_many(&graph.entity_name(a), &graph.entity_name(b));
        }
    }

    let map = builder.finish();
    debug!(participants = map.len(), "relation map built");
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DiagnosticCode, EnumScope, Target};

    #[test]
    fn test_rule_table() {
        let cases = [
            (Cardinality::OneToOne, (Cardinality::OneToOne, true), (Cardinality::OneToOne, false)),
            (Cardinality::OneToMany, (Cardinality::OneToMany, false), (Cardinality::ManyToOne, true)),
            (Cardinality::ManyToOne, (Cardinality::ManyToOne, true), (Cardinality::OneToMany, false)),
            (Cardinality::ManyToMany, (Cardinality::ManyToMany, true), (Cardinality::ManyToMany, false)),
        ];

        for (declared, on_self, on_target) in cases {
            let rule = classify(declared);
            assert_eq!((rule.declaring.cardinality, rule.declaring.owner), on_self, "{}", declared);
            assert_eq!((rule.target.cardinality, rule.target.owner), on_target, "{}", declared);
        }
    }

    #[test]
    fn test_order_line_item_scenario() {
        let mut b = ModelGraph::builder();
        let m = b.module("sales");
        let order = b.entity(m, "Order");
        let item = b.entity(m, "LineItem");
        b.relation(order, "items", Cardinality::OneToMany, item);
        let graph = b.build().unwrap();

        let mut diags = Diagnostics::new();
        let map = build_relation_map(&graph, &mut diags).unwrap();

        assert_eq!(map.get(order), &[RelationInfo::new(item, Cardinality::OneToMany, false)]);
        assert_eq!(map.get(item), &[RelationInfo::new(order, Cardinality::ManyToOne, true)]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_self_relation_yields_two_records() {
        let mut b = ModelGraph::builder();
        let m = b.module("hr");
        let employee = b.entity(m, "Employee");
        b.relation(employee, "reports", Cardinality::OneToMany, "Employee");
        let graph = b.build().unwrap();

        let map = build_relation_map(&graph, &mut Diagnostics::new()).unwrap();
        assert_eq!(
            map.get(employee),
            &[
                RelationInfo::new(employee, Cardinality::ManyToOne, true),
                RelationInfo::new(employee, Cardinality::OneToMany, false),
            ]
        );
    }

    #[test]
    fn test_entities_without_relations_are_absent() {
        let mut b = ModelGraph::builder();
        let m = b.module("hr");
        let lonely = b.entity(m, "Lonely");
        let graph = b.build().unwrap();

        let map = build_relation_map(&graph, &mut Diagnostics::new()).unwrap();
        assert!(!map.contains(lonely));
        assert!(map.get(lonely).is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_dangling_target_is_fatal() {
        let mut b = ModelGraph::builder();
        let m = b.module("sales");
        let order = b.entity(m, "Order");
        b.entity(m, "LineItem");
        b.relation(order, "items", Cardinality::OneToMany, "LineItm");
        let graph = b.build().unwrap();

        match build_relation_map(&graph, &mut Diagnostics::new()) {
            Err(ResolveError::DanglingRelationTarget { entity, relation, cardinality, suggestion, .. }) => {
                assert_eq!(entity, "sales.Order");
                assert_eq!(relation, "items");
                assert_eq!(cardinality, Cardinality::OneToMany);
                assert_eq!(suggestion.as_deref(), Some("sales.LineItem"));
            }
            other => panic!("Expected DanglingRelationTarget, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_handle_is_reported_by_index() {
        let mut b = ModelGraph::builder();
        let m = b.module("sales");
        let order = b.entity(m, "Order");
        b.relation(order, "items", Cardinality::OneToMany, EntityId::from_index(99));
        let graph = b.build().unwrap();

        match build_relation_map(&graph, &mut Diagnostics::new()) {
            Err(ResolveError::DanglingRelationTarget { target, .. }) => assert_eq!(target, "#99"),
            other => panic!("Expected DanglingRelationTarget, got {:?}", other),
        }

        // An in-range handle of the wrong kind is named
        let mut b = ModelGraph::builder();
        let m = b.module("sales");
        let order = b.entity(m, "Order");
        let status = b.enumeration(EnumScope::Module(m), "Status", vec![]);
        b.relation(order, "state", Cardinality::ManyToOne, Target::Enum(status));
        let graph = b.build().unwrap();

        match build_relation_map(&graph, &mut Diagnostics::new()) {
            Err(ResolveError::DanglingRelationTarget { target, .. }) => assert_eq!(target, "sales.Status"),
            other => panic!("Expected DanglingRelationTarget, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_owner_conflict_warns_and_derived_wins() {
        let mut b = ModelGraph::builder();
        let m = b.module("school");
        let student = b.entity(m, "Student");
        let course = b.entity(m, "Course");
        b.relation_annotated(student, "courses", Cardinality::ManyToMany, course, Some(false));
        let graph = b.build().unwrap();

        let mut diags = Diagnostics::new();
        let map = build_relation_map(&graph, &mut diags).unwrap();

        assert_eq!(map.get(student), &[RelationInfo::new(course, Cardinality::ManyToMany, true)]);
        assert_eq!(diags.with_code(DiagnosticCode::OwnershipOverride).count(), 1);
    }

    #[test]
    fn test_mutual_many_to_many_warns_once() {
        let mut b = ModelGraph::builder();
        let m = b.module("school");
        let student = b.entity(m, "Student");
        let course = b.entity(m, "Course");
        b.relation(student, "courses", Cardinality::ManyToMany, course);
        b.relation(course, "students", Cardinality::ManyToMany, student);
        let graph = b.build().unwrap();

        let mut diags = Diagnostics::new();
        let map = build_relation_map(&graph, &mut diags).unwrap();

        // Declaring side wins for each declaration
        assert_eq!(map.get(student).iter().filter(|r| r.owner).count(), 1);
        assert_eq!(map.get(course).iter().filter(|r| r.owner).count(), 1);
        assert_eq!(diags.with_code(DiagnosticCode::DuplicateManyToMany).count(), 1);
    }

    #[test]
    fn test_imported_target_only_records_declaring_side() {
        let mut b = ModelGraph::builder();
        let m = b.module("sales");
        let order = b.entity(m, "Order");
        let lib = b.library("auth", "Auth", "com.acme.auth");
        let user = b.imported(lib, "User");
        b.relation(order, "customer", Cardinality::ManyToOne, user);
        let graph = b.build().unwrap();

        let mut diags = Diagnostics::new();
        let map = build_relation_map(&graph, &mut diags).unwrap();

        assert_eq!(
            map.get(order),
            &[RelationInfo::new(EntityRef::Imported(user), Cardinality::ManyToOne, true)]
        );
        assert_eq!(map.len(), 1);
        assert_eq!(diags.with_code(DiagnosticCode::ImportedRelationTarget).count(), 1);
    }
}
