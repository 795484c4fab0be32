//! Inheritance Flattening
//!
//! Combines an entity's own members with everything inherited along its single
//! inheritance chain, ancestors first. The chain is walked with an on-path set
//! so that `A extends B extends A` fails fast instead of looping.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::relations::{RelationInfo, RelationMap};
use super::resolve::Resolver;
use super::{EntityId, EntityRef, EnumId, ImportedId, ModelGraph};
use crate::error::{ResolveError, Result};
use crate::model::Attribute;

/// An enumeration-typed attribute after resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatEnumAttribute {
    pub name: String,
    /// `None` when the enumeration reference is dangling
    pub enumeration: Option<EnumId>,
}

/// The complete member set of one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flattened {
    pub attributes: Vec<Attribute>,
    pub relations: Vec<RelationInfo>,
    pub enum_attributes: Vec<FlatEnumAttribute>,
    /// Local inheritance chain, root first, ending with the entity itself
    pub chain: Vec<EntityId>,
    /// Imported ancestor where flattening stopped, if any
    pub opaque_base: Option<ImportedId>,
}

/// Flattens entities against a frozen relation map
#[derive(Debug, Clone, Copy)]
pub struct Flattener<'a> {
    graph: &'a ModelGraph,
    resolver: Resolver<'a>,
    relations: &'a RelationMap,
}

impl<'a> Flattener<'a> {
    pub fn new(graph: &'a ModelGraph, relations: &'a RelationMap) -> Self {
        Self {
            graph,
            resolver: Resolver::new(graph),
            relations,
        }
    }

    /// Local ancestors of `entity`, root first, ending with `entity`
    pub fn chain(&self, entity: EntityId) -> Result<Vec<EntityId>> {
        self.walk(entity).map(|(chain, _)| chain)
    }

    fn walk(&self, entity: EntityId) -> Result<(Vec<EntityId>, Option<ImportedId>)> {
        let mut path = vec![entity];
        let mut on_path = HashSet::from([entity]);
        let mut current = entity;
        let mut opaque_base = None;

        while let Some(parent) = self.resolver.superclass_of(current) {
            match parent {
                EntityRef::Local(parent) => {
                    if !on_path.insert(parent) {
                        // path[i] extends path[i + 1]; report from the first repeat
                        let start = path.iter().position(|e| *e == parent).unwrap_or(0);
                        let cycle = path[start..]
                            .iter()
                            .chain(std::iter::once(&parent))
                            .map(|e| self.graph.entity_name(*e))
                            .collect();
                        return Err(ResolveError::CyclicInheritance { cycle });
                    }
                    path.push(parent);
                    current = parent;
                }
                EntityRef::Imported(id) => {
                    opaque_base = Some(id);
                    break;
                }
            }
        }

        path.reverse();
        Ok((path, opaque_base))
    }

    /// Inherited-then-own attributes, enum attributes and relations
    pub fn flatten(&self, entity: EntityId) -> Result<Flattened> {
        let (chain, opaque_base) = self.walk(entity)?;
        let mut flat = Flattened {
            opaque_base,
            ..Default::default()
        };

        for &id in &chain {
            let node = self.graph.entity(id);
            flat.attributes.extend(node.attributes.iter().cloned());
            flat.relations.extend_from_slice(self.relations.get(id));
            flat.enum_attributes.extend(node.enum_attributes.iter().map(|attr| FlatEnumAttribute {
                name: attr.name.clone(),
                enumeration: self.resolver.resolve_enum(&attr.enumeration, node.module),
            }));
        }

        flat.chain = chain;
        Ok(flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_relation_map, Diagnostics, EnumScope};
    use crate::model::{Cardinality, DataType};

    fn flatten_one(graph: &ModelGraph, entity: EntityId) -> Result<Flattened> {
        let map = build_relation_map(graph, &mut Diagnostics::new())?;
        Flattener::new(graph, &map).flatten(entity)
    }

    #[test]
    fn test_root_returns_own_members() {
        let mut b = ModelGraph::builder();
        let m = b.module("sales");
        let order = b.entity(m, "Order");
        let item = b.entity(m, "LineItem");
        b.attribute(order, Attribute::new("code", DataType::String));
        b.relation(order, "items", Cardinality::OneToMany, item);
        let graph = b.build().unwrap();

        let map = build_relation_map(&graph, &mut Diagnostics::new()).unwrap();
        let flat = Flattener::new(&graph, &map).flatten(order).unwrap();

        assert_eq!(flat.attributes, vec![Attribute::new("code", DataType::String)]);
        assert_eq!(flat.relations, map.get(order));
        assert_eq!(flat.chain, vec![order]);
        assert_eq!(flat.opaque_base, None);
    }

    #[test]
    fn test_three_level_chain_keeps_ancestor_order() {
        let mut b = ModelGraph::builder();
        let m = b.module("hr");
        let a = b.entity(m, "A");
        let bb = b.entity(m, "B");
        let c = b.entity(m, "C");
        b.attribute(a, Attribute::new("a1", DataType::String))
            .attribute(a, Attribute::new("a2", DataType::Integer))
            .attribute(bb, Attribute::new("b1", DataType::Date))
            .attribute(c, Attribute::new("c1", DataType::Boolean));
        b.extends(bb, a).extends(c, "B");
        let graph = b.build().unwrap();

        let flat = flatten_one(&graph, c).unwrap();
        let names: Vec<&str> = flat.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a1", "a2", "b1", "c1"]);
        assert_eq!(flat.chain, vec![a, bb, c]);
    }

    #[test]
    fn test_inherited_relations_come_first() {
        let mut b = ModelGraph::builder();
        let m = b.module("hr");
        let person = b.entity(m, "Person");
        let employee = b.entity(m, "Employee");
        let address = b.entity(m, "Address");
        let desk = b.entity(m, "Desk");
        b.extends(employee, person);
        b.relation(person, "address", Cardinality::OneToOne, address);
        b.relation(employee, "desk", Cardinality::ManyToOne, desk);
        let graph = b.build().unwrap();

        let flat = flatten_one(&graph, employee).unwrap();
        assert_eq!(
            flat.relations,
            vec![
                RelationInfo::new(address, Cardinality::OneToOne, true),
                RelationInfo::new(desk, Cardinality::ManyToOne, true),
            ]
        );
    }

    #[test]
    fn test_cycle_is_reported_in_extends_order() {
        let mut b = ModelGraph::builder();
        let m = b.module("hr");
        let a = b.entity(m, "A");
        let bb = b.entity(m, "B");
        let c = b.entity(m, "C");
        b.extends(a, bb).extends(bb, a).extends(c, a);
        let graph = b.build().unwrap();

        match flatten_one(&graph, a) {
            Err(ResolveError::CyclicInheritance { cycle }) => {
                assert_eq!(cycle, vec!["hr.A", "hr.B", "hr.A"]);
            }
            other => panic!("Expected CyclicInheritance, got {:?}", other),
        }

        // Entering the cycle from outside reports only the cycle itself
        match flatten_one(&graph, c) {
            Err(ResolveError::CyclicInheritance { cycle }) => {
                assert_eq!(cycle, vec!["hr.A", "hr.B", "hr.A"]);
            }
            other => panic!("Expected CyclicInheritance, got {:?}", other),
        }
    }

    #[test]
    fn test_self_extension_is_a_cycle() {
        let mut b = ModelGraph::builder();
        let m = b.module("hr");
        let a = b.entity(m, "A");
        b.extends(a, "A");
        let graph = b.build().unwrap();

        assert!(matches!(
            flatten_one(&graph, a),
            Err(ResolveError::CyclicInheritance { cycle }) if cycle == vec!["hr.A", "hr.A"]
        ));
    }

    #[test]
    fn test_imported_base_stops_flattening() {
        let mut b = ModelGraph::builder();
        let m = b.module("hr");
        let lib = b.library("auth", "Auth", "com.acme.auth");
        let user = b.imported(lib, "User");
        let staff = b.entity(m, "Staff");
        let manager = b.entity(m, "Manager");
        b.extends(staff, user).extends(manager, staff);
        b.attribute(staff, Attribute::new("badge", DataType::String));
        let graph = b.build().unwrap();

        let flat = flatten_one(&graph, manager).unwrap();
        assert_eq!(flat.chain, vec![staff, manager]);
        assert_eq!(flat.opaque_base, Some(user));
        assert_eq!(flat.attributes.len(), 1);
    }

    #[test]
    fn test_dangling_superclass_means_no_inheritance() {
        let mut b = ModelGraph::builder();
        let m = b.module("hr");
        let orphan = b.entity(m, "Orphan");
        b.extends(orphan, "Ghost");
        b.attribute(orphan, Attribute::new("x", DataType::Integer));
        let graph = b.build().unwrap();

        let flat = flatten_one(&graph, orphan).unwrap();
        assert_eq!(flat.chain, vec![orphan]);
        assert_eq!(flat.attributes.len(), 1);
    }

    #[test]
    fn test_enum_attributes_resolve_or_stay_empty() {
        let mut b = ModelGraph::builder();
        let m = b.module("hr");
        let level = b.enumeration(EnumScope::Module(m), "Level", vec!["JUNIOR".into(), "SENIOR".into()]);
        let person = b.entity(m, "Person");
        b.enum_attribute(person, "level", "Level")
            .enum_attribute(person, "mood", "Mood");
        let graph = b.build().unwrap();

        let flat = flatten_one(&graph, person).unwrap();
        assert_eq!(flat.enum_attributes[0].enumeration, Some(level));
        assert_eq!(flat.enum_attributes[1].enumeration, None);
    }
}
