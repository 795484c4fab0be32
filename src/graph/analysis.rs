//! Model Graph Analysis
//!
//! Whole-graph facts that emitters need but no single entity can answer:
//! which entities are used as supertypes, how modules depend on each other
//! (and where they do so mutually), plus a GraphViz export.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeSet;

use super::resolve::Resolver;
use super::{EntityId, EntityRef, EnumScope, ModelGraph, ModuleId, Target};

/// Local entities some local entity extends
pub fn supertypes(graph: &ModelGraph) -> BTreeSet<EntityId> {
    let resolver = Resolver::new(graph);
    graph
        .entity_ids()
        .filter_map(|id| resolver.superclass_of(id).and_then(EntityRef::as_local))
        .collect()
}

/// Module-level dependency graph.
///
/// An edge `a -> b` means some entity of `a` extends, declares a relation to,
/// or uses an enumeration of module `b`. Node indices follow module order.
pub fn module_dependency_graph(graph: &ModelGraph) -> DiGraph<ModuleId, ()> {
    let resolver = Resolver::new(graph);
    let mut deps = DiGraph::with_capacity(graph.module_count(), 0);
    for module in graph.module_ids() {
        deps.add_node(module);
    }

    let module_of = |target: Target| match target {
        Target::Local(id) => Some(graph.entity(id).module),
        Target::Enum(id) => match graph.enumeration(id).scope {
            EnumScope::Module(m) => Some(m),
            EnumScope::Model => None,
        },
        Target::Imported(_) => None,
    };

    for entity in graph.entity_ids() {
        let node = graph.entity(entity);
        let mut targets: Vec<Target> = Vec::new();

        if let Some(parent) = resolver.superclass_of(entity) {
            targets.push(parent.into());
        }
        targets.extend(
            node.relations
                .iter()
                .filter_map(|r| resolver.resolve_entity(&r.target, node.module))
                .map(Target::from),
        );
        targets.extend(
            node.enum_attributes
                .iter()
                .filter_map(|a| resolver.resolve_enum(&a.enumeration, node.module))
                .map(Target::Enum),
        );

        for target in targets {
            if let Some(other) = module_of(target) {
                if other != node.module {
                    deps.update_edge(
                        NodeIndex::new(node.module.to_index()),
                        NodeIndex::new(other.to_index()),
                        (),
                    );
                }
            }
        }
    }

    deps
}

/// Groups of modules that depend on each other, each sorted, sorted overall
pub fn module_cycles(graph: &ModelGraph) -> Vec<Vec<ModuleId>> {
    let deps = module_dependency_graph(graph);

    let mut cycles: Vec<Vec<ModuleId>> = kosaraju_scc(&deps)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut members: Vec<ModuleId> = scc.iter().map(|idx| deps[*idx]).collect();
            members.sort();
            members
        })
        .collect();

    cycles.sort();
    cycles
}

/// Export entities with inheritance and relation edges as GraphViz DOT
pub fn to_dot(graph: &ModelGraph) -> String {
    let resolver = Resolver::new(graph);
    let mut output = String::new();

    output.push_str("digraph ModelGraph {\n");
    output.push_str("  rankdir=LR;\n");
    output.push_str("  node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\", fontsize=10];\n");
    output.push_str("  edge [fontname=\"Helvetica\", fontsize=8, fontcolor=\"#808080\"];\n");
    output.push('\n');

    let node_id = |target: Target| graph.qualified_name(target).replace(['.', '-'], "_");

    for module in graph.module_ids() {
        let m = graph.module(module);
        output.push_str(&format!("  subgraph \"cluster_{}\" {{\n", m.name));
        output.push_str(&format!("    label=\"{}\";\n", m.name));
        for &entity in &m.entities {
            let node = graph.entity(entity);
            let fill = if node.is_abstract { "#E0E0E0" } else { "#B3E5FC" };
            output.push_str(&format!(
                "    \"{}\" [label=\"{}\", fillcolor=\"{}\"];\n",
                node_id(Target::Local(entity)),
                node.name,
                fill
            ));
        }
        output.push_str("  }\n");
    }

    for imported in graph.imported_ids() {
        let target = Target::Imported(imported);
        output.push_str(&format!(
            "  \"{}\" [label=\"{}\", style=dashed];\n",
            node_id(target),
            graph.qualified_name(target)
        ));
    }

    output.push('\n');

    for entity in graph.entity_ids() {
        let node = graph.entity(entity);
        let from = node_id(Target::Local(entity));

        if let Some(parent) = resolver.superclass_of(entity) {
            output.push_str(&format!(
                "  \"{}\" -> \"{}\" [arrowhead=empty];\n",
                from,
                node_id(parent.into())
            ));
        }

        for relation in &node.relations {
            if let Some(target) = resolver.resolve_entity(&relation.target, node.module) {
                output.push_str(&format!(
                    "  \"{}\" -> \"{}\" [label=\"{} ({})\"];\n",
                    from,
                    node_id(target.into()),
                    relation.name,
                    relation.cardinality
                ));
            }
        }
    }

    output.push_str("}\n");
    output
}
