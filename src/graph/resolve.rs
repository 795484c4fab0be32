//! Reference Resolution
//!
//! Turns a [`Reference`] into a concrete [`Target`], or nothing. Resolution is
//! pure and idempotent: a direct handle comes back unchanged, a name is looked
//! up against the graph's indexes from the point of view of a module.
//!
//! Lookup order for names:
//! 1. exact qualified name (`module.Entity`, `import.Entity`, `Enum`)
//! 2. entity or enumeration declared in the referring module
//! 3. model-level enumeration
//! 4. imported entity with that simple name, when unique
//! 5. any target with that simple name, when unique
//!
//! A candidate of the wrong kind (an enumeration where an entity is expected)
//! never matches.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use super::{EntityId, EntityRef, EnumId, ModelGraph, ModuleId, Reference, Target};

/// Resolves references against one model graph
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'g> {
    graph: &'g ModelGraph,
}

impl<'g> Resolver<'g> {
    pub fn new(graph: &'g ModelGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &'g ModelGraph {
        self.graph
    }

    /// Resolve a reference of any kind
    pub fn resolve(&self, reference: &Reference, scope: ModuleId) -> Option<Target> {
        self.resolve_where(reference, scope, |_| true)
    }

    /// Resolve a reference that must name an entity (local or imported)
    pub fn resolve_entity(&self, reference: &Reference, scope: ModuleId) -> Option<EntityRef> {
        self.resolve_where(reference, scope, |t| t.as_entity().is_some())
            .and_then(Target::as_entity)
    }

    /// Resolve a reference that must name an enumeration
    pub fn resolve_enum(&self, reference: &Reference, scope: ModuleId) -> Option<EnumId> {
        self.resolve_where(reference, scope, |t| t.as_enum().is_some())
            .and_then(Target::as_enum)
    }

    /// The resolved superclass of a local entity, if it has one
    pub fn superclass_of(&self, entity: EntityId) -> Option<EntityRef> {
        let node = self.graph.entity(entity);
        let reference = node.superclass.as_ref()?;
        self.resolve_entity(reference, node.module)
    }

    fn resolve_where<F>(&self, reference: &Reference, scope: ModuleId, accept: F) -> Option<Target>
    where
        F: Fn(Target) -> bool,
    {
        match reference {
            Reference::Direct(target) => {
                let target = *target;
                (self.graph.contains(target) && accept(target)).then_some(target)
            }
            Reference::Named(name) => self.lookup(name, scope, &accept),
        }
    }

    fn lookup<F>(&self, name: &str, scope: ModuleId, accept: &F) -> Option<Target>
    where
        F: Fn(Target) -> bool,
    {
        let graph = self.graph;

        if let Some(&target) = graph.by_qualified.get(name) {
            if accept(target) {
                return Some(target);
            }
        }

        if let Some(&target) = graph
            .module_scope
            .get(scope.to_index())
            .and_then(|scope| scope.get(name))
        {
            if accept(target) {
                return Some(target);
            }
        }

        if let Some(&id) = graph.model_enums.get(name) {
            let target = Target::Enum(id);
            if accept(target) {
                return Some(target);
            }
        }

        let candidates: Vec<Target> = graph
            .by_simple
            .get(name)
            .map(|targets| targets.iter().copied().filter(|t| accept(*t)).collect())
            .unwrap_or_default();

        let imported: Vec<Target> = candidates
            .iter()
            .copied()
            .filter(|t| matches!(t, Target::Imported(_)))
            .collect();
        if imported.len() == 1 {
            return Some(imported[0]);
        }

        if candidates.len() == 1 {
            return Some(candidates[0]);
        }

        None
    }

    /// Closest known entity name to `query`, for error messages
    pub fn suggest_entity(&self, query: &str) -> Option<String> {
        let matcher = SkimMatcherV2::default();
        let graph = self.graph;

        graph
            .by_qualified
            .iter()
            .filter(|(_, target)| target.as_entity().is_some())
            .filter_map(|(name, _)| {
                let simple = name.rsplit('.').next().unwrap_or(name);
                let score = matcher
                    .fuzzy_match(name, query)
                    .into_iter()
                    .chain(matcher.fuzzy_match(query, simple))
                    .max()?;
                Some((score, name))
            })
            // Highest score first, then name for a stable pick
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, name)| name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EnumScope;

    fn fixture() -> (ModelGraph, ModuleId, ModuleId) {
        let mut b = ModelGraph::builder();
        let sales = b.module("sales");
        let hr = b.module("hr");
        b.entity(sales, "Order");
        b.entity(sales, "Item");
        b.entity(hr, "Item");
        b.entity(hr, "Person");
        b.enumeration(EnumScope::Module(sales), "Status", vec!["OPEN".into()]);
        b.enumeration(EnumScope::Model, "Currency", vec![]);
        let lib = b.library("auth", "Auth", "com.acme.auth");
        b.imported(lib, "User");
        (b.build().unwrap(), sales, hr)
    }

    #[test]
    fn test_direct_reference_is_idempotent() {
        let (graph, sales, _) = fixture();
        let resolver = Resolver::new(&graph);
        let order = graph.find_entity("sales.Order").unwrap();

        let once = resolver.resolve(&Reference::from(order), sales).unwrap();
        let twice = resolver.resolve(&Reference::Direct(once), sales).unwrap();
        assert_eq!(once, Target::Local(order));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dangling_direct_handle_is_absent() {
        let (graph, sales, _) = fixture();
        let resolver = Resolver::new(&graph);
        let bogus = Reference::Direct(Target::Local(EntityId(99)));
        assert_eq!(resolver.resolve(&bogus, sales), None);
    }

    #[test]
    fn test_named_lookup_prefers_own_module() {
        let (graph, sales, hr) = fixture();
        let resolver = Resolver::new(&graph);

        let from_sales = resolver.resolve_entity(&"Item".into(), sales).unwrap();
        let from_hr = resolver.resolve_entity(&"Item".into(), hr).unwrap();
        assert_eq!(from_sales, EntityRef::Local(graph.find_entity("sales.Item").unwrap()));
        assert_eq!(from_hr, EntityRef::Local(graph.find_entity("hr.Item").unwrap()));
    }

    #[test]
    fn test_cross_module_and_imported_lookup() {
        let (graph, sales, _) = fixture();
        let resolver = Resolver::new(&graph);

        let person = resolver.resolve_entity(&"Person".into(), sales);
        assert_eq!(person, Some(EntityRef::Local(graph.find_entity("hr.Person").unwrap())));

        let qualified = resolver.resolve_entity(&"hr.Person".into(), sales);
        assert_eq!(qualified, person);

        let user = resolver.resolve_entity(&"User".into(), sales);
        assert!(matches!(user, Some(EntityRef::Imported(_))));
        assert_eq!(resolver.resolve_entity(&"auth.User".into(), sales), user);
    }

    #[test]
    fn test_ambiguous_and_unknown_names_are_absent() {
        let mut b = ModelGraph::builder();
        let sales = b.module("sales");
        let hr = b.module("hr");
        let billing = b.module("billing");
        b.entity(sales, "Item");
        b.entity(hr, "Item");
        let graph = b.build().unwrap();
        let resolver = Resolver::new(&graph);

        // "Item" is declared in two other modules
        assert_eq!(resolver.resolve(&"Item".into(), billing), None);
        assert_eq!(resolver.resolve(&"Nope".into(), billing), None);
    }

    #[test]
    fn test_wrong_kind_is_absent() {
        let (graph, sales, _) = fixture();
        let resolver = Resolver::new(&graph);

        assert_eq!(resolver.resolve_entity(&"Status".into(), sales), None);
        assert!(resolver.resolve_enum(&"Status".into(), sales).is_some());
        assert!(resolver.resolve_enum(&"Currency".into(), sales).is_some());
        assert_eq!(resolver.resolve_enum(&"Order".into(), sales), None);
    }

    #[test]
    fn test_superclass_absent_when_unset_or_dangling() {
        let mut b = ModelGraph::builder();
        let m = b.module("hr");
        let root = b.entity(m, "Root");
        let orphan = b.entity(m, "Orphan");
        b.extends(orphan, "Missing");
        let graph = b.build().unwrap();
        let resolver = Resolver::new(&graph);

        assert_eq!(resolver.superclass_of(root), None);
        assert_eq!(resolver.superclass_of(orphan), None);
    }

    #[test]
    fn test_suggestion_for_typo() {
        let (graph, _, _) = fixture();
        let resolver = Resolver::new(&graph);
        assert_eq!(resolver.suggest_entity("Persn").as_deref(), Some("hr.Person"));
    }
}
