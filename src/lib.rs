//! Entity Resolver
//!
//! Resolution engine for declarative domain models: modules of entities with
//! attributes, enumerations, single inheritance, inter-entity relations and
//! imports from external libraries.
//!
//! For every entity it answers, once and consistently for all emitters:
//!
//! - **Relations**: every declaration classified into two ownership-resolved
//!   [`RelationInfo`](graph::RelationInfo) records, one per side
//! - **Flattening**: inherited-then-own attributes and relations
//! - **Sequencing**: an emission order in which every base precedes its
//!   descendants
//! - **Imports**: the deduplicated cross-module and cross-library symbols a
//!   module references
//!
//! ## Architecture
//!
//! ```text
//! Model (JSON) ──> ModelGraph ──> Resolution ──> EntityView / ResolutionReport
//!                     │
//!                     ├── Resolver        (references → handles)
//!                     ├── RelationMap     (built once, read-only)
//!                     ├── Flattener
//!                     ├── sequence()
//!                     └── ImportTracker
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod resolution;

pub use config::{EmissionUnit, OutputFormat, ResolutionConfig, ResolverConfig};
pub use error::{ResolveError, Result};
pub use graph::{
    Diagnostics, EntityId, EntityRef, ImportFact, ImportOrigin, ImportSet, ModelGraph, ModuleId,
    Reference, RelationInfo, RelationMap, Target,
};
pub use model::{Cardinality, Model};
pub use resolution::{EntityView, Resolution, ResolutionReport};
