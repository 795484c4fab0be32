//! Error types for model resolution

use std::path::PathBuf;

use thiserror::Error;

use crate::model::Cardinality;

/// Result type for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Fatal resolution errors.
///
/// Any of these aborts the whole pass; there is no partial output.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(
        "Dangling relation target: {entity}.{relation} ({cardinality}) points at unknown entity '{target}'{}",
        suggestion_suffix(.suggestion)
    )]
    DanglingRelationTarget {
        entity: String,
        relation: String,
        cardinality: Cardinality,
        target: String,
        suggestion: Option<String>,
    },

    #[error("Cyclic inheritance: {}", .cycle.join(" -> "))]
    CyclicInheritance { cycle: Vec<String> },

    #[error("Cyclic emission dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Duplicate definition: {name}")]
    DuplicateDefinition { name: String },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Resolution produced {count} warning(s) and deny_warnings is set")]
    DeniedWarnings { count: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{}'?)", name),
        None => String::new(),
    }
}
