//! Model Loading
//!
//! Reads an already-parsed model from JSON: a single document, or a directory
//! of fragments that are merged into one model.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::Model;
use crate::error::{ResolveError, Result};

/// Configuration for model loading
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Skip fragments matching these path prefixes (relative to the model dir)
    pub skip_prefixes: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: vec![
                "target/".to_string(),
                ".git/".to_string(),
                "node_modules/".to_string(),
            ],
        }
    }
}

/// Parse a model from a JSON string
pub fn load_from_str(content: &str) -> Result<Model> {
    serde_json::from_str(content).map_err(|source| ResolveError::Json {
        path: PathBuf::from("<inline>"),
        source,
    })
}

/// Load a model from a single JSON file
pub fn load_from_file(path: &Path) -> Result<Model> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| ResolveError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and merge every `*.json` fragment under a directory.
///
/// Fragments are merged in sorted path order so the resulting module order
/// does not depend on the filesystem.
pub fn load_from_directory(model_dir: &Path, config: &LoadConfig) -> Result<Model> {
    let mut fragments: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(model_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }

        let relative = path.strip_prefix(model_dir).unwrap_or(path);
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        if config.skip_prefixes.iter().any(|p| relative_str.starts_with(p)) {
            continue;
        }

        fragments.push(path.to_path_buf());
    }

    fragments.sort();

    let mut model = Model::default();
    for path in &fragments {
        debug!(fragment = %path.display(), "loading model fragment");
        model.merge(load_from_file(path)?);
    }

    debug!(
        fragments = fragments.len(),
        modules = model.modules.len(),
        entities = model.entity_count(),
        "model loaded"
    );

    Ok(model)
}

/// Load from a file or a directory, whichever `path` is
pub fn load(path: &Path, config: &LoadConfig) -> Result<Model> {
    if path.is_dir() {
        load_from_directory(path, config)
    } else {
        load_from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_str_reports_inline_path() {
        let err = load_from_str("{ not json").unwrap_err();
        match err {
            ResolveError::Json { path, .. } => assert_eq!(path, PathBuf::from("<inline>")),
            other => panic!("Expected Json error, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_fragments_merge_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b.json"),
            r#"{ "modules": [{ "name": "billing", "entities": [] }] }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{ "name": "shop", "modules": [{ "name": "sales", "entities": [] }] }"#,
        )
        .unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(
            dir.path().join("target/ignored.json"),
            r#"{ "modules": [{ "name": "ignored" }] }"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a model").unwrap();

        let model = load_from_directory(dir.path(), &LoadConfig::default()).unwrap();
        let names: Vec<_> = model.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["sales", "billing"]);
        assert_eq!(model.name.as_deref(), Some("shop"));
    }
}
