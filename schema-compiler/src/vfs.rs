// In-memory directory used to hand source text to the module loader
// without touching real storage.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VfsError {
    #[error("invalid path '{0}'")]
    InvalidPath(String),
}

/// Read access to a tree of schema files, keyed by normalized path.
pub trait ReadableDirectory {
    fn read_file(&self, path: &str) -> Option<String>;

    fn exists(&self, path: &str) -> bool {
        self.read_file(path).is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    files: BTreeMap<String, String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the file at `path` with `content`.
    pub fn write_file(&mut self, path: &str, content: &str) -> Result<(), VfsError> {
        let normalized =
            normalize_path(path).ok_or_else(|| VfsError::InvalidPath(path.to_string()))?;
        self.files.insert(normalized, content.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl ReadableDirectory for InMemoryDirectory {
    fn read_file(&self, path: &str) -> Option<String> {
        let normalized = normalize_path(path)?;
        self.files.get(&normalized).cloned()
    }
}

/// Collapse `.` and `..` segments and duplicate separators. Returns `None`
/// for an empty path or one that climbs above the directory root.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Resolve an import path written inside `importer`. A leading `/` is taken
/// from the directory root, anything else is relative to the importer.
pub fn resolve_import_path(importer: &str, import: &str) -> Option<String> {
    if let Some(absolute) = import.strip_prefix('/') {
        return normalize_path(absolute);
    }
    let base = match importer.rfind('/') {
        Some(slash) => &importer[..slash],
        None => "",
    };
    normalize_path(&format!("{}/{}", base, import))
}
