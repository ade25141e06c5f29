// Stages source text in a fresh in-memory directory for the loader.

use capnp_schema_compiler::vfs::VfsError;
use capnp_schema_compiler::InMemoryDirectory;

/// A directory holding exactly one file, `name`, with `text` as contents.
pub fn stage_source(name: &str, text: &str) -> Result<InMemoryDirectory, VfsError> {
    let mut dir = InMemoryDirectory::new();
    dir.write_file(name, text)?;
    tracing::debug!(name, bytes = text.len(), "staged source");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capnp_schema_compiler::ReadableDirectory;

    #[test]
    fn directory_contains_only_the_staged_file() {
        let dir = stage_source("index.capnp", "@0xbf5147cbbecf40c1;\n").unwrap();
        assert_eq!(dir.len(), 1);
        assert_eq!(
            dir.read_file("index.capnp").as_deref(),
            Some("@0xbf5147cbbecf40c1;\n")
        );
        assert!(!dir.exists("other.capnp"));
    }

    #[test]
    fn each_stage_is_independent() {
        let first = stage_source("index.capnp", "a").unwrap();
        let second = stage_source("index.capnp", "b").unwrap();
        assert_eq!(first.read_file("index.capnp").as_deref(), Some("a"));
        assert_eq!(second.read_file("index.capnp").as_deref(), Some("b"));
    }

    #[test]
    fn invalid_name_is_rejected() {
        assert!(stage_source("../index.capnp", "").is_err());
    }
}
