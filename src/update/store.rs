//! Source unit storage

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Reads existing source units and writes merged ones
pub trait SourceStore {
    /// Read a unit, `None` when it does not exist
    fn read(&self, path: &Path) -> Result<Option<String>>;

    /// Replace a unit's content in one step
    fn write_atomic(&self, path: &Path, content: &str) -> Result<()>;
}

/// Filesystem-backed store
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl SourceStore for FsStore {
    fn read(&self, path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        // write next to the target so the rename stays on one filesystem
        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        temp.write_all(content.as_bytes())
            .context("Failed to write temporary file")?;
        temp.as_file()
            .sync_all()
            .context("Failed to flush temporary file")?;
        temp.persist(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(FsStore.read(&dir.path().join("absent.js")).unwrap().is_none());
    }

    #[test]
    fn test_write_atomic_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("api.js");

        FsStore.write_atomic(&path, "export const a = 1;\n").unwrap();
        assert_eq!(
            FsStore.read(&path).unwrap().as_deref(),
            Some("export const a = 1;\n")
        );

        FsStore.write_atomic(&path, "export const a = 2;\n").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "export const a = 2;\n"
        );

        // no temporary files left behind
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
