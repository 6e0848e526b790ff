//! File system helpers
//!
//! The artifact is written atomically (tempfile in the target directory,
//! then rename) so a failed run never leaves a half-written Dockerfile.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::StevedoreResult;

/// Write content to a file atomically
pub fn write_atomic(path: &Path, content: &str) -> StevedoreResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Dockerfile");

        write_atomic(&path, "FROM debian\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "FROM debian\n");
    }

    #[test]
    fn test_write_atomic_overwrites_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        std::fs::write(&path, "old").unwrap();

        write_atomic(&path, "new").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_write_atomic_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/deep/Dockerfile");

        write_atomic(&path, "FROM debian\n").unwrap();

        assert!(path.exists());
    }
}
