// src/utils/fs.rs
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{FinderResult, FinderError};

/// Replace `path` with `contents` through a temporary file in the same directory
pub fn write_atomic(path: &Path, contents: &[u8]) -> FinderResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| FinderError::file(&dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| FinderError::file(&dir, e))?;
    tmp.write_all(contents).map_err(|e| FinderError::file(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| FinderError::file(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");

        write_atomic(&path, b"{\"a\": 1}").unwrap();
        write_atomic(&path, b"{\"a\": 2}").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\": 2}");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
