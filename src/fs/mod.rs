// src/fs/mod.rs

//! Filesystem access used by completion checks and in-process tasks.
//!
//! The output directories are the only channel through which cooperating
//! runs learn about each other, so every read goes through [`FileSystem`]
//! and tests can swap in [`mock::MockFileSystem`].

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Regular files directly inside `dir`, as full paths, sorted.
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write `contents` to `path`, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("reading dir {:?}", dir))? {
            let entry = entry.with_context(|| format!("reading entry in {:?}", dir))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
            }
        }
        fs::write(path, contents).with_context(|| format!("writing file {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_fs_lists_only_direct_files() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        fs.write(&dir.path().join("b.psmtsv"), b"x").unwrap();
        fs.write(&dir.path().join("a.psmtsv"), b"x").unwrap();
        fs.write(&dir.path().join("nested/c.psmtsv"), b"x").unwrap();

        let files = fs.list_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.psmtsv", "b.psmtsv"]);
        assert!(fs.is_dir(&dir.path().join("nested")));
    }

    #[test]
    fn listing_a_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RealFileSystem.list_files(&dir.path().join("nope")).is_err());
    }
}
