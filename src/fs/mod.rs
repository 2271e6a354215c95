// src/fs/mod.rs

//! Filesystem access behind a trait.
//!
//! Task execution, file selection and the watcher's content hashing all go
//! through [`FileSystem`], so the graph semantics can be tested against the
//! in-memory [`mock::MockFileSystem`]. Only `style-compile` bypasses it: the
//! external compiler reads its entry file (and imports) from disk itself.

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    /// Write `contents`, creating parent directories. A reader never observes
    /// a half-written file, and a failed write leaves no temporary behind.
    ///
    /// Atomicity is per file: callers writing several files can still stop
    /// halfway through the batch.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
    /// Recursively delete a directory. Deleting a missing directory is not an
    /// error.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;

        let file_name = path
            .file_name()
            .with_context(|| format!("no file name in {:?}", path))?;
        let mut tmp_name = std::ffi::OsString::from(".");
        tmp_name.push(file_name);
        tmp_name.push(".sitepipe-tmp");
        let tmp = parent.join(tmp_name);

        let committed = fs::File::create(&tmp)
            .with_context(|| format!("creating file {:?}", tmp))
            .and_then(|mut file| {
                file.write_all(contents)
                    .with_context(|| format!("writing to file {:?}", tmp))
            })
            .and_then(|()| {
                fs::rename(&tmp, path)
                    .with_context(|| format!("renaming {:?} to {:?}", tmp, path))
            });

        if committed.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        committed
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing dir {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parents_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        let target = dir.path().join("css/style.min.css");

        fs.write(&target, b"a{}").unwrap();

        assert_eq!(fs.read(&target).unwrap(), b"a{}");
        let names: Vec<_> = fs
            .read_dir(&dir.path().join("css"))
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["style.min.css".to_string()]);
    }

    #[test]
    fn failed_write_removes_its_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        // A non-empty directory cannot be replaced by a file.
        let target = dir.path().join("img");
        std::fs::create_dir_all(target.join("icons")).unwrap();

        assert!(fs.write(&target, b"x").is_err());

        let mut names: Vec<_> = fs
            .read_dir(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["img".to_string()]);
    }

    #[test]
    fn removing_missing_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        RealFileSystem
            .remove_dir_all(&dir.path().join("build"))
            .unwrap();
    }
}
