//! Filesystem primitives
//!
//! Documents are written through a temp file in the target directory and
//! renamed into place, so a reader never observes a partial write. Moves
//! prefer an atomic rename and fall back to copy-then-delete when the rename
//! cannot be done (e.g. across devices).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use evidence_core::{EvidenceError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub(crate) fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Create a directory and all parents; failures carry the attempted path.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| EvidenceError::io("create_dir", dir, e))
}

pub(crate) fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    let parent = target.parent().ok_or_else(|| {
        EvidenceError::InvalidInput(format!("path has no parent: {}", target.display()))
    })?;
    ensure_dir(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| EvidenceError::io("create_temp", parent, e))?;
    temp.write_all(data)
        .map_err(|e| EvidenceError::io("write", temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| EvidenceError::io("sync", temp.path(), e))?;
    temp.persist(target)
        .map_err(|e| EvidenceError::io("persist", target, e.error))?;
    Ok(())
}

pub(crate) fn write_yaml<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    let yaml = serde_yaml::to_string(value).map_err(|e| EvidenceError::serialize(what, e))?;
    atomic_write(path, yaml.as_bytes())
}

/// Pretty JSON with 2-space indentation
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| EvidenceError::serialize(what, e))?;
    atomic_write(path, &json)
}

fn read_string(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EvidenceError::not_found(what, path)
        } else {
            EvidenceError::io("read", path, e)
        }
    })
}

/// Missing file is `NotFound`; unparsable content is `Malformed`.
pub(crate) fn read_yaml<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = read_string(path, what)?;
    serde_yaml::from_str(&raw).map_err(|e| EvidenceError::malformed(path, e))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = read_string(path, what)?;
    serde_json::from_str(&raw).map_err(|e| EvidenceError::malformed(path, e))
}

/// Entries of a directory; a missing directory yields an empty list.
pub(crate) fn read_dir_or_empty(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    match fs::read_dir(dir) {
        Ok(iter) => iter
            .map(|entry| entry.map_err(|e| EvidenceError::io("read_dir", dir, e)))
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(EvidenceError::io("read_dir", dir, e)),
    }
}

/// Move a file or directory, never leaving a half-written destination.
pub(crate) fn move_path(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(from = %from.display(), to = %to.display(), error = %err, "rename failed, copying");
            copy_then_remove(from, to)
        }
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(from).map_err(|e| EvidenceError::io("stat", from, e))?;
    if meta.is_dir() {
        copy_dir(from, to)?;
        fs::remove_dir_all(from).map_err(|e| EvidenceError::io("remove_dir", from, e))
    } else {
        let data = fs::read(from).map_err(|e| EvidenceError::io("read", from, e))?;
        atomic_write(to, &data)?;
        fs::remove_file(from).map_err(|e| EvidenceError::io("remove", from, e))
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    ensure_dir(to)?;
    for entry in read_dir_or_empty(from)? {
        let src: PathBuf = entry.path();
        let dest = to.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| EvidenceError::io("stat", &src, e))?;
        if file_type.is_dir() {
            copy_dir(&src, &dest)?;
        } else {
            let data = fs::read(&src).map_err(|e| EvidenceError::io("read", &src, e))?;
            atomic_write(&dest, &data)?;
        }
    }
    Ok(())
}
