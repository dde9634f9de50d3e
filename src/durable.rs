//! Atomic whole-file replacement
//!
//! The new contents are staged in a sibling temp file, synced, and renamed
//! over the target. Readers see either the old file or the new one.

use crate::error::Result;
use rand::Rng;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replace `path` with `contents` atomically
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let staging = staging_path(path);
    let result = stage_and_rename(path, &staging, contents);
    if result.is_err() {
        // The staging file may not exist if creating it failed.
        let _ = fs::remove_file(&staging);
    }
    result
}

fn stage_and_rename(path: &Path, staging: &Path, contents: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(staging)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(staging, path)?;
    sync_parent_dir(path)?;
    tracing::debug!(
        target: "cowtree::durable",
        path = %path.display(),
        bytes = contents.len(),
        "atomic write complete"
    );
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let suffix: u64 = rand::thread_rng().gen();
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".tmp.{:016x}", suffix));
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

// Directories cannot be opened for syncing here; the rename is still atomic.
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}
