//! MANIFEST/CURRENT persistence.
//!
//! The database's table of contents — which SSTs exist, at which
//! level, and the rest of [`crate::version::VersionSet`]'s bookkeeping
//! — is itself persisted as a log of [`crate::version::VersionEdit`]
//! records, framed exactly like a WAL (see [`crate::wal`]) and named
//! `MANIFEST-<number>`. `CURRENT` is a one-line pointer file holding
//! the name of whichever MANIFEST is active; it's what makes switching
//! to a freshly-written MANIFEST atomic from the perspective of a
//! process crashing mid-switch.
//!
//! This module owns only the file-level protocol (naming, the atomic
//! `CURRENT` swap); the decision of *when* to roll to a new MANIFEST
//! and what edits to append lives in [`crate::version::VersionSet`].


use crate::filename::{current_file_name, descriptor_file_name, temp_file_name};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CURRENT file is empty or missing a trailing newline")]
    MalformedCurrentFile,
}

/// Atomically points `CURRENT` at `MANIFEST-<manifest_file_number>`.
///
/// Writes the new content to a temp file, syncs it, then renames it
/// over `CURRENT` — a rename within the same directory is atomic on
/// every filesystem this engine targets, so a crash either leaves the
/// old `CURRENT` intact or the new one fully written, never a partial
/// file.
pub fn set_current_file(db_path: &Path, manifest_file_number: u64) -> Result<(), ManifestError> {
    let manifest_name = descriptor_file_name(db_path, manifest_file_number)
        .file_name()
        .expect("descriptor_file_name always has a file name component")
        .to_string_lossy()
        .into_owned();

    let temp_path = temp_file_name(db_path, manifest_file_number);
    {
        let mut f = File::create(&temp_path)?;
        f.write_all(manifest_name.as_bytes())?;
        f.write_all(b"\n")?;
        f.sync_all()?;
    }
    fs::rename(&temp_path, current_file_name(db_path))?;
    Ok(())
}

/// Reads `CURRENT` and returns the full path to the MANIFEST it names.
pub fn current_manifest_path(db_path: &Path) -> Result<PathBuf, ManifestError> {
    let contents = fs::read_to_string(current_file_name(db_path))?;
    let name = contents.strip_suffix('\n').ok_or(ManifestError::MalformedCurrentFile)?;
    if name.is_empty() {
        return Err(ManifestError::MalformedCurrentFile);
    }
    Ok(db_path.join(name))
}
