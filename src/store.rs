//! Intermediate timesheet file written by the dump flow and read back by replay.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::entry::WorklogEntry;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access timesheet file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid timesheet file {path}: {source}")]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Writes entries as a pretty-printed JSON array, preserving their order.
pub fn save_entries(path: &Path, entries: &[WorklogEntry]) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let content = serde_json::to_string_pretty(entries).map_err(|source| StoreError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(io_error)?;
    info!("Wrote {} entries to {}", entries.len(), path.display());
    Ok(())
}

pub fn load_entries(path: &Path) -> Result<Vec<WorklogEntry>, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Format {
        path: path.to_path_buf(),
        source,
    })
}
