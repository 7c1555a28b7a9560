//! Quarantine Manager - moves declaration files between the active and retired directories
//!
//! A declaration file always lives in exactly one of the two directories. Moves
//! are renames; when the retired directory sits on another filesystem the file
//! is copied and the original removed only after the copy succeeded.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Active/retired directory pair
#[derive(Debug, Clone)]
pub struct Quarantine {
    active_dir: PathBuf,
    retired_dir: PathBuf,
}

impl Quarantine {
    pub fn new(active_dir: impl Into<PathBuf>, retired_dir: impl Into<PathBuf>) -> Self {
        Self {
            active_dir: active_dir.into(),
            retired_dir: retired_dir.into(),
        }
    }

    pub fn active_dir(&self) -> &Path {
        &self.active_dir
    }

    pub fn retired_dir(&self) -> &Path {
        &self.retired_dir
    }

    /// Create the retired directory if needed. Returns true when it was created.
    pub fn ensure_retired_dir(&self) -> Result<bool> {
        if self.retired_dir.is_dir() {
            return Ok(false);
        }

        fs::create_dir_all(&self.retired_dir).with_context(|| {
            format!(
                "Failed to create retired directory: {}",
                self.retired_dir.display()
            )
        })?;

        info!("Created retired directory: {}", self.retired_dir.display());
        Ok(true)
    }

    /// Move `filename` from the active directory into the retired directory
    pub fn quarantine(&self, filename: &str) -> Result<()> {
        info!("Retiring {}", filename);
        move_file(&self.active_dir, &self.retired_dir, filename)
    }

    /// Move `filename` from the retired directory back into the active directory
    pub fn restore(&self, filename: &str) -> Result<()> {
        info!("Reviving {}", filename);
        move_file(&self.retired_dir, &self.active_dir, filename)
    }
}

fn move_file(from_dir: &Path, to_dir: &Path, filename: &str) -> Result<()> {
    let source = from_dir.join(filename);
    let destination = to_dir.join(filename);

    if !source.is_file() {
        bail!("Cannot move {}: file not found", source.display());
    }
    if destination.exists() {
        bail!(
            "Cannot move {}: {} already exists",
            source.display(),
            destination.display()
        );
    }

    match fs::rename(&source, &destination) {
        Ok(()) => {}
        Err(e) => {
            debug!(
                "Rename {} -> {} failed ({}), copying instead",
                source.display(),
                destination.display(),
                e
            );
            copy_then_remove(&source, &destination)?;
        }
    }

    debug!("Moved {} -> {}", source.display(), destination.display());
    Ok(())
}

fn copy_then_remove(source: &Path, destination: &Path) -> Result<()> {
    if let Err(e) = fs::copy(source, destination) {
        // Never leave a partial copy behind
        let _ = fs::remove_file(destination);
        return Err(e).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                destination.display()
            )
        });
    }

    fs::remove_file(source)
        .with_context(|| format!("Failed to remove {} after copy", source.display()))
}
