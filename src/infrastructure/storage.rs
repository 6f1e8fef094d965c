use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::application::use_cases::csv_converter::RowArtifact;
use crate::domain::error::{AppError, Result};

fn io_err(msg: impl Into<String>) -> AppError {
    AppError::IoError(msg.into())
}

/// Where conversion runs are delivered: one directory per run under `root`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn ensure(&self) -> Result<()> {
        ensure_dir(&self.root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    /// Write every artifact of a run, or nothing at all.
    pub fn write_run(&self, artifacts: &[RowArtifact]) -> Result<(String, PathBuf)> {
        let run_id = Uuid::new_v4().to_string();
        let run_dir = self.run_dir(&run_id);
        atomic_write_dir(&run_dir, |dir| {
            for artifact in artifacts {
                let path = dir.join(&artifact.filename);
                fs::write(&path, &artifact.bytes).map_err(|e| {
                    io_err(format!("Failed to write {}: {e}", path.display()))
                })?;
            }
            Ok(())
        })?;
        Ok((run_id, run_dir))
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| io_err(format!("Failed to create {}: {e}", path.display())))?;
    }
    Ok(())
}

/// Populate a temp sibling directory, then rename it into place.
pub fn atomic_write_dir(
    target_dir: &Path,
    populate: impl FnOnce(&Path) -> Result<()>,
) -> Result<()> {
    if let Some(parent) = target_dir.parent() {
        ensure_dir(parent)?;
    }

    let tmp_dir = target_dir.with_extension(format!("tmp-{}", Uuid::new_v4()));
    ensure_dir(&tmp_dir)?;

    if let Err(e) = populate(&tmp_dir) {
        let _ = fs::remove_dir_all(&tmp_dir);
        return Err(e);
    }

    if target_dir.exists() {
        let _ = fs::remove_dir_all(&tmp_dir);
        return Err(AppError::ValidationError(format!(
            "Target directory already exists: {}",
            target_dir.display()
        )));
    }

    fs::rename(&tmp_dir, target_dir).map_err(|e| {
        io_err(format!(
            "Failed to rename temp dir {} to {}: {e}",
            tmp_dir.display(),
            target_dir.display()
        ))
    })?;

    Ok(())
}
