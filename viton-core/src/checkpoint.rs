//! Checkpoint discovery under the model root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const CHECKPOINT_SUBDIR: &str = "checkpoints";
pub const DEFAULT_CHECKPOINT: &str = "gen.pkl";

/// On-disk encoding of a checkpoint, detected from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// `torch.save` output (`.pkl`, `.pth`, `.pt`).
    Pickle,
    SafeTensors,
}

impl CheckpointFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pkl" | "pth" | "pt" => Some(Self::Pickle),
            "safetensors" => Some(Self::SafeTensors),
            _ => None,
        }
    }
}

pub fn checkpoint_dir(model_root: &Path) -> PathBuf {
    model_root.join(CHECKPOINT_SUBDIR)
}

/// Names of the loadable checkpoints in `dir`, sorted. A missing directory
/// has no checkpoints.
pub fn list_checkpoints(dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if CheckpointFormat::from_path(&path).is_none() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub fn resolve_checkpoint(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    if !path.is_file() {
        return Err(Error::CheckpointNotFound { path });
    }
    Ok(path)
}
