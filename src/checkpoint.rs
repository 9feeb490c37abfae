//! On-disk checkpoint discovery.
//!
//! The checkpoint directory is re-scanned on every call, so checkpoints
//! added or removed on disk are reflected by the next query.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::PathConfig;

/// Locates checkpoint directories under a project root.
#[derive(Debug, Clone)]
pub struct CheckpointLocator {
    /// `<project_root>/<checkpoint_dir>`.
    checkpoint_dir: PathBuf,

    /// Required model directory-name prefix.
    model_prefix: String,
}

impl CheckpointLocator {
    pub fn new(project_root: &Path, checkpoint_dir: &str, model_prefix: impl Into<String>) -> Self {
        Self {
            checkpoint_dir: project_root.join(checkpoint_dir),
            model_prefix: model_prefix.into(),
        }
    }

    pub fn from_config(paths: &PathConfig) -> Self {
        Self::new(
            &paths.resolved_project_root(),
            &paths.checkpoint_dir,
            paths.model_prefix.clone(),
        )
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    pub fn model_prefix(&self) -> &str {
        &self.model_prefix
    }

    /// The checkpoint directory, if it exists on disk.
    pub fn list_checkpoint_roots(&self) -> Vec<PathBuf> {
        if self.checkpoint_dir.exists() {
            vec![self.checkpoint_dir.clone()]
        } else {
            Vec::new()
        }
    }

    /// Names of model subdirectories carrying the family prefix, sorted ascending.
    pub fn list_named_models(&self) -> Vec<String> {
        if !self.checkpoint_dir.exists() {
            return Vec::new();
        }

        let entries = match std::fs::read_dir(&self.checkpoint_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.checkpoint_dir.display(), "Cannot list checkpoints: {e}");
                return Vec::new();
            }
        };

        let mut models: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(&self.model_prefix))
            .collect();

        models.sort();
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_checkpoint_dir() {
        let root = tempfile::tempdir().unwrap();
        let locator = CheckpointLocator::new(root.path(), "checkpoints", "acestep-v15-");

        assert!(locator.list_checkpoint_roots().is_empty());
        assert!(locator.list_named_models().is_empty());
    }

    #[test]
    fn test_lists_prefixed_directories_sorted() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("checkpoints");
        for name in ["acestep-v15-turbo", "acestep-v15-base", "vae", "acestep-v10-old"] {
            std::fs::create_dir_all(dir.join(name)).unwrap();
        }
        std::fs::write(dir.join("acestep-v15-notes.txt"), b"not a model").unwrap();

        let locator = CheckpointLocator::new(root.path(), "checkpoints", "acestep-v15-");
        assert_eq!(locator.list_checkpoint_roots(), vec![dir]);
        assert_eq!(
            locator.list_named_models(),
            vec!["acestep-v15-base".to_string(), "acestep-v15-turbo".to_string()]
        );
    }
}
