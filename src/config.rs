//! Runtime configuration for accel-probe.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! Handler device selection, checkpoint layout and the optional loaded model
//! configuration live here.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "accel-probe", about = "Accelerator capability and memory report")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "accel.json")]
    pub config: PathBuf,

    /// Device specification overriding the configured one (e.g. "cuda:0", "mps").
    #[arg(short, long)]
    pub device: Option<String>,

    /// Project root containing the checkpoint directory.
    #[arg(long)]
    pub project_root: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Device selection.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Checkpoint layout.
    #[serde(default)]
    pub paths: PathConfig,

    /// Configuration of the currently loaded model, if any.
    #[serde(default)]
    pub model: Option<ModelConfig>,
}

/// Device selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device specification: a backend tag with an optional ordinal
    /// ("cuda", "cuda:1", "xpu", "mps", "cpu") or "auto".
    pub device: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device: "auto".to_string(),
        }
    }
}

/// Checkpoint layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Project root (None = current working directory).
    pub project_root: Option<PathBuf>,

    /// Name of the checkpoint directory under the project root.
    pub checkpoint_dir: String,

    /// Directory-name prefix identifying models of the served family.
    pub model_prefix: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            project_root: None,
            checkpoint_dir: "checkpoints".to_string(),
            model_prefix: "acestep-v15-".to_string(),
        }
    }
}

impl PathConfig {
    /// Resolve the project root, falling back to the working directory.
    pub fn resolved_project_root(&self) -> PathBuf {
        match &self.project_root {
            Some(root) => root.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Configuration of a loaded model.
///
/// Flags absent from the source document take their declared defaults, so
/// callers never probe for optional attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name (usually the checkpoint directory name).
    #[serde(default)]
    pub name: String,

    /// Whether the loaded model is the faster turbo variant.
    #[serde(default)]
    pub is_turbo: bool,
}

impl ModelConfig {
    /// Load a model configuration from a JSON file (e.g. a checkpoint's `config.json`).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: ModelConfig = serde_json::from_str(&data)?;
        Ok(config)
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply command-line overrides on top of the file configuration.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(device) = &cli.device {
            self.device.device = device.clone();
        }
        if let Some(root) = &cli.project_root {
            self.paths.project_root = Some(root.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.device.device, "auto");
        assert_eq!(cfg.paths.checkpoint_dir, "checkpoints");
        assert_eq!(cfg.paths.model_prefix, "acestep-v15-");
        assert!(cfg.model.is_none());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"device": {"device": "mps"}}"#).unwrap();
        assert_eq!(cfg.device.device, "mps");
        assert_eq!(cfg.paths.checkpoint_dir, "checkpoints");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"paths": {"project_root": "/srv"}}"#).unwrap();
        assert_eq!(cfg.paths.project_root, Some(PathBuf::from("/srv")));
        assert_eq!(cfg.paths.checkpoint_dir, "checkpoints");
        assert_eq!(cfg.paths.model_prefix, "acestep-v15-");

        let cfg: Config =
            serde_json::from_str(r#"{"device": {}, "paths": {"model_prefix": "x-"}}"#).unwrap();
        assert_eq!(cfg.device.device, "auto");
        assert_eq!(cfg.paths.checkpoint_dir, "checkpoints");
        assert_eq!(cfg.paths.model_prefix, "x-");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accel.json");
        std::fs::write(&path, r#"{"paths": {"checkpoint_dir": "ckpt"}, "model": {}}"#).unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.device.device, "auto");
        assert_eq!(cfg.paths.checkpoint_dir, "ckpt");
        assert_eq!(cfg.paths.model_prefix, "acestep-v15-");
        assert_eq!(cfg.model, Some(ModelConfig::default()));
    }

    #[test]
    fn test_model_config_turbo_defaults_false() {
        let model: ModelConfig = serde_json::from_str(r#"{"name": "acestep-v15-base"}"#).unwrap();
        assert!(!model.is_turbo);

        let model: ModelConfig = serde_json::from_str(r#"{"is_turbo": true}"#).unwrap();
        assert!(model.is_turbo);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(["accel-probe", "--device", "cuda:1", "--project-root", "/srv"]);
        let mut cfg = Config::default();
        cfg.apply_cli(&cli);
        assert_eq!(cfg.device.device, "cuda:1");
        assert_eq!(cfg.paths.resolved_project_root(), PathBuf::from("/srv"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/accel.json")).unwrap();
        assert_eq!(cfg.device.device, "auto");
    }
}
