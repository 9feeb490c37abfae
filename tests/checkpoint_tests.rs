//! Integration tests for checkpoint discovery and configuration-driven handlers.

use accel_probe::checkpoint::CheckpointLocator;
use accel_probe::config::{Config, ModelConfig};
use accel_probe::AcceleratorHandler;

#[test]
fn test_rescan_reflects_disk_changes() {
    let root = tempfile::tempdir().unwrap();
    let locator = CheckpointLocator::new(root.path(), "checkpoints", "acestep-v15-");
    assert!(locator.list_checkpoint_roots().is_empty());

    let dir = root.path().join("checkpoints");
    std::fs::create_dir_all(dir.join("acestep-v15-sft")).unwrap();
    assert_eq!(locator.list_checkpoint_roots().len(), 1);
    assert_eq!(locator.list_named_models(), vec!["acestep-v15-sft".to_string()]);

    std::fs::create_dir_all(dir.join("acestep-v15-base")).unwrap();
    assert_eq!(
        locator.list_named_models(),
        vec!["acestep-v15-base".to_string(), "acestep-v15-sft".to_string()]
    );

    std::fs::remove_dir(dir.join("acestep-v15-sft")).unwrap();
    assert_eq!(locator.list_named_models(), vec!["acestep-v15-base".to_string()]);
}

#[test]
fn test_handler_from_config() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("ckpt");
    std::fs::create_dir_all(dir.join("family-b")).unwrap();
    std::fs::create_dir_all(dir.join("family-a")).unwrap();
    std::fs::create_dir_all(dir.join("other")).unwrap();

    let mut config = Config::default();
    config.device.device = "cpu".to_string();
    config.paths.project_root = Some(root.path().to_path_buf());
    config.paths.checkpoint_dir = "ckpt".to_string();
    config.paths.model_prefix = "family-".to_string();
    config.model = Some(ModelConfig {
        name: "family-a".to_string(),
        is_turbo: true,
    });

    let handler = AcceleratorHandler::from_config(&config);
    assert!(handler.is_turbo_model());
    assert_eq!(handler.list_checkpoint_roots(), vec![dir]);
    assert_eq!(
        handler.list_named_models(),
        vec!["family-a".to_string(), "family-b".to_string()]
    );

    let report = handler.report();
    assert!(!report.flash_attention);
    assert_eq!(report.allocated_bytes, 0);
    assert_eq!(report.models.len(), 2);
}

#[test]
fn test_model_config_from_checkpoint_file() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("config.json");

    std::fs::write(&path, r#"{"name": "acestep-v15-base", "hidden_size": 2048}"#).unwrap();
    let model = ModelConfig::load(&path).unwrap();
    assert_eq!(model.name, "acestep-v15-base");
    assert!(!model.is_turbo);

    std::fs::write(&path, r#"{"name": "acestep-v15-turbo", "is_turbo": true}"#).unwrap();
    assert!(ModelConfig::load(&path).unwrap().is_turbo);
}
