use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = StorybookConfig::default();
    assert_eq!(config.stories.len(), DEFAULT_STORY_SOURCES.len());
    assert_eq!(config.stories[0].title_prefix, "");
    assert_eq!(config.stories[0].directory, "./components");
    assert_eq!(config.stories[1].title_prefix, "OtherComponents");
    assert_eq!(config.stories[1].directory, "./other_components");
    assert!(config
        .stories
        .iter()
        .all(|s| s.files == DEFAULT_STORY_FILES));
    assert!(!config.options.play_fn);
    assert_eq!(config.watch.debounce_ms, DEFAULT_WATCH_DEBOUNCE_MS);
}

#[test]
fn test_preview_path_default() {
    let config = StorybookConfig::default();
    assert_eq!(config.get_preview_path(), DEFAULT_PREVIEW_PATH);

    let config = StorybookConfig {
        preview: Some("./preview.json".to_string()),
        ..Default::default()
    };
    assert_eq!(config.get_preview_path(), "./preview.json");
}

#[test]
fn test_partial_json_fills_defaults() {
    let json = r#"{"stories":[{"directory":"./src"}]}"#;
    let config: StorybookConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.stories.len(), 1);
    assert_eq!(config.stories[0].title_prefix, "");
    assert_eq!(config.stories[0].files, DEFAULT_STORY_FILES);
    assert!(!config.options.play_fn);
}

#[test]
fn test_camel_case_keys() {
    let json = r#"{
        "stories": [{"titlePrefix": "Kit", "directory": "./kit", "files": "*.stories.tsx"}],
        "options": {"playFn": true},
        "watch": {"debounceMs": 50}
    }"#;
    let config: StorybookConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.stories[0].title_prefix, "Kit");
    assert_eq!(config.stories[0].files, "*.stories.tsx");
    assert!(config.options.play_fn);
    assert_eq!(config.watch.debounce_ms, 50);
}

#[test]
fn test_load_config_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_config(&temp_dir.path().join("main.json"));
    assert_eq!(config.stories.len(), 2);
}

#[test]
fn test_load_config_invalid_json_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("main.json");
    fs::write(&path, "{ not json").unwrap();

    let config = load_config(&path);
    assert_eq!(config.stories.len(), 2);
    assert!(try_load_config(&path).is_err());
}

#[test]
fn test_try_load_config_reports_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("main.json");
    fs::write(&path, r#"{"stories":[{"titlePrefix":"X"}]}"#).unwrap();

    let err = try_load_config(&path).unwrap_err();
    assert!(err.to_string().contains("directory"));
}

#[test]
fn test_config_path_default_and_explicit() {
    assert_eq!(config_path(None), std::path::PathBuf::from(DEFAULT_CONFIG_PATH));
    assert_eq!(
        config_path(Some("/tmp/sb.json")),
        std::path::PathBuf::from("/tmp/sb.json")
    );
}
