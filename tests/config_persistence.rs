//! Configuration file round-trips.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use haruko::config::{ProviderConfig, ProviderKind};
use haruko::{Assistant, AssistantConfig, Collaborators};

#[test]
fn save_then_load_preserves_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = AssistantConfig::default();
    config.filter.buffer_threshold = 64;
    config.directives.action_marker = "DO:".into();
    config.turn.stop_phrases = vec!["enough".into()];
    config.providers = vec![
        ProviderConfig {
            name: "cloud".into(),
            priority: 1,
            api_key_env: Some("CLOUD_API_KEY".into()),
            supports_vision: true,
            max_tokens: Some(512),
            ..ProviderConfig::default()
        },
        ProviderConfig {
            name: "offline".into(),
            priority: 9,
            kind: ProviderKind::Static,
            fragments: vec!["Hello".into(), " again.".into()],
            ..ProviderConfig::default()
        },
    ];
    config.save_to_file(&path).unwrap();

    let loaded = AssistantConfig::from_file(&path).unwrap();
    assert_eq!(loaded.filter.buffer_threshold, 64);
    assert_eq!(loaded.directives.action_marker, "DO:");
    assert_eq!(loaded.turn.stop_phrases, vec!["enough".to_owned()]);
    assert_eq!(loaded.providers.len(), 2);
    assert_eq!(loaded.providers[0].api_key_env.as_deref(), Some("CLOUD_API_KEY"));
    assert_eq!(loaded.providers[0].max_tokens, Some(512));
    assert!(loaded.providers[0].temperature.is_none());
    assert_eq!(loaded.providers[1].kind, ProviderKind::Static);
    assert_eq!(loaded.providers[1].fragments, vec!["Hello", " again."]);
    assert!(loaded.validate().is_ok());
}

#[test]
fn sparse_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[turn]\nsearch_max_results = 5\n").unwrap();

    let loaded = AssistantConfig::from_file(&path).unwrap();
    let defaults = AssistantConfig::default();
    assert_eq!(loaded.turn.search_max_results, 5);
    assert_eq!(loaded.turn.cancel_marker, defaults.turn.cancel_marker);
    assert_eq!(loaded.tools.shell_timeout_secs, defaults.tools.shell_timeout_secs);
    assert_eq!(loaded.providers.len(), defaults.providers.len());
}

#[test]
fn malformed_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[filter\nbuffer_threshold = ").unwrap();

    let err = AssistantConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().starts_with("config error:"));
}

#[test]
fn invalid_config_is_rejected_before_building() {
    let mut config = AssistantConfig::default();
    config.filter.buffer_threshold = 0;
    let err = Assistant::from_config(&config, Collaborators::default()).unwrap_err();
    assert!(err.to_string().contains("buffer_threshold"));
}

#[test]
fn static_providers_build_an_offline_assistant() {
    let mut config = AssistantConfig::default();
    config.providers = vec![ProviderConfig {
        name: "offline".into(),
        kind: ProviderKind::Static,
        fragments: vec!["Hi.".into()],
        ..ProviderConfig::default()
    }];
    let assistant = Assistant::from_config(&config, Collaborators::default()).unwrap();
    assert!(assistant.registry().contains("timer"));
}
