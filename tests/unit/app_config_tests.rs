/*!
 * Tests for application configuration functionality
 */

use cookloc::app_config::{Config, LogLevel, MAX_LEASE_SECS, TranslationProvider};
use tempfile::TempDir;

/// Test default configuration values
#[test]
fn test_defaultConfig_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.worker.batch_size, 10);
    assert_eq!(config.worker.max_retries, 3);
    assert_eq!(config.worker.lease_secs, 900);
    assert_eq!(config.worker.translate_timeout_secs, 120);
    assert_eq!(config.worker.last_error_max_len, 1000);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.database.explicit_path().is_none());
    assert_eq!(config.translation.available_providers.len(), 3);
}

#[test]
fn test_validate_withHostedProviderAndNoKey_shouldFail() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::OpenAI;

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("API key"));

    config.set_api_key("sk-test");
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_withOllama_shouldNotNeedKey() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Ollama;

    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_withBadWorkerSettings_shouldFail() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Ollama;

    config.worker.batch_size = 0;
    assert!(config.validate().is_err());
    config.worker.batch_size = 10;

    config.worker.max_retries = 0;
    assert!(config.validate().is_err());
    config.worker.max_retries = 3;

    // A lease shorter than one translator call would be swept mid-call
    config.worker.lease_secs = 60;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withHugeLease_shouldFail() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Ollama;

    config.worker.lease_secs = u64::MAX;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("must not exceed"));

    config.worker.lease_secs = MAX_LEASE_SECS;
    assert!(config.validate().is_ok());
}

#[test]
fn test_leaseDuration_withHugeLease_shouldStayPositiveAndCapped() {
    let mut config = Config::default();
    config.worker.lease_secs = u64::MAX;

    let duration = config.worker.lease_duration();

    assert!(duration > chrono::Duration::zero());
    assert_eq!(duration.num_seconds(), MAX_LEASE_SECS as i64);
}

#[test]
fn test_setApiKey_shouldTargetActiveProvider() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Anthropic;
    config.set_api_key("sk-ant");

    assert_eq!(config.translation.get_api_key(), "sk-ant");
    let openai = config
        .translation
        .get_provider_config(&TranslationProvider::OpenAI)
        .unwrap();
    assert!(openai.api_key.is_empty());
}

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefault() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cookloc.json");

    let config = Config::load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.worker.batch_size, 10);

    // Second load reads the file back
    let again = Config::load_or_create(&path).unwrap();
    assert_eq!(again.worker.max_retries, config.worker.max_retries);
}

#[test]
fn test_loadOrCreate_withPartialFile_shouldFillDefaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cookloc.json");
    std::fs::write(&path, r#"{"worker": {"batch_size": 25}, "translation": {"provider": "ollama"}}"#)
        .unwrap();

    let config = Config::load_or_create(&path).unwrap();

    assert_eq!(config.worker.batch_size, 25);
    assert_eq!(config.worker.max_retries, 3);
    assert_eq!(config.translation.provider, TranslationProvider::Ollama);
    assert_eq!(config.translation.get_model(), "llama3.2:3b");
}

#[test]
fn test_providerFromStr_shouldParseCaseInsensitively() {
    assert_eq!("Anthropic".parse::<TranslationProvider>().unwrap(), TranslationProvider::Anthropic);
    assert!("lmstudio".parse::<TranslationProvider>().is_err());
}
