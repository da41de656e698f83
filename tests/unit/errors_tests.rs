/*!
 * Tests for error types and conversions
 */

use cookloc::errors::{LocaleError, ProviderError, StoreError, TranslationError};

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 503,
        message: "overloaded".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("503"));
    assert!(display.contains("overloaded"));
}

#[test]
fn test_providerError_isTransient_shouldRetryOnlyRecoverableFailures() {
    assert!(ProviderError::ConnectionError("reset".to_string()).is_transient());
    assert!(ProviderError::RateLimitExceeded("slow down".to_string()).is_transient());
    assert!(
        ProviderError::ApiError {
            status_code: 502,
            message: String::new()
        }
        .is_transient()
    );
    assert!(
        !ProviderError::ApiError {
            status_code: 400,
            message: String::new()
        }
        .is_transient()
    );
    assert!(!ProviderError::AuthenticationError("bad key".to_string()).is_transient());
    assert!(!ProviderError::ParseError("no json".to_string()).is_transient());
}

#[test]
fn test_translationError_fromProviderError_shouldWrap() {
    let error: TranslationError = ProviderError::RequestFailed("boom".to_string()).into();
    assert!(matches!(error, TranslationError::Provider(_)));
    assert!(error.to_string().contains("boom"));
}

#[test]
fn test_translationError_countMismatch_shouldNameKind() {
    let error = TranslationError::CountMismatch {
        kind: "step",
        expected: 3,
        actual: 2,
    };
    assert_eq!(error.to_string(), "step count mismatch: expected 3, got 2");
}

#[test]
fn test_translationError_timeout_shouldNameLocale() {
    let error = TranslationError::Timeout {
        locale: "ja".to_string(),
        secs: 120,
    };
    assert_eq!(error.to_string(), "Translation to 'ja' timed out after 120s");
}

#[test]
fn test_storeError_entityMissing_shouldDisplayTypeAndId() {
    let error = StoreError::EntityMissing {
        entity_type: "recipe".to_string(),
        id: 4,
    };
    assert_eq!(error.to_string(), "recipe 4 not found");
}

#[test]
fn test_localeError_shouldBeTransparent() {
    let inner = StoreError::RowVanished {
        table: "recipe_steps",
        id: 9,
    };
    let expected = inner.to_string();
    let error: LocaleError = inner.into();
    assert_eq!(error.to_string(), expected);

    let error: LocaleError = TranslationError::MissingField {
        field: "title".to_string(),
    }
    .into();
    assert_eq!(error.to_string(), "Translated payload is missing field 'title'");
}
