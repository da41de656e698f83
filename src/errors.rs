/*!
 * Error types for the cookloc worker.
 *
 * This module contains custom error types for the different layers of the
 * translation-event pipeline, using the thiserror crate for ergonomic
 * error definitions.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether a retry of the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RequestFailed(_)
            | ProviderError::ConnectionError(_)
            | ProviderError::RateLimitExceeded(_) => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            ProviderError::ParseError(_) | ProviderError::AuthenticationError(_) => false,
        }
    }
}

/// Errors that can occur while translating one locale of an event
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The translator did not answer within the configured window
    #[error("Translation to '{locale}' timed out after {secs}s")]
    Timeout {
        /// Target locale of the call
        locale: String,
        /// Timeout that was exceeded
        secs: u64,
    },

    /// A field sent for translation is absent from the response
    #[error("Translated payload is missing field '{field}'")]
    MissingField {
        /// Field key
        field: String,
    },

    /// A field came back blank
    #[error("Translated field '{field}' is empty")]
    EmptyField {
        /// Field key
        field: String,
    },

    /// Child rows in the payload do not line up with the source rows
    #[error("{kind} count mismatch: expected {expected}, got {actual}")]
    CountMismatch {
        /// "step" or "ingredient"
        kind: &'static str,
        /// Number of source rows
        expected: usize,
        /// Number of translated rows
        actual: usize,
    },

    /// Locale code is not usable as a translation key
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
}

/// Errors raised while reading or writing translatable content
#[derive(Error, Debug)]
pub enum StoreError {
    /// The entity referenced by an event no longer exists
    #[error("{entity_type} {id} not found")]
    EntityMissing {
        /// Entity type tag
        entity_type: String,
        /// Entity id
        id: i64,
    },

    /// An update matched zero rows inside a save
    #[error("Row {id} in {table} vanished during save")]
    RowVanished {
        /// Table name
        table: &'static str,
        /// Row id
        id: i64,
    },

    /// A recipe's translatable child rows differ from the loaded snapshot
    #[error("Recipe {kind} rows changed during translation: expected {expected}, found {actual}")]
    ChildrenChanged {
        /// `step` or `ingredient`
        kind: &'static str,
        /// Rows sent to the translator
        expected: usize,
        /// Non-blank rows in storage now
        actual: usize,
    },

    /// Refused to write an empty value into a translation map
    #[error("Refusing to store empty translation for {table} {id}")]
    EmptyValue {
        /// Table name
        table: &'static str,
        /// Row id
        id: i64,
    },

    /// A translation of one entity kind was applied to another
    #[error("Translation kind does not match {0} content")]
    KindMismatch(String),

    /// Underlying SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Translation map column could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a single (event, locale) pair
#[derive(Error, Debug)]
pub enum LocaleError {
    /// Translating or validating the payload failed
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// Persisting the payload failed and was rolled back
    #[error(transparent)]
    Store(#[from] StoreError),
}
