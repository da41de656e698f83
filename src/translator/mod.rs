/*!
 * Translator capability.
 *
 * A translator maps a bundle of named text fields from one locale to
 * another. The processor only depends on the [`Translator`] trait; the
 * production implementation talks to an LLM provider, tests use
 * [`mock::MockTranslator`].
 */

use async_trait::async_trait;

use crate::content::{ContentHint, FieldBundle};
use crate::errors::TranslationError;

pub mod llm;
pub mod mock;

pub use llm::LlmTranslator;
pub use mock::MockTranslator;

/// Translate a field bundle between locales
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate every field in `fields` from `source_locale` to
    /// `target_locale`.
    ///
    /// The result must hold one non-empty value per input key. Missing or
    /// blank keys are caught by validation, never back-filled.
    async fn translate(
        &self,
        fields: &FieldBundle,
        source_locale: &str,
        target_locale: &str,
        hint: ContentHint,
    ) -> Result<FieldBundle, TranslationError>;

    /// Name used in log lines
    fn name(&self) -> String;
}
