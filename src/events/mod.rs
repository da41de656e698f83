/*!
 * Translation event pipeline.
 *
 * - `trigger`: what a run should process
 * - `fetcher`: claims eligible events under a lease
 * - `processor`: translates and saves the pending locales of one event
 * - `tracker`: status transitions, retry accounting and lease upkeep
 * - `runner`: one worker invocation tying the above together
 */

use anyhow::{Result, anyhow};
use log::info;

use crate::database::Repository;
use crate::database::models::{NewTranslationEvent, TranslationEventRecord};
use crate::errors::TranslationError;
use crate::language_utils::{normalize_locale, normalize_target_locales};

pub mod fetcher;
pub mod processor;
pub mod runner;
pub mod tracker;
pub mod trigger;

pub use fetcher::{ClaimedBatch, EventFetcher};
pub use processor::{EventProcessor, LocaleFailure, ProcessReport};
pub use runner::{BatchRunner, BatchSummary};
pub use tracker::{FailOutcome, StatusTracker};
pub use trigger::Trigger;

/// Queue a new translation event.
///
/// Locales are normalized, duplicate targets collapse, and the source
/// locale is dropped from the targets. An event with nothing left to
/// translate is rejected.
pub async fn enqueue(repo: &Repository, event: NewTranslationEvent) -> Result<TranslationEventRecord> {
    let source_locale = normalize_locale(&event.source_locale)
        .map_err(|e| TranslationError::InvalidLocale(format!("{}: {}", event.source_locale, e)))?;
    let target_locales = normalize_target_locales(&event.target_locales, &source_locale)
        .map_err(|e| TranslationError::InvalidLocale(e.to_string()))?;

    if target_locales.is_empty() {
        return Err(anyhow!(
            "{} {} has no target locale other than its source '{}'",
            event.entity_type,
            event.entity_id,
            source_locale
        ));
    }

    let created = repo
        .create_event(&NewTranslationEvent {
            source_locale,
            target_locales,
            ..event
        })
        .await?;

    info!(
        "Queued event {} for {} {} -> {:?}",
        created.public_id, created.entity_type, created.entity_id, created.target_locales
    );
    Ok(created)
}
