/*!
 * Event processor.
 *
 * Translates the outstanding locales of one claimed event:
 *
 * 1. Nothing pending: report success without calling the translator or
 *    touching storage.
 * 2. Load the entity. A missing entity is reported, not retried.
 * 3. For each pending locale in target order, call the translator under a
 *    timeout and validate the reply. A failing locale is recorded and the
 *    loop moves on. An entity with only blank source text completes its
 *    locales without a translator call.
 * 4. Save every validated locale in its own savepoint and record the grown
 *    `completed_locales`, all in one transaction.
 */

use anyhow::Result;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::tracker::StatusTracker;
use crate::content::{ContentStore, EntityContent, LocaleTranslation};
use crate::database::Repository;
use crate::database::models::TranslationEventRecord;
use crate::database::repository::Lease;
use crate::errors::{LocaleError, StoreError, TranslationError};
use crate::translator::Translator;

/// Why one locale was not completed this round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleFailure {
    pub locale: String,
    pub error: String,
}

/// Outcome of one processing round
#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    /// Locales the translator was asked for
    pub attempted: Vec<String>,
    /// Locales saved this round
    pub newly_completed: Vec<String>,
    /// `completed_locales` after this round
    pub completed_locales: Vec<String>,
    /// Targets still missing after this round
    pub remaining: Vec<String>,
    /// Per-locale failures, in target order
    pub failures: Vec<LocaleFailure>,
    /// Set when the entity no longer exists
    pub entity_missing: Option<String>,
}

impl ProcessReport {
    /// Every target locale is done
    pub fn success(&self) -> bool {
        self.entity_missing.is_none() && self.remaining.is_empty()
    }

    /// Message stored as `last_error`
    pub fn error_summary(&self) -> String {
        if let Some(missing) = &self.entity_missing {
            return missing.clone();
        }
        let mut parts: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.locale, f.error))
            .collect();
        if parts.is_empty() && !self.remaining.is_empty() {
            parts.push(format!("locales still pending: {}", self.remaining.join(", ")));
        }
        parts.join("; ")
    }
}

/// Processes one event at a time
#[derive(Clone)]
pub struct EventProcessor {
    store: ContentStore,
    translator: Arc<dyn Translator>,
    tracker: StatusTracker,
    translate_timeout: Duration,
}

impl EventProcessor {
    pub fn new(
        store: ContentStore,
        translator: Arc<dyn Translator>,
        tracker: StatusTracker,
        translate_timeout: Duration,
    ) -> Self {
        Self {
            store,
            translator,
            tracker,
            translate_timeout,
        }
    }

    /// Run one processing round for a claimed event.
    ///
    /// Errors are reserved for storage failures and a lost lease; translator
    /// and validation problems end up in the report.
    pub async fn process(&self, event: &TranslationEventRecord, lease: &Lease) -> Result<ProcessReport> {
        let pending = event.pending_locales();
        let mut report = ProcessReport {
            completed_locales: event.merge_completed(&[]),
            remaining: pending.clone(),
            ..Default::default()
        };

        if pending.is_empty() {
            debug!("Event {} has nothing pending", event.short_id());
            return Ok(report);
        }

        let Some(content) = self.store.fetch(event.entity_type, event.entity_id).await? else {
            let missing = StoreError::EntityMissing {
                entity_type: event.entity_type.to_string(),
                id: event.entity_id,
            };
            warn!("Event {}: {}", event.short_id(), missing);
            report.entity_missing = Some(missing.to_string());
            return Ok(report);
        };

        let mut staged: Vec<(String, LocaleTranslation)> = Vec::with_capacity(pending.len());
        for locale in &pending {
            report.attempted.push(locale.clone());

            match self.translate_locale(event, &content, locale).await {
                Ok(translation) => staged.push((locale.clone(), translation)),
                Err(e) => {
                    warn!("Event {} locale '{}' failed: {}", event.short_id(), locale, e);
                    report.failures.push(LocaleFailure {
                        locale: locale.clone(),
                        error: e.to_string(),
                    });
                }
            }

            if !self.tracker.still_holds(event, lease).await? {
                return Err(anyhow::anyhow!(
                    "Lease on event {} lost while translating",
                    event.short_id()
                ));
            }
        }

        if !staged.is_empty() {
            let (saved, save_failures) = self.save(event, lease, content, staged).await?;
            report.failures.extend(save_failures);
            report.newly_completed = saved;
        }

        // Keep failures in target order regardless of which stage produced them
        report
            .failures
            .sort_by_key(|f| event.target_locales.iter().position(|t| *t == f.locale));

        report.completed_locales = event.merge_completed(&report.newly_completed);
        report.remaining = event
            .target_locales
            .iter()
            .filter(|t| !report.completed_locales.contains(t))
            .cloned()
            .collect();

        info!(
            "Event {} round done: {} new, {}/{} complete",
            event.short_id(),
            report.newly_completed.len(),
            report.completed_locales.len(),
            event.target_locales.len()
        );
        Ok(report)
    }

    /// Translate and validate one locale; nothing is written here
    async fn translate_locale(
        &self,
        event: &TranslationEventRecord,
        content: &EntityContent,
        locale: &str,
    ) -> Result<LocaleTranslation, LocaleError> {
        let fields = content.source_fields();
        if fields.is_empty() {
            debug!(
                "Event {} locale '{}': no non-empty source fields, nothing to translate",
                event.short_id(),
                locale
            );
            return Ok(content.validate(&fields)?);
        }

        let call = self
            .translator
            .translate(&fields, &event.source_locale, locale, content.hint());

        let translated = match timeout(self.translate_timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TranslationError::Timeout {
                    locale: locale.to_string(),
                    secs: self.translate_timeout.as_secs(),
                }
                .into());
            }
        };

        Ok(content.validate(&translated)?)
    }

    /// Save staged locales and the grown `completed_locales` in one transaction.
    ///
    /// Each locale gets its own savepoint: a locale whose save fails leaves no
    /// trace and is reported, the others still commit.
    async fn save(
        &self,
        event: &TranslationEventRecord,
        lease: &Lease,
        content: EntityContent,
        staged: Vec<(String, LocaleTranslation)>,
    ) -> Result<(Vec<String>, Vec<LocaleFailure>)> {
        let event = event.clone();
        let token = lease.token.clone();

        self.store
            .connection()
            .immediate_transaction_async(move |tx| {
                let mut saved = Vec::with_capacity(staged.len());
                let mut failures = Vec::new();

                for (locale, translation) in &staged {
                    match ContentStore::save_locale(tx, &content, locale, translation) {
                        Ok(()) => saved.push(locale.clone()),
                        Err(e) => {
                            warn!(
                                "Event {} locale '{}' rolled back: {}",
                                event.short_id(),
                                locale,
                                e
                            );
                            failures.push(LocaleFailure {
                                locale: locale.clone(),
                                error: LocaleError::from(e).to_string(),
                            });
                        }
                    }
                }

                if !saved.is_empty() {
                    let completed = event.merge_completed(&saved);
                    Repository::update_completed_locales_sync(tx, event.id, &token, &completed)?;
                }

                Ok((saved, failures))
            })
            .await
    }
}
