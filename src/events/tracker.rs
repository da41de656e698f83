/*!
 * Status tracker.
 *
 * Owns every status transition after the claim:
 *
 * - PROCESSING -> COMPLETED once every target locale is done
 * - PROCESSING -> FAILED with `retry_count + 1` and a truncated `last_error`
 * - stale PROCESSING -> FAILED when a worker's lease lapsed
 *
 * Each write is guarded by the lease token. A write that matches no row
 * means another worker reclaimed the event; it is logged and skipped.
 */

use anyhow::{Result, anyhow};
use chrono::Utc;
use log::{error, info, warn};

use crate::app_config::WorkerConfig;
use crate::database::Repository;
use crate::database::models::{TranslationEventRecord, format_timestamp, now_timestamp};
use crate::database::repository::Lease;

/// Message stored on events reclaimed by the sweeper
pub const LEASE_EXPIRED_ERROR: &str = "lease expired";

/// Result of a FAILED transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Will be picked up again
    Retryable { retry_count: u32 },
    /// Retry budget used up; the event is inert
    Exhausted { retry_count: u32 },
    /// Another worker holds the event now
    LeaseLost,
}

/// Truncate `message` to at most `max_chars` characters
pub fn truncate_error(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((end, _)) => message[..end].to_string(),
        None => message.to_string(),
    }
}

/// Applies status transitions
#[derive(Clone)]
pub struct StatusTracker {
    repo: Repository,
    max_retries: u32,
    lease_duration: chrono::Duration,
    last_error_max_len: usize,
}

impl StatusTracker {
    pub fn new(repo: Repository, config: &WorkerConfig) -> Self {
        Self {
            repo,
            max_retries: config.max_retries,
            lease_duration: config.lease_duration(),
            last_error_max_len: config.last_error_max_len,
        }
    }

    /// PROCESSING -> COMPLETED.
    ///
    /// Refuses events that still have untranslated targets. Returns false
    /// when the lease was lost.
    pub async fn complete(&self, event: &TranslationEventRecord, lease: &Lease) -> Result<bool> {
        if !event.is_fully_translated() {
            return Err(anyhow!(
                "Event {} cannot complete with pending locales {:?}",
                event.short_id(),
                event.pending_locales()
            ));
        }

        let held = self.repo.mark_completed(event.id, &lease.token).await?;
        if held {
            info!(
                "Event {} completed ({} locale(s))",
                event.short_id(),
                event.target_locales.len()
            );
        } else {
            warn!("Event {} lost its lease before completion", event.short_id());
        }
        Ok(held)
    }

    /// PROCESSING -> FAILED.
    ///
    /// A `permanent` failure jumps straight to the retry cap.
    pub async fn fail(
        &self,
        event: &TranslationEventRecord,
        lease: &Lease,
        message: &str,
        permanent: bool,
    ) -> Result<FailOutcome> {
        let message = truncate_error(message, self.last_error_max_len);
        let retry_count = self
            .repo
            .mark_failed(event.id, &lease.token, &message, self.max_retries, permanent)
            .await?;

        let outcome = match retry_count {
            None => {
                warn!("Event {} lost its lease before failure was recorded", event.short_id());
                FailOutcome::LeaseLost
            }
            Some(retry_count) if retry_count >= self.max_retries => {
                error!(
                    "Event {} ({} {}) exhausted after {} attempt(s): {}",
                    event.public_id, event.entity_type, event.entity_id, retry_count, message
                );
                FailOutcome::Exhausted { retry_count }
            }
            Some(retry_count) => {
                warn!(
                    "Event {} failed (attempt {}/{}): {}",
                    event.short_id(),
                    retry_count,
                    self.max_retries,
                    message
                );
                FailOutcome::Retryable { retry_count }
            }
        };
        Ok(outcome)
    }

    /// Lease renewed from now, same token
    pub fn renew(&self, lease: &Lease) -> Lease {
        Lease {
            token: lease.token.clone(),
            expires_at: format_timestamp(Utc::now() + self.lease_duration),
        }
    }

    /// Renew every event still held under `lease`; returns how many
    pub async fn heartbeat(&self, lease: &Lease) -> Result<usize> {
        self.repo.extend_batch_lease(&self.renew(lease)).await
    }

    /// Renew one event's lease; false when another worker holds it now
    pub async fn still_holds(&self, event: &TranslationEventRecord, lease: &Lease) -> Result<bool> {
        self.repo.extend_lease(event.id, &self.renew(lease)).await
    }

    /// Fail PROCESSING events whose lease lapsed
    pub async fn sweep_expired(&self) -> Result<usize> {
        let swept = self
            .repo
            .sweep_expired_leases(&now_timestamp(), LEASE_EXPIRED_ERROR)
            .await?;
        if swept > 0 {
            warn!("Reclaimed {} event(s) with an expired lease", swept);
        }
        Ok(swept)
    }
}
