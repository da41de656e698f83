/*!
 * Event fetcher.
 *
 * Claims work for one worker run. Every claim happens under a fresh lease:
 * the claimed rows are PROCESSING with that lease's token when the fetch
 * returns, so a concurrent fetcher never receives them.
 */

use anyhow::Result;
use chrono::Utc;
use log::info;
use uuid::Uuid;

use crate::app_config::WorkerConfig;
use crate::database::Repository;
use crate::database::models::{TranslationEventRecord, format_timestamp};
use crate::database::repository::{EventRef, Lease};

/// Events claimed by one fetch and the lease they are held under
#[derive(Debug, Clone)]
pub struct ClaimedBatch {
    pub lease: Lease,
    pub events: Vec<TranslationEventRecord>,
}

impl ClaimedBatch {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Claims eligible events
#[derive(Clone)]
pub struct EventFetcher {
    repo: Repository,
    max_retries: u32,
    lease_duration: chrono::Duration,
}

impl EventFetcher {
    pub fn new(repo: Repository, config: &WorkerConfig) -> Self {
        Self {
            repo,
            max_retries: config.max_retries,
            lease_duration: config.lease_duration(),
        }
    }

    /// Lease expiring one lease duration from now
    pub fn new_lease(&self) -> Lease {
        Lease {
            token: Uuid::new_v4().to_string(),
            expires_at: format_timestamp(Utc::now() + self.lease_duration),
        }
    }

    /// Claim up to `limit` eligible events, oldest first
    pub async fn fetch_eligible(&self, limit: usize) -> Result<ClaimedBatch> {
        let lease = self.new_lease();
        let events = self
            .repo
            .claim_eligible(limit, self.max_retries, &lease)
            .await?;

        Ok(ClaimedBatch { lease, events })
    }

    /// Claim the named events; ineligible ones are skipped
    pub async fn fetch_by_refs(&self, refs: &[EventRef]) -> Result<ClaimedBatch> {
        let lease = self.new_lease();
        let events = self
            .repo
            .claim_by_refs(refs, self.max_retries, &lease)
            .await?;

        if events.len() < refs.len() {
            info!(
                "Skipped {} of {} requested event(s): missing, finished, exhausted or already claimed",
                refs.len() - events.len(),
                refs.len()
            );
        }

        Ok(ClaimedBatch { lease, events })
    }
}
