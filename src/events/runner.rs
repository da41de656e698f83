/*!
 * Batch runner.
 *
 * One worker invocation: reclaim abandoned events, claim a batch, then
 * process the claimed events one after another. Every event's outcome is
 * committed on its own, so a failing event never undoes earlier ones and
 * never stops the loop. Only failures of the run itself (sweeping or
 * claiming) are returned as errors.
 */

use anyhow::Result;
use log::{error, info};
use std::fmt;
use std::sync::Arc;

use super::fetcher::EventFetcher;
use super::processor::EventProcessor;
use super::tracker::{FailOutcome, StatusTracker};
use super::trigger::Trigger;
use crate::app_config::WorkerConfig;
use crate::content::ContentStore;
use crate::database::Repository;
use crate::database::models::TranslationEventRecord;
use crate::database::repository::Lease;
use crate::translator::Translator;

/// Counts for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Stale events returned to the retry pool before claiming
    pub swept: usize,
    /// Events claimed by this run
    pub claimed: usize,
    /// Events that reached COMPLETED
    pub completed: usize,
    /// Events left FAILED but retryable
    pub failed: usize,
    /// Events whose retry budget ran out in this run
    pub exhausted: usize,
    /// Events another worker took over mid-run
    pub lease_lost: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "claimed {}, completed {}, failed {}, exhausted {}, lease lost {}, swept {}",
            self.claimed, self.completed, self.failed, self.exhausted, self.lease_lost, self.swept
        )
    }
}

/// Final state of one event in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventOutcome {
    Completed,
    Failed(FailOutcome),
    LeaseLost,
}

/// Drives one worker invocation
pub struct BatchRunner {
    fetcher: EventFetcher,
    processor: EventProcessor,
    tracker: StatusTracker,
    batch_size: usize,
}

impl BatchRunner {
    /// Wire a runner from its collaborators
    pub fn new(
        repo: Repository,
        store: ContentStore,
        translator: Arc<dyn Translator>,
        config: &WorkerConfig,
    ) -> Self {
        let tracker = StatusTracker::new(repo.clone(), config);
        Self {
            fetcher: EventFetcher::new(repo, config),
            processor: EventProcessor::new(store, translator, tracker.clone(), config.translate_timeout()),
            tracker,
            batch_size: config.batch_size,
        }
    }

    /// Run one invocation
    pub async fn run(&self, trigger: Trigger) -> Result<BatchSummary> {
        let mut summary = BatchSummary {
            swept: self.tracker.sweep_expired().await?,
            ..Default::default()
        };

        let batch = match &trigger {
            Trigger::Scheduled { limit } => {
                self.fetcher
                    .fetch_eligible(limit.unwrap_or(self.batch_size))
                    .await?
            }
            Trigger::Explicit(refs) => self.fetcher.fetch_by_refs(refs).await?,
        };
        summary.claimed = batch.len();

        if batch.is_empty() {
            info!("No eligible events");
            return Ok(summary);
        }
        info!("Claimed {} event(s)", batch.len());

        for event in &batch.events {
            let outcome = match self.run_event(event, &batch.lease).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Event {} errored: {:#}", event.short_id(), e);
                    match self
                        .tracker
                        .fail(event, &batch.lease, &format!("{:#}", e), false)
                        .await
                    {
                        Ok(FailOutcome::LeaseLost) => EventOutcome::LeaseLost,
                        Ok(outcome) => EventOutcome::Failed(outcome),
                        Err(e) => {
                            // The lease sweeper picks the event up later
                            error!("Could not record failure of event {}: {:#}", event.short_id(), e);
                            continue;
                        }
                    }
                }
            };

            match outcome {
                EventOutcome::Completed => summary.completed += 1,
                EventOutcome::Failed(FailOutcome::Retryable { .. }) => summary.failed += 1,
                EventOutcome::Failed(FailOutcome::Exhausted { .. }) => summary.exhausted += 1,
                EventOutcome::Failed(FailOutcome::LeaseLost) | EventOutcome::LeaseLost => {
                    summary.lease_lost += 1
                }
            }
        }

        info!("Batch finished: {}", summary);
        Ok(summary)
    }

    async fn run_event(&self, event: &TranslationEventRecord, lease: &Lease) -> Result<EventOutcome> {
        // Events further down the batch must not expire while they wait
        self.tracker.heartbeat(lease).await?;

        let report = self.processor.process(event, lease).await?;

        if report.success() {
            let mut done = event.clone();
            done.completed_locales = report.completed_locales.clone();
            return Ok(if self.tracker.complete(&done, lease).await? {
                EventOutcome::Completed
            } else {
                EventOutcome::LeaseLost
            });
        }

        let permanent = report.entity_missing.is_some();
        let outcome = self
            .tracker
            .fail(event, lease, &report.error_summary(), permanent)
            .await?;
        Ok(match outcome {
            FailOutcome::LeaseLost => EventOutcome::LeaseLost,
            other => EventOutcome::Failed(other),
        })
    }
}
