/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format a timestamp the way every table stores it.
///
/// Fixed precision and a `Z` suffix keep the text lexically ordered, so
/// `ORDER BY created_at` and lease comparisons work on the raw column.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in storage format
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Event status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Waiting for its first run
    Pending,
    /// Claimed by a worker holding a lease
    Processing,
    /// Every target locale translated
    Completed,
    /// Last run left work undone; retryable while under the cap
    Failed,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Pending => write!(f, "pending"),
            EventStatus::Processing => write!(f, "processing"),
            EventStatus::Completed => write!(f, "completed"),
            EventStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(EventStatus::Pending),
            "processing" => Ok(EventStatus::Processing),
            "completed" => Ok(EventStatus::Completed),
            "failed" => Ok(EventStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid event status: {}", s)),
        }
    }
}

/// Kind of record holding the translatable content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Full recipe bundle: recipe row, linked food, steps and ingredients
    Recipe,
    /// A single recipe step
    RecipeStep,
    /// A single recipe ingredient
    RecipeIngredient,
    /// A cooking log post
    LogPost,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Recipe => write!(f, "recipe"),
            EntityType::RecipeStep => write!(f, "recipe_step"),
            EntityType::RecipeIngredient => write!(f, "recipe_ingredient"),
            EntityType::LogPost => write!(f, "log_post"),
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recipe" => Ok(EntityType::Recipe),
            "recipe_step" => Ok(EntityType::RecipeStep),
            "recipe_ingredient" => Ok(EntityType::RecipeIngredient),
            "log_post" => Ok(EntityType::LogPost),
            _ => Err(anyhow::anyhow!("Invalid entity type: {}", s)),
        }
    }
}

/// Translation event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationEventRecord {
    /// Internal id
    pub id: i64,
    /// External reference (UUID)
    pub public_id: String,
    /// Which table holds the content
    pub entity_type: EntityType,
    /// Row id in that table
    pub entity_id: i64,
    /// Locale the content is written in
    pub source_locale: String,
    /// Locales that must eventually exist, in processing order
    pub target_locales: Vec<String>,
    /// Locales already translated and persisted
    pub completed_locales: Vec<String>,
    /// Current status
    pub status: EventStatus,
    /// Number of FAILED transitions
    pub retry_count: u32,
    /// Most recent failure message, truncated
    pub last_error: Option<String>,
    /// Token of the worker currently holding the event
    pub lease_token: Option<String>,
    /// When the current lease lapses
    pub lease_expires_at: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// First PROCESSING transition
    pub started_at: Option<String>,
    /// Terminal COMPLETED transition
    pub completed_at: Option<String>,
}

impl TranslationEventRecord {
    /// Target locales that still need a translation, in target order
    pub fn pending_locales(&self) -> Vec<String> {
        self.target_locales
            .iter()
            .filter(|locale| !self.completed_locales.contains(locale))
            .cloned()
            .collect()
    }

    /// Whether every target locale is done
    pub fn is_fully_translated(&self) -> bool {
        self.target_locales
            .iter()
            .all(|locale| self.completed_locales.contains(locale))
    }

    /// FAILED and still under the retry cap
    pub fn is_retryable(&self, max_retries: u32) -> bool {
        self.status == EventStatus::Failed && self.retry_count < max_retries
    }

    /// FAILED with the retry budget used up
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.status == EventStatus::Failed && self.retry_count >= max_retries
    }

    /// Union of the already completed locales and `newly_completed`.
    ///
    /// The result follows target order and only contains target locales, so
    /// it is always a superset of `completed_locales` and a subset of
    /// `target_locales`.
    pub fn merge_completed(&self, newly_completed: &[String]) -> Vec<String> {
        self.target_locales
            .iter()
            .filter(|locale| {
                self.completed_locales.contains(locale) || newly_completed.contains(locale)
            })
            .cloned()
            .collect()
    }

    /// Short id used in log lines
    pub fn short_id(&self) -> &str {
        let end = self.public_id.len().min(8);
        &self.public_id[..end]
    }
}

/// Parameters for creating a new event
#[derive(Debug, Clone)]
pub struct NewTranslationEvent {
    /// Which table holds the content
    pub entity_type: EntityType,
    /// Row id in that table
    pub entity_id: i64,
    /// Locale the content is written in
    pub source_locale: String,
    /// Locales to translate into
    pub target_locales: Vec<String>,
}

/// Counts of events per status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Waiting for a first run
    pub pending: i64,
    /// Currently leased
    pub processing: i64,
    /// Done
    pub completed: i64,
    /// FAILED and still retryable
    pub retryable: i64,
    /// FAILED with the retry budget used up
    pub exhausted: i64,
}

impl QueueStats {
    /// Total number of events
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.retryable + self.exhausted
    }
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pending: {}, Processing: {}, Completed: {}, Retryable: {}, Exhausted: {}",
            self.pending, self.processing, self.completed, self.retryable, self.exhausted
        )
    }
}
