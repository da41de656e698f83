/*!
 * Repository layer for translation event operations.
 *
 * This module provides a high-level API over the `translation_events`
 * table, abstracting away the SQL details and providing type-safe access.
 *
 * Claiming work is a single `BEGIN IMMEDIATE` transaction that selects the
 * eligible rows and flips them to `processing` under a fresh lease. SQLite
 * serializes writers, so a concurrent claimer only ever sees rows that are
 * still unclaimed and never receives an event another worker holds.
 */

use anyhow::{Context, Result, anyhow};
use log::debug;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use uuid::Uuid;

use super::connection::DatabaseConnection;
use super::models::{
    EventStatus, NewTranslationEvent, QueueStats, TranslationEventRecord, now_timestamp,
};

/// Columns selected for every event read, in `parse_event_row` order
const EVENT_COLUMNS: &str = r#"
    id, public_id, entity_type, entity_id, source_locale, target_locales,
    completed_locales, status, retry_count, last_error, lease_token,
    lease_expires_at, created_at, started_at, completed_at
"#;

/// Eligibility predicate shared by every claim query; `?1` is the retry cap
const ELIGIBLE_PREDICATE: &str =
    "(status = 'pending' OR (status = 'failed' AND retry_count < ?1))";

/// Reference to an event as named by a trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRef {
    /// Internal id
    Id(i64),
    /// External UUID
    PublicId(String),
}

impl std::fmt::Display for EventRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventRef::Id(id) => write!(f, "#{}", id),
            EventRef::PublicId(public_id) => write!(f, "{}", public_id),
        }
    }
}

impl std::str::FromStr for EventRef {
    type Err = anyhow::Error;

    /// Integers are internal ids, anything else is a public id
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow!("Empty event reference"));
        }
        Ok(match s.parse::<i64>() {
            Ok(id) => EventRef::Id(id),
            Err(_) => EventRef::PublicId(s.to_string()),
        })
    }
}

/// Lease handed to a worker by a claim
#[derive(Debug, Clone)]
pub struct Lease {
    /// Token that must accompany every write made under the lease
    pub token: String,
    /// Expiry in storage format
    pub expires_at: String,
}

/// Map a decode failure onto rusqlite's conversion error
fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

/// Decode a JSON array column
fn json_list(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

/// Parse an event row selected with `EVENT_COLUMNS`
fn parse_event_row(row: &Row) -> rusqlite::Result<TranslationEventRecord> {
    Ok(TranslationEventRecord {
        id: row.get(0)?,
        public_id: row.get(1)?,
        entity_type: row
            .get::<_, String>(2)?
            .parse()
            .map_err(|e: anyhow::Error| conversion_error(2, e.to_string()))?,
        entity_id: row.get(3)?,
        source_locale: row.get(4)?,
        target_locales: json_list(row, 5)?,
        completed_locales: json_list(row, 6)?,
        status: row
            .get::<_, String>(7)?
            .parse()
            .map_err(|e: anyhow::Error| conversion_error(7, e.to_string()))?,
        retry_count: row.get(8)?,
        last_error: row.get(9)?,
        lease_token: row.get(10)?,
        lease_expires_at: row.get(11)?,
        created_at: row.get(12)?,
        started_at: row.get(13)?,
        completed_at: row.get(14)?,
    })
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Event Creation & Lookup
    // =========================================================================

    /// Insert a new PENDING event and return the stored record
    pub async fn create_event(&self, event: &NewTranslationEvent) -> Result<TranslationEventRecord> {
        let event = event.clone();
        let public_id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        let target_locales = serde_json::to_string(&event.target_locales)?;

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_events (
                        public_id, entity_type, entity_id, source_locale, target_locales,
                        completed_locales, status, retry_count, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, '[]', 'pending', 0, ?6, ?6)
                    "#,
                    params![
                        public_id,
                        event.entity_type.to_string(),
                        event.entity_id,
                        event.source_locale,
                        target_locales,
                        now,
                    ],
                )?;
                let id = conn.last_insert_rowid();
                Self::get_event_sync(conn, id)?
                    .ok_or_else(|| anyhow!("Event {} vanished right after insert", id))
            })
            .await
    }

    /// Get an event by internal id
    pub async fn get_event(&self, id: i64) -> Result<Option<TranslationEventRecord>> {
        self.db
            .execute_async(move |conn| Self::get_event_sync(conn, id))
            .await
    }

    /// Get an event by public id
    pub async fn get_event_by_public_id(
        &self,
        public_id: &str,
    ) -> Result<Option<TranslationEventRecord>> {
        let public_id = public_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM translation_events WHERE public_id = ?1",
                    EVENT_COLUMNS
                );
                Ok(conn.query_row(&sql, [&public_id], parse_event_row).optional()?)
            })
            .await
    }

    /// Get an event by id (synchronous version for use within transactions)
    fn get_event_sync(conn: &Connection, id: i64) -> Result<Option<TranslationEventRecord>> {
        let sql = format!("SELECT {} FROM translation_events WHERE id = ?1", EVENT_COLUMNS);
        Ok(conn.query_row(&sql, [id], parse_event_row).optional()?)
    }

    // =========================================================================
    // Claiming
    // =========================================================================

    /// Claim up to `limit` eligible events, oldest first.
    ///
    /// Eligible means PENDING, or FAILED with `retry_count < max_retries`.
    /// Claimed rows are PROCESSING under `lease` when this returns.
    pub async fn claim_eligible(
        &self,
        limit: usize,
        max_retries: u32,
        lease: &Lease,
    ) -> Result<Vec<TranslationEventRecord>> {
        let lease = lease.clone();

        self.db
            .immediate_transaction_async(move |tx| {
                let sql = format!(
                    "SELECT {} FROM translation_events WHERE {} ORDER BY created_at ASC, id ASC LIMIT ?2",
                    EVENT_COLUMNS, ELIGIBLE_PREDICATE
                );
                let candidates: Vec<TranslationEventRecord> = {
                    let mut stmt = tx.prepare(&sql)?;
                    let rows = stmt.query_map(params![max_retries, limit as i64], parse_event_row)?;
                    rows.collect::<rusqlite::Result<_>>()?
                };

                Self::claim_rows(tx, candidates, max_retries, &lease)
            })
            .await
    }

    /// Claim specific events, re-checking eligibility.
    ///
    /// References that do not exist or are not eligible (completed, exhausted
    /// or leased by another worker) are left out of the result.
    pub async fn claim_by_refs(
        &self,
        refs: &[EventRef],
        max_retries: u32,
        lease: &Lease,
    ) -> Result<Vec<TranslationEventRecord>> {
        let ids: Vec<i64> = refs
            .iter()
            .filter_map(|r| match r {
                EventRef::Id(id) => Some(*id),
                EventRef::PublicId(_) => None,
            })
            .collect();
        let public_ids: Vec<String> = refs
            .iter()
            .filter_map(|r| match r {
                EventRef::PublicId(public_id) => Some(public_id.clone()),
                EventRef::Id(_) => None,
            })
            .collect();
        if ids.is_empty() && public_ids.is_empty() {
            return Ok(Vec::new());
        }
        let lease = lease.clone();

        self.db
            .immediate_transaction_async(move |tx| {
                // ?1 is the retry cap, then ids, then public ids
                let id_marks = (0..ids.len())
                    .map(|i| format!("?{}", i + 2))
                    .collect::<Vec<_>>()
                    .join(", ");
                let public_marks = (0..public_ids.len())
                    .map(|i| format!("?{}", i + 2 + ids.len()))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "SELECT {} FROM translation_events WHERE {} AND (id IN ({}) OR public_id IN ({})) ORDER BY created_at ASC, id ASC",
                    EVENT_COLUMNS, ELIGIBLE_PREDICATE, id_marks, public_marks
                );

                let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(1 + ids.len() + public_ids.len());
                values.push(rusqlite::types::Value::Integer(max_retries as i64));
                values.extend(ids.iter().map(|id| rusqlite::types::Value::Integer(*id)));
                values.extend(public_ids.iter().map(|p| rusqlite::types::Value::Text(p.clone())));

                let candidates: Vec<TranslationEventRecord> = {
                    let mut stmt = tx.prepare(&sql)?;
                    let rows = stmt.query_map(params_from_iter(values.iter()), parse_event_row)?;
                    rows.collect::<rusqlite::Result<_>>()?
                };

                Self::claim_rows(tx, candidates, max_retries, &lease)
            })
            .await
    }

    /// Move selected candidates to PROCESSING under `lease`
    fn claim_rows(
        tx: &Transaction<'_>,
        candidates: Vec<TranslationEventRecord>,
        max_retries: u32,
        lease: &Lease,
    ) -> Result<Vec<TranslationEventRecord>> {
        let now = now_timestamp();
        let mut claimed = Vec::with_capacity(candidates.len());

        for mut event in candidates {
            let updated = tx.execute(
                &format!(
                    r#"
                    UPDATE translation_events
                    SET status = 'processing', lease_token = ?2, lease_expires_at = ?3,
                        started_at = COALESCE(started_at, ?4), updated_at = ?4
                    WHERE id = ?5 AND {}
                    "#,
                    ELIGIBLE_PREDICATE
                ),
                params![max_retries, lease.token, lease.expires_at, now, event.id],
            )?;
            if updated == 0 {
                continue;
            }
            if event.is_retryable(max_retries) {
                debug!(
                    "Retrying event {} (attempt {}/{})",
                    event.short_id(),
                    event.retry_count + 1,
                    max_retries
                );
            }

            event.status = EventStatus::Processing;
            event.lease_token = Some(lease.token.clone());
            event.lease_expires_at = Some(lease.expires_at.clone());
            if event.started_at.is_none() {
                event.started_at = Some(now.clone());
            }
            claimed.push(event);
        }

        debug!("Claimed {} event(s) under lease {}", claimed.len(), lease.token);
        Ok(claimed)
    }

    // =========================================================================
    // Status Transitions
    // =========================================================================

    /// PROCESSING -> COMPLETED; false when the lease was lost
    pub async fn mark_completed(&self, id: i64, lease_token: &str) -> Result<bool> {
        let lease_token = lease_token.to_string();
        let now = now_timestamp();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE translation_events
                    SET status = 'completed', completed_at = ?1, updated_at = ?1,
                        lease_token = NULL, lease_expires_at = NULL
                    WHERE id = ?2 AND status = 'processing' AND lease_token = ?3
                    "#,
                    params![now, id, lease_token],
                )?;
                Ok(updated == 1)
            })
            .await
    }

    /// PROCESSING -> FAILED with `retry_count + 1`.
    ///
    /// With `exhaust` the count jumps straight to `max_retries` so the event
    /// is never picked up again. Returns the new retry count, or `None` when
    /// the lease was lost.
    pub async fn mark_failed(
        &self,
        id: i64,
        lease_token: &str,
        error: &str,
        max_retries: u32,
        exhaust: bool,
    ) -> Result<Option<u32>> {
        let lease_token = lease_token.to_string();
        let error = error.to_string();
        let now = now_timestamp();
        let floor = if exhaust { max_retries } else { 0 };

        self.db
            .execute_async(move |conn| {
                let retry_count = conn
                    .query_row(
                        r#"
                        UPDATE translation_events
                        SET status = 'failed', retry_count = MAX(retry_count + 1, ?1),
                            last_error = ?2, updated_at = ?3,
                            lease_token = NULL, lease_expires_at = NULL
                        WHERE id = ?4 AND status = 'processing' AND lease_token = ?5
                        RETURNING retry_count
                        "#,
                        params![floor, error, now, id, lease_token],
                        |row| row.get::<_, u32>(0),
                    )
                    .optional()?;
                Ok(retry_count)
            })
            .await
    }

    /// Push the lease expiry forward; false when the lease was lost
    pub async fn extend_lease(&self, id: i64, lease: &Lease) -> Result<bool> {
        let lease = lease.clone();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE translation_events
                    SET lease_expires_at = ?1, updated_at = ?2
                    WHERE id = ?3 AND status = 'processing' AND lease_token = ?4
                    "#,
                    params![lease.expires_at, now_timestamp(), id, lease.token],
                )?;
                Ok(updated == 1)
            })
            .await
    }

    /// Push the expiry of every event still held under `lease.token`
    pub async fn extend_batch_lease(&self, lease: &Lease) -> Result<usize> {
        let lease = lease.clone();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE translation_events
                    SET lease_expires_at = ?1, updated_at = ?2
                    WHERE status = 'processing' AND lease_token = ?3
                    "#,
                    params![lease.expires_at, now_timestamp(), lease.token],
                )?;
                Ok(updated)
            })
            .await
    }

    /// Fail every PROCESSING event whose lease lapsed before `now`
    pub async fn sweep_expired_leases(&self, now: &str, error: &str) -> Result<usize> {
        let now = now.to_string();
        let error = error.to_string();

        self.db
            .immediate_transaction_async(move |tx| {
                let swept = tx.execute(
                    r#"
                    UPDATE translation_events
                    SET status = 'failed', retry_count = retry_count + 1, last_error = ?1,
                        updated_at = ?2, lease_token = NULL, lease_expires_at = NULL
                    WHERE status = 'processing' AND lease_expires_at < ?2
                    "#,
                    params![error, now],
                )?;
                Ok(swept)
            })
            .await
    }

    /// Write `completed_locales` inside an open content transaction.
    ///
    /// Fails when the lease was lost so the caller's transaction, and the
    /// content written in it, rolls back.
    pub fn update_completed_locales_sync(
        tx: &Transaction<'_>,
        id: i64,
        lease_token: &str,
        completed_locales: &[String],
    ) -> Result<()> {
        let completed = serde_json::to_string(completed_locales)?;
        let updated = tx
            .execute(
                r#"
                UPDATE translation_events
                SET completed_locales = ?1, updated_at = ?2
                WHERE id = ?3 AND status = 'processing' AND lease_token = ?4
                "#,
                params![completed, now_timestamp(), id, lease_token],
            )
            .context("Failed to record completed locales")?;

        if updated == 0 {
            return Err(anyhow!("Lease on event {} was lost before progress could be saved", id));
        }
        Ok(())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Reset an exhausted or failed event so it is picked up again
    pub async fn requeue(&self, event: &EventRef) -> Result<bool> {
        let event = event.clone();
        let now = now_timestamp();

        self.db
            .execute_async(move |conn| {
                let (column, value): (&str, rusqlite::types::Value) = match event {
                    EventRef::Id(id) => ("id", rusqlite::types::Value::Integer(id)),
                    EventRef::PublicId(public_id) => {
                        ("public_id", rusqlite::types::Value::Text(public_id))
                    }
                };
                let updated = conn.execute(
                    &format!(
                        r#"
                        UPDATE translation_events
                        SET status = 'pending', retry_count = 0, last_error = NULL, updated_at = ?1
                        WHERE {} = ?2 AND status = 'failed'
                        "#,
                        column
                    ),
                    params![now, value],
                )?;
                Ok(updated == 1)
            })
            .await
    }

    /// Count events per status, splitting FAILED by the retry cap
    pub async fn queue_stats(&self, max_retries: u32) -> Result<QueueStats> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT status, retry_count >= ?1 AS exhausted, COUNT(*)
                    FROM translation_events
                    GROUP BY status, exhausted
                    "#,
                )?;
                let rows = stmt.query_map([max_retries], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?, row.get::<_, i64>(2)?))
                })?;

                let mut stats = QueueStats::default();
                for row in rows {
                    let (status, exhausted, count) = row?;
                    match status.parse::<EventStatus>()? {
                        EventStatus::Pending => stats.pending += count,
                        EventStatus::Processing => stats.processing += count,
                        EventStatus::Completed => stats.completed += count,
                        EventStatus::Failed if exhausted => stats.exhausted += count,
                        EventStatus::Failed => stats.retryable += count,
                    }
                }
                Ok(stats)
            })
            .await
    }

    /// List FAILED events whose retry budget is used up, newest first
    pub async fn list_exhausted(&self, max_retries: u32) -> Result<Vec<TranslationEventRecord>> {
        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM translation_events WHERE status = 'failed' AND retry_count >= ?1 ORDER BY updated_at DESC",
                    EVENT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([max_retries], parse_event_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }
}
