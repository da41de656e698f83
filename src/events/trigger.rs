/*!
 * Invocation triggers.
 *
 * A worker run is started either on a schedule (process a bounded batch of
 * eligible events) or by a queue message naming specific events. Message
 * bodies are JSON:
 *
 * - `{"event_id": 42}` or `{"event_id": "<public id>"}`
 * - `{"event_ids": [42, "<public id>"]}`
 * - a queue envelope `{"Records": [{"body": "<one of the above>"}]}`
 *
 * An empty body, or an object naming no events, is a scheduled run.
 */

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::database::repository::EventRef;

/// What a worker run should process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Oldest eligible events, up to `limit` (default batch size)
    Scheduled { limit: Option<usize> },
    /// Exactly these events, if still eligible
    Explicit(Vec<EventRef>),
}

impl Trigger {
    /// Parse a message body
    pub fn from_message(payload: &str) -> Result<Self> {
        if payload.trim().is_empty() {
            return Ok(Trigger::Scheduled { limit: None });
        }

        let value: Value = serde_json::from_str(payload).context("Trigger message is not valid JSON")?;
        let refs = collect_refs(&value)?;

        if refs.is_empty() {
            if value.get("Records").is_some() {
                return Err(anyhow!("Queue message names no events"));
            }
            return Ok(Trigger::Scheduled { limit: None });
        }
        Ok(Trigger::Explicit(refs))
    }
}

fn event_ref(value: &Value) -> Result<EventRef> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(EventRef::Id)
            .ok_or_else(|| anyhow!("Event id is not an integer: {}", n)),
        Value::String(s) => s.parse(),
        other => Err(anyhow!("Unsupported event reference: {}", other)),
    }
}

fn collect_refs(value: &Value) -> Result<Vec<EventRef>> {
    let mut refs = Vec::new();

    if let Some(records) = value.get("Records") {
        let records = records
            .as_array()
            .ok_or_else(|| anyhow!("'Records' must be an array"))?;
        for record in records {
            let body = match record.get("body") {
                Some(Value::String(text)) => {
                    serde_json::from_str(text).context("Record body is not valid JSON")?
                }
                Some(inline) => inline.clone(),
                None => return Err(anyhow!("Record has no body")),
            };
            refs.extend(collect_refs(&body)?);
        }
    }

    if let Some(id) = value.get("event_id") {
        refs.push(event_ref(id)?);
    }

    if let Some(ids) = value.get("event_ids") {
        let ids = ids
            .as_array()
            .ok_or_else(|| anyhow!("'event_ids' must be an array"))?;
        for id in ids {
            refs.push(event_ref(id)?);
        }
    }

    // Same event named twice in one message
    let mut unique = Vec::with_capacity(refs.len());
    for r in refs {
        if !unique.contains(&r) {
            unique.push(r);
        }
    }
    Ok(unique)
}
