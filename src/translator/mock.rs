/*!
 * Scripted translator for tests and dry runs.
 *
 * By default every value comes back as `"[<target>] <value>"`. Individual
 * locales can be scripted to fail, hang, or return damaged payloads.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::Translator;
use crate::content::{ContentHint, FieldBundle};
use crate::errors::{ProviderError, TranslationError};

/// One recorded translator call
#[derive(Debug, Clone)]
pub struct MockCall {
    pub source_locale: String,
    pub target_locale: String,
    pub fields: FieldBundle,
    pub hint: ContentHint,
}

#[derive(Debug, Default)]
struct MockState {
    failing: HashSet<String>,
    hanging: HashSet<String>,
    dropped: HashMap<String, Vec<String>>,
    blanked: HashMap<String, Vec<String>>,
    calls: Vec<MockCall>,
}

/// Translator with scripted per-locale behaviour
#[derive(Debug, Default)]
pub struct MockTranslator {
    state: Mutex<MockState>,
}

impl MockTranslator {
    /// Translator that succeeds for every locale
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call targeting `locale` with a provider error
    pub fn fail_locale(&self, locale: &str) -> &Self {
        self.state.lock().failing.insert(locale.to_string());
        self
    }

    /// Never answer calls targeting `locale`
    pub fn hang_locale(&self, locale: &str) -> &Self {
        self.state.lock().hanging.insert(locale.to_string());
        self
    }

    /// Leave `key` out of replies for `locale`
    pub fn drop_key(&self, locale: &str, key: &str) -> &Self {
        self.state
            .lock()
            .dropped
            .entry(locale.to_string())
            .or_default()
            .push(key.to_string());
        self
    }

    /// Return an empty value for `key` in replies for `locale`
    pub fn blank_key(&self, locale: &str, key: &str) -> &Self {
        self.state
            .lock()
            .blanked
            .entry(locale.to_string())
            .or_default()
            .push(key.to_string());
        self
    }

    /// Clear every scripted fault for `locale`
    pub fn heal_locale(&self, locale: &str) -> &Self {
        let mut state = self.state.lock();
        state.failing.remove(locale);
        state.hanging.remove(locale);
        state.dropped.remove(locale);
        state.blanked.remove(locale);
        self
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Target locales of every call, in call order
    pub fn called_locales(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .map(|c| c.target_locale.clone())
            .collect()
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        fields: &FieldBundle,
        source_locale: &str,
        target_locale: &str,
        hint: ContentHint,
    ) -> Result<FieldBundle, TranslationError> {
        // The guard must be released before any await point
        let (fail, hang, dropped, blanked) = {
            let mut state = self.state.lock();
            state.calls.push(MockCall {
                source_locale: source_locale.to_string(),
                target_locale: target_locale.to_string(),
                fields: fields.clone(),
                hint,
            });
            (
                state.failing.contains(target_locale),
                state.hanging.contains(target_locale),
                state.dropped.get(target_locale).cloned().unwrap_or_default(),
                state.blanked.get(target_locale).cloned().unwrap_or_default(),
            )
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: format!("scripted failure for '{}'", target_locale),
            }
            .into());
        }

        let mut translated = FieldBundle::new();
        for (key, value) in fields {
            if dropped.contains(key) {
                continue;
            }
            let text = if blanked.contains(key) {
                String::new()
            } else {
                format!("[{}] {}", target_locale, value)
            };
            translated.insert(key.clone(), text);
        }
        Ok(translated)
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}
