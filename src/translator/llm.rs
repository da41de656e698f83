/*!
 * LLM-backed translator.
 *
 * The field bundle is sent as a JSON object and the model is asked to
 * answer with the same keys. Replies may be wrapped in a code fence or
 * surrounded by chatter; the first JSON object in the reply is used.
 */

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::Translator;
use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::content::{ContentHint, FieldBundle};
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils::get_locale_name;
use crate::providers::Provider;
use crate::providers::RetryPolicy;
use crate::providers::anthropic::{Anthropic, AnthropicRequest};
use crate::providers::ollama::{ChatMessage, ChatRequest, Ollama};
use crate::providers::openai::{OpenAI, OpenAIRequest};

/// Upper bound on reply length for providers that require one
const MAX_REPLY_TOKENS: u32 = 4096;

/// Provider client behind the translator
#[derive(Debug)]
enum ProviderClient {
    OpenAI(OpenAI),
    Anthropic(Anthropic),
    Ollama(Ollama),
}

/// Translator that prompts a chat model
#[derive(Debug)]
pub struct LlmTranslator {
    client: ProviderClient,
    provider: TranslationProvider,
    model: String,
    temperature: f32,
}

impl LlmTranslator {
    /// Build the translator for the active provider
    pub fn from_config(config: &TranslationConfig) -> Self {
        let policy = RetryPolicy {
            max_retries: config.common.retry_count,
            backoff_base_ms: config.common.retry_backoff_ms,
            rate_limit: config.get_rate_limit(),
        };
        let model = config.get_model();
        let endpoint = config.get_endpoint();
        let timeout = config.get_timeout();

        let client = match config.provider {
            TranslationProvider::OpenAI => ProviderClient::OpenAI(OpenAI::new(
                config.get_api_key(),
                endpoint,
                model.clone(),
                timeout,
                policy,
            )),
            TranslationProvider::Anthropic => ProviderClient::Anthropic(Anthropic::new(
                config.get_api_key(),
                endpoint,
                model.clone(),
                timeout,
                policy,
            )),
            TranslationProvider::Ollama => {
                ProviderClient::Ollama(Ollama::new(endpoint, model.clone(), timeout, policy))
            }
        };

        Self {
            client,
            provider: config.provider,
            model,
            temperature: config.common.temperature,
        }
    }

    /// Check the provider answers at all
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        match &self.client {
            ProviderClient::OpenAI(client) => client.test_connection().await,
            ProviderClient::Anthropic(client) => client.test_connection().await,
            ProviderClient::Ollama(client) => client.test_connection().await,
        }
    }

    async fn chat(&self, system: String, user: String) -> Result<String, ProviderError> {
        match &self.client {
            ProviderClient::OpenAI(client) => {
                let request = OpenAIRequest::new(self.model.clone())
                    .add_message("system", system)
                    .add_message("user", user)
                    .temperature(self.temperature)
                    .json_object();
                let response = client.complete(request).await?;
                Ok(OpenAI::extract_text(&response))
            }
            ProviderClient::Anthropic(client) => {
                let request = AnthropicRequest::new(self.model.clone(), MAX_REPLY_TOKENS)
                    .system(system)
                    .add_message("user", user)
                    .temperature(self.temperature);
                let response = client.complete(request).await?;
                Ok(Anthropic::extract_text(&response))
            }
            ProviderClient::Ollama(client) => {
                let messages = vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: system,
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: user,
                    },
                ];
                let request = ChatRequest::new(self.model.clone(), messages)
                    .temperature(self.temperature)
                    .format("json");
                let response = client.complete(request).await?;
                Ok(Ollama::extract_text(&response))
            }
        }
    }
}

/// Human-readable locale name, falling back to the code itself
fn describe_locale(locale: &str) -> String {
    get_locale_name(locale).unwrap_or_else(|_| locale.to_string())
}

/// System prompt for one translation call
pub fn build_system_prompt(source_locale: &str, target_locale: &str, hint: ContentHint) -> String {
    let tone = match hint {
        ContentHint::Recipe => {
            "The text belongs to a cooking recipe. Keep instructions concise and imperative, \
             keep quantities, units and temperatures exactly as written, and use the dish \
             and ingredient names cooks in the target language actually use."
        }
        ContentHint::LogPost => {
            "The text is a personal cooking diary post. Keep the author's casual, \
             conversational voice and any emoji."
        }
    };

    format!(
        "You translate user content from {} ({}) to {} ({}). {}\n\
         You receive a JSON object of text fields. Reply with ONLY a JSON object that has \
         exactly the same keys, each value translated. Never add, drop or rename keys and \
         never leave a value empty.",
        describe_locale(source_locale),
        source_locale,
        describe_locale(target_locale),
        target_locale,
        tone
    )
}

/// Slice out the first balanced JSON object in `text`
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a model reply into a bundle holding only the keys that were sent
pub fn parse_reply(reply: &str, sent: &FieldBundle) -> Result<FieldBundle, ProviderError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| ProviderError::ParseError("reply contains no JSON object".to_string()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| ProviderError::ParseError(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ProviderError::ParseError("reply is not a JSON object".to_string()))?;

    let mut bundle = FieldBundle::new();
    for key in sent.keys() {
        let text = match object.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => continue,
            Some(other) => other.to_string(),
        };
        bundle.insert(key.clone(), text);
    }
    Ok(bundle)
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(
        &self,
        fields: &FieldBundle,
        source_locale: &str,
        target_locale: &str,
        hint: ContentHint,
    ) -> Result<FieldBundle, TranslationError> {
        let system = build_system_prompt(source_locale, target_locale, hint);
        let user = serde_json::to_string(fields)
            .map_err(|e| ProviderError::RequestFailed(format!("cannot encode fields: {}", e)))?;

        debug!(
            "Translating {} field(s) {} -> {} with {}",
            fields.len(),
            source_locale,
            target_locale,
            self.name()
        );

        let reply = self.chat(system, user).await?;
        Ok(parse_reply(&reply, fields)?)
    }

    fn name(&self) -> String {
        format!("{}:{}", self.provider.display_name(), self.model)
    }
}
