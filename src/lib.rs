/*!
 * # cookloc - translation event worker for recipe content
 *
 * Recipes, their steps and ingredients, and cooking log posts are written
 * in one locale and translated into others by an LLM. Each translation job
 * is a row in the `translation_events` queue; workers claim rows, translate
 * the locales still missing, and save every locale all-or-nothing.
 *
 * ## Features
 *
 * - At-least-once work queue on SQLite with lease-based claiming, so
 *   concurrent workers never process the same event
 * - Per-locale partial progress: `completed_locales` only ever grows
 * - Retry with a cap; exhausted events stay as an audit record
 * - Savepoint per locale: a recipe is never left partially translated
 * - Translators for OpenAI-compatible, Anthropic and Ollama chat APIs
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `database`: SQLite connection, schema and the event repository
 * - `content`: Translatable entity kinds and their persistence
 * - `translator`: The translation capability and its implementations
 * - `providers`: HTTP clients for the LLM providers
 * - `events`: Fetcher, processor, status tracker and batch runner
 * - `language_utils`: Locale code validation
 * - `errors`: Custom error types
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod content;
pub mod database;
pub mod errors;
pub mod events;
pub mod language_utils;
pub mod providers;
pub mod translator;

// Re-export main types for easier usage
pub use app_config::Config;
pub use content::{ContentStore, EntityContent};
pub use database::{DatabaseConnection, Repository};
pub use errors::{LocaleError, ProviderError, StoreError, TranslationError};
pub use events::{BatchRunner, BatchSummary, Trigger};
pub use translator::Translator;
