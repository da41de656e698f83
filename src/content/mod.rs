/*!
 * Translatable content.
 *
 * Every entity kind (recipe bundle, single step, single ingredient, log
 * post) implements [`Translatable`]: it knows its own field list, how to
 * load itself, how to validate a translator response against its source,
 * and how to write one locale into its rows. [`EntityContent`] and
 * [`LocaleTranslation`] are the tagged variants the processor works with.
 *
 * Field bundles are flat `key -> text` maps. Child rows use indexed keys:
 * `step.<step_number>` and `ingredient.<position>`.
 */

use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fmt;

use crate::database::models::EntityType;
use crate::errors::{StoreError, TranslationError};

pub mod log_post;
pub mod parts;
pub mod recipe;
pub mod store;

pub use log_post::{LogPostContent, LogPostTranslation};
pub use parts::{IngredientContent, IngredientTranslation, StepContent, StepTranslation};
pub use recipe::{RecipeContent, RecipeTranslation};
pub use store::ContentStore;

/// Flat field bundle exchanged with the translator
pub type FieldBundle = BTreeMap<String, String>;

/// Locale-keyed translations of one field
pub type TranslationMap = BTreeMap<String, String>;

/// Key of a recipe step inside a bundle
pub fn step_key(step_number: i64) -> String {
    format!("step.{}", step_number)
}

/// Key of a recipe ingredient inside a bundle
pub fn ingredient_key(position: i64) -> String {
    format!("ingredient.{}", position)
}

/// Tone hint passed to the translator; never changes semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentHint {
    /// Recipe text: instructional, concise
    Recipe,
    /// Personal cooking log: conversational
    LogPost,
}

impl ContentHint {
    /// Hint used for an entity type
    pub fn for_entity(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Recipe | EntityType::RecipeStep | EntityType::RecipeIngredient => {
                ContentHint::Recipe
            }
            EntityType::LogPost => ContentHint::LogPost,
        }
    }
}

impl fmt::Display for ContentHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentHint::Recipe => write!(f, "recipe"),
            ContentHint::LogPost => write!(f, "log_post"),
        }
    }
}

/// One kind of translatable record
pub trait Translatable: Sized {
    /// Validated, typed translation of this kind for one locale
    type Translation;

    /// Entity type tag stored on events
    const ENTITY_TYPE: EntityType;

    /// Load the record and its existing translation maps
    fn load(conn: &Connection, id: i64) -> Result<Option<Self>, StoreError>;

    /// Non-empty source fields to send to the translator
    fn source_fields(&self) -> FieldBundle;

    /// Check a translator response against the source.
    ///
    /// Runs before anything is written. Fields that were sent must come
    /// back non-empty; child rows must line up one to one.
    fn validate(&self, translated: &FieldBundle) -> Result<Self::Translation, TranslationError>;

    /// Write one locale into every row of the record
    fn write(
        &self,
        conn: &Connection,
        locale: &str,
        translation: &Self::Translation,
    ) -> Result<(), StoreError>;
}

/// Fetch a required field from a translator response
pub(crate) fn required_field(
    translated: &FieldBundle,
    key: &str,
) -> Result<String, TranslationError> {
    let value = translated
        .get(key)
        .ok_or_else(|| TranslationError::MissingField {
            field: key.to_string(),
        })?;
    let value = value.trim();
    if value.is_empty() {
        return Err(TranslationError::EmptyField {
            field: key.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Fetch a field only if it was part of the request
pub(crate) fn sent_field(
    sent: &FieldBundle,
    translated: &FieldBundle,
    key: &str,
) -> Result<Option<String>, TranslationError> {
    if sent.contains_key(key) {
        required_field(translated, key).map(Some)
    } else {
        Ok(None)
    }
}

/// Count keys of one child kind (`step.` / `ingredient.`) in a bundle
pub(crate) fn count_prefixed(bundle: &FieldBundle, prefix: &str) -> usize {
    bundle.keys().filter(|key| key.starts_with(prefix)).count()
}

/// Content of any entity kind
#[derive(Debug, Clone)]
pub enum EntityContent {
    /// Full recipe bundle
    Recipe(RecipeContent),
    /// Single step
    RecipeStep(StepContent),
    /// Single ingredient
    RecipeIngredient(IngredientContent),
    /// Log post
    LogPost(LogPostContent),
}

/// Validated translation of any entity kind
#[derive(Debug, Clone)]
pub enum LocaleTranslation {
    /// Full recipe bundle
    Recipe(RecipeTranslation),
    /// Single step
    RecipeStep(StepTranslation),
    /// Single ingredient
    RecipeIngredient(IngredientTranslation),
    /// Log post
    LogPost(LogPostTranslation),
}

impl EntityContent {
    /// Load content for an entity type
    pub fn load(
        conn: &Connection,
        entity_type: EntityType,
        id: i64,
    ) -> Result<Option<Self>, StoreError> {
        Ok(match entity_type {
            EntityType::Recipe => RecipeContent::load(conn, id)?.map(EntityContent::Recipe),
            EntityType::RecipeStep => StepContent::load(conn, id)?.map(EntityContent::RecipeStep),
            EntityType::RecipeIngredient => {
                IngredientContent::load(conn, id)?.map(EntityContent::RecipeIngredient)
            }
            EntityType::LogPost => LogPostContent::load(conn, id)?.map(EntityContent::LogPost),
        })
    }

    /// Entity type of this content
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityContent::Recipe(_) => RecipeContent::ENTITY_TYPE,
            EntityContent::RecipeStep(_) => StepContent::ENTITY_TYPE,
            EntityContent::RecipeIngredient(_) => IngredientContent::ENTITY_TYPE,
            EntityContent::LogPost(_) => LogPostContent::ENTITY_TYPE,
        }
    }

    /// Tone hint for the translator
    pub fn hint(&self) -> ContentHint {
        ContentHint::for_entity(self.entity_type())
    }

    /// Non-empty source fields
    pub fn source_fields(&self) -> FieldBundle {
        match self {
            EntityContent::Recipe(c) => c.source_fields(),
            EntityContent::RecipeStep(c) => c.source_fields(),
            EntityContent::RecipeIngredient(c) => c.source_fields(),
            EntityContent::LogPost(c) => c.source_fields(),
        }
    }

    /// Validate a translator response for this content
    pub fn validate(&self, translated: &FieldBundle) -> Result<LocaleTranslation, TranslationError> {
        Ok(match self {
            EntityContent::Recipe(c) => LocaleTranslation::Recipe(c.validate(translated)?),
            EntityContent::RecipeStep(c) => LocaleTranslation::RecipeStep(c.validate(translated)?),
            EntityContent::RecipeIngredient(c) => {
                LocaleTranslation::RecipeIngredient(c.validate(translated)?)
            }
            EntityContent::LogPost(c) => LocaleTranslation::LogPost(c.validate(translated)?),
        })
    }

    /// Write one validated locale; the caller provides the savepoint
    pub fn write(
        &self,
        conn: &Connection,
        locale: &str,
        translation: &LocaleTranslation,
    ) -> Result<(), StoreError> {
        match (self, translation) {
            (EntityContent::Recipe(c), LocaleTranslation::Recipe(t)) => c.write(conn, locale, t),
            (EntityContent::RecipeStep(c), LocaleTranslation::RecipeStep(t)) => {
                c.write(conn, locale, t)
            }
            (EntityContent::RecipeIngredient(c), LocaleTranslation::RecipeIngredient(t)) => {
                c.write(conn, locale, t)
            }
            (EntityContent::LogPost(c), LocaleTranslation::LogPost(t)) => c.write(conn, locale, t),
            _ => Err(StoreError::KindMismatch(self.entity_type().to_string())),
        }
    }
}
