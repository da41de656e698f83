/*!
 * Single recipe steps and ingredients.
 *
 * Events may target one child row instead of the whole recipe, for example
 * when only one step was edited.
 */

use rusqlite::{Connection, OptionalExtension};

use super::store::{merge_translation, parse_map};
use super::{FieldBundle, Translatable, TranslationMap, sent_field};
use crate::database::models::EntityType;
use crate::errors::{StoreError, TranslationError};

/// A single recipe step
#[derive(Debug, Clone)]
pub struct StepContent {
    pub id: i64,
    pub recipe_id: i64,
    pub step_number: i64,
    pub description: String,
    pub description_translations: TranslationMap,
}

/// Validated step translation; `None` when the source step is blank
#[derive(Debug, Clone)]
pub struct StepTranslation {
    pub description: Option<String>,
}

impl Translatable for StepContent {
    type Translation = StepTranslation;

    const ENTITY_TYPE: EntityType = EntityType::RecipeStep;

    fn load(conn: &Connection, id: i64) -> Result<Option<Self>, StoreError> {
        let row = conn
            .query_row(
                r#"
                SELECT recipe_id, step_number, description, description_translations
                FROM recipe_steps WHERE id = ?1
                "#,
                [id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(recipe_id, step_number, description, map)| {
            Ok::<_, StoreError>(StepContent {
                id,
                recipe_id,
                step_number,
                description,
                description_translations: parse_map(&map)?,
            })
        })
        .transpose()
    }

    fn source_fields(&self) -> FieldBundle {
        let mut fields = FieldBundle::new();
        if !self.description.trim().is_empty() {
            fields.insert("description".to_string(), self.description.clone());
        }
        fields
    }

    fn validate(&self, translated: &FieldBundle) -> Result<StepTranslation, TranslationError> {
        let sent = self.source_fields();
        Ok(StepTranslation {
            description: sent_field(&sent, translated, "description")?,
        })
    }

    fn write(
        &self,
        conn: &Connection,
        locale: &str,
        translation: &StepTranslation,
    ) -> Result<(), StoreError> {
        match &translation.description {
            Some(description) => merge_translation(
                conn,
                "recipe_steps",
                "description_translations",
                self.id,
                locale,
                description,
            ),
            None => Ok(()),
        }
    }
}

/// A single recipe ingredient
#[derive(Debug, Clone)]
pub struct IngredientContent {
    pub id: i64,
    pub recipe_id: i64,
    pub position: i64,
    pub name: String,
    pub quantity: Option<String>,
    pub name_translations: TranslationMap,
}

/// Validated ingredient translation; `None` when the source name is blank
#[derive(Debug, Clone)]
pub struct IngredientTranslation {
    pub name: Option<String>,
}

impl Translatable for IngredientContent {
    type Translation = IngredientTranslation;

    const ENTITY_TYPE: EntityType = EntityType::RecipeIngredient;

    fn load(conn: &Connection, id: i64) -> Result<Option<Self>, StoreError> {
        let row = conn
            .query_row(
                r#"
                SELECT recipe_id, position, name, quantity, name_translations
                FROM recipe_ingredients WHERE id = ?1
                "#,
                [id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(recipe_id, position, name, quantity, map)| {
            Ok::<_, StoreError>(IngredientContent {
                id,
                recipe_id,
                position,
                name,
                quantity,
                name_translations: parse_map(&map)?,
            })
        })
        .transpose()
    }

    // Quantities are units and numbers; only the name is translated
    fn source_fields(&self) -> FieldBundle {
        let mut fields = FieldBundle::new();
        if !self.name.trim().is_empty() {
            fields.insert("name".to_string(), self.name.clone());
        }
        fields
    }

    fn validate(&self, translated: &FieldBundle) -> Result<IngredientTranslation, TranslationError> {
        let sent = self.source_fields();
        Ok(IngredientTranslation {
            name: sent_field(&sent, translated, "name")?,
        })
    }

    fn write(
        &self,
        conn: &Connection,
        locale: &str,
        translation: &IngredientTranslation,
    ) -> Result<(), StoreError> {
        let Some(name) = &translation.name else {
            return Ok(());
        };
        merge_translation(
            conn,
            "recipe_ingredients",
            "name_translations",
            self.id,
            locale,
            name,
        )
    }
}
