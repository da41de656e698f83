/*!
 * Full recipe bundle.
 *
 * A recipe is translated as one unit: its own title and description, the
 * name of the linked food master row, every step and every ingredient.
 */

use rusqlite::{Connection, OptionalExtension};

use super::store::{merge_translation, parse_map};
use super::{
    FieldBundle, Translatable, TranslationMap, count_prefixed, ingredient_key, required_field,
    sent_field, step_key,
};
use crate::database::models::EntityType;
use crate::errors::{StoreError, TranslationError};

/// Bundle key of the linked food name
pub const FOOD_NAME_KEY: &str = "food_name";

/// Linked food master row
#[derive(Debug, Clone)]
pub struct FoodRow {
    pub id: i64,
    pub name: String,
    pub name_translations: TranslationMap,
}

/// One step of a recipe
#[derive(Debug, Clone)]
pub struct StepRow {
    pub id: i64,
    pub step_number: i64,
    pub description: String,
    pub description_translations: TranslationMap,
}

/// One ingredient of a recipe
#[derive(Debug, Clone)]
pub struct IngredientRow {
    pub id: i64,
    pub position: i64,
    pub name: String,
    pub name_translations: TranslationMap,
}

/// Recipe with everything that is translated alongside it
#[derive(Debug, Clone)]
pub struct RecipeContent {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub title_translations: TranslationMap,
    pub description_translations: TranslationMap,
    pub food: Option<FoodRow>,
    pub steps: Vec<StepRow>,
    pub ingredients: Vec<IngredientRow>,
}

/// Validated recipe translation for one locale
#[derive(Debug, Clone)]
pub struct RecipeTranslation {
    pub title: Option<String>,
    pub description: Option<String>,
    pub food_name: Option<String>,
    /// `(step row id, description)`
    pub steps: Vec<(i64, String)>,
    /// `(ingredient row id, name)`
    pub ingredients: Vec<(i64, String)>,
}

impl RecipeContent {
    fn sent_steps(&self) -> impl Iterator<Item = &StepRow> {
        self.steps.iter().filter(|s| !s.description.trim().is_empty())
    }

    fn sent_ingredients(&self) -> impl Iterator<Item = &IngredientRow> {
        self.ingredients.iter().filter(|i| !i.name.trim().is_empty())
    }

    /// Fail when the stored children no longer match what was translated
    fn check_children(&self, conn: &Connection) -> Result<(), StoreError> {
        let checks = [
            ("step", "recipe_steps", "description", self.sent_steps().count()),
            ("ingredient", "recipe_ingredients", "name", self.sent_ingredients().count()),
        ];
        for (kind, table, column, expected) in checks {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM {} WHERE recipe_id = ?1", column, table))?;
            let texts = stmt
                .query_map([self.id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let actual = texts.iter().filter(|t| !t.trim().is_empty()).count();
            if actual != expected {
                return Err(StoreError::ChildrenChanged {
                    kind,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

impl Translatable for RecipeContent {
    type Translation = RecipeTranslation;

    const ENTITY_TYPE: EntityType = EntityType::Recipe;

    fn load(conn: &Connection, id: i64) -> Result<Option<Self>, StoreError> {
        let row = conn
            .query_row(
                r#"
                SELECT title, description, title_translations, description_translations, food_master_id
                FROM recipes WHERE id = ?1
                "#,
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((title, description, title_map, description_map, food_id)) = row else {
            return Ok(None);
        };

        let food = match food_id {
            Some(food_id) => conn
                .query_row(
                    "SELECT id, name, name_translations FROM foods_master WHERE id = ?1",
                    [food_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?
                .map(|(id, name, map)| {
                    Ok::<_, StoreError>(FoodRow {
                        id,
                        name,
                        name_translations: parse_map(&map)?,
                    })
                })
                .transpose()?,
            None => None,
        };

        let mut steps = Vec::new();
        {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, step_number, description, description_translations
                FROM recipe_steps WHERE recipe_id = ?1 ORDER BY step_number
                "#,
            )?;
            let rows = stmt.query_map([id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            for row in rows {
                let (id, step_number, description, map) = row?;
                steps.push(StepRow {
                    id,
                    step_number,
                    description,
                    description_translations: parse_map(&map)?,
                });
            }
        }

        let mut ingredients = Vec::new();
        {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, position, name, name_translations
                FROM recipe_ingredients WHERE recipe_id = ?1 ORDER BY position
                "#,
            )?;
            let rows = stmt.query_map([id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            for row in rows {
                let (id, position, name, map) = row?;
                ingredients.push(IngredientRow {
                    id,
                    position,
                    name,
                    name_translations: parse_map(&map)?,
                });
            }
        }

        Ok(Some(RecipeContent {
            id,
            title,
            description,
            title_translations: parse_map(&title_map)?,
            description_translations: parse_map(&description_map)?,
            food,
            steps,
            ingredients,
        }))
    }

    fn source_fields(&self) -> FieldBundle {
        let mut fields = FieldBundle::new();
        if !self.title.trim().is_empty() {
            fields.insert("title".to_string(), self.title.clone());
        }
        if !self.description.trim().is_empty() {
            fields.insert("description".to_string(), self.description.clone());
        }
        if let Some(food) = self.food.as_ref().filter(|f| !f.name.trim().is_empty()) {
            fields.insert(FOOD_NAME_KEY.to_string(), food.name.clone());
        }
        for step in self.sent_steps() {
            fields.insert(step_key(step.step_number), step.description.clone());
        }
        for ingredient in self.sent_ingredients() {
            fields.insert(ingredient_key(ingredient.position), ingredient.name.clone());
        }
        fields
    }

    fn validate(&self, translated: &FieldBundle) -> Result<RecipeTranslation, TranslationError> {
        let sent = self.source_fields();

        let title = sent_field(&sent, translated, "title")?;
        let description = sent_field(&sent, translated, "description")?;
        let food_name = sent_field(&sent, translated, FOOD_NAME_KEY)?;

        let expected = self.sent_steps().count();
        let actual = count_prefixed(translated, "step.");
        if expected != actual {
            return Err(TranslationError::CountMismatch {
                kind: "step",
                expected,
                actual,
            });
        }
        let expected = self.sent_ingredients().count();
        let actual = count_prefixed(translated, "ingredient.");
        if expected != actual {
            return Err(TranslationError::CountMismatch {
                kind: "ingredient",
                expected,
                actual,
            });
        }

        let steps = self
            .sent_steps()
            .map(|step| Ok::<_, TranslationError>((step.id, required_field(translated, &step_key(step.step_number))?)))
            .collect::<Result<Vec<_>, TranslationError>>()?;
        let ingredients = self
            .sent_ingredients()
            .map(|ing| Ok::<_, TranslationError>((ing.id, required_field(translated, &ingredient_key(ing.position))?)))
            .collect::<Result<Vec<_>, TranslationError>>()?;

        Ok(RecipeTranslation {
            title,
            description,
            food_name,
            steps,
            ingredients,
        })
    }

    fn write(
        &self,
        conn: &Connection,
        locale: &str,
        translation: &RecipeTranslation,
    ) -> Result<(), StoreError> {
        self.check_children(conn)?;

        if let Some(title) = &translation.title {
            merge_translation(conn, "recipes", "title_translations", self.id, locale, title)?;
        }
        if let Some(description) = &translation.description {
            merge_translation(conn, "recipes", "description_translations", self.id, locale, description)?;
        }

        if let (Some(food), Some(name)) = (&self.food, &translation.food_name) {
            merge_translation(conn, "foods_master", "name_translations", food.id, locale, name)?;
        }

        for (step_id, description) in &translation.steps {
            merge_translation(conn, "recipe_steps", "description_translations", *step_id, locale, description)?;
        }
        for (ingredient_id, name) in &translation.ingredients {
            merge_translation(conn, "recipe_ingredients", "name_translations", *ingredient_id, locale, name)?;
        }

        Ok(())
    }
}
