/*!
 * Content persistence.
 *
 * Reads translatable records and writes one locale at a time into their
 * `<field>_translations` maps. A locale is written inside its own savepoint:
 * every row of the record is updated, or the savepoint is dropped and none
 * of them are.
 */

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{Connection, OptionalExtension, Transaction, params};

use super::{EntityContent, LocaleTranslation, TranslationMap};
use crate::database::DatabaseConnection;
use crate::database::models::{EntityType, now_timestamp};
use crate::errors::StoreError;

/// Decode a translation map column; blank text is an empty map
pub(crate) fn parse_map(text: &str) -> Result<TranslationMap, StoreError> {
    if text.trim().is_empty() {
        return Ok(TranslationMap::new());
    }
    Ok(serde_json::from_str(text)?)
}

/// Set `locale` in one translation map column of one row.
///
/// The map is re-read inside the caller's transaction so entries written by
/// other events are kept. Empty values are refused and a missing row is
/// reported as [`StoreError::RowVanished`].
pub(crate) fn merge_translation(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
    id: i64,
    locale: &str,
    value: &str,
) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::EmptyValue { table, id });
    }

    let current: Option<String> = conn
        .query_row(
            &format!("SELECT {} FROM {} WHERE id = ?1", column, table),
            [id],
            |row| row.get(0),
        )
        .optional()?;
    let current = current.ok_or(StoreError::RowVanished { table, id })?;

    let mut map = parse_map(&current)?;
    map.insert(locale.to_string(), value.to_string());

    let updated = conn.execute(
        &format!("UPDATE {} SET {} = ?1 WHERE id = ?2", table, column),
        params![serde_json::to_string(&map)?, id],
    )?;
    if updated == 0 {
        return Err(StoreError::RowVanished { table, id });
    }

    Ok(())
}

/// Source rows for a new recipe
#[derive(Debug, Clone, Default)]
pub struct NewRecipe {
    /// Recipe title
    pub title: String,
    /// Recipe description
    pub description: String,
    /// Name of the linked food master row, created on insert
    pub food_name: Option<String>,
    /// Step descriptions; numbered from 1
    pub steps: Vec<String>,
    /// Ingredients; positioned from 1
    pub ingredients: Vec<NewIngredient>,
}

/// Source row for a new ingredient
#[derive(Debug, Clone, Default)]
pub struct NewIngredient {
    /// Ingredient name
    pub name: String,
    /// Free-form quantity, never translated
    pub quantity: Option<String>,
}

/// Access to translatable content
#[derive(Clone)]
pub struct ContentStore {
    db: DatabaseConnection,
}

impl ContentStore {
    /// Create a store over an open connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Load an entity; `None` when it no longer exists
    pub async fn fetch(&self, entity_type: EntityType, id: i64) -> Result<Option<EntityContent>> {
        self.db
            .execute_async(move |conn| {
                let content = EntityContent::load(conn, entity_type, id)
                    .with_context(|| format!("Failed to load {} {}", entity_type, id))?;
                Ok(content)
            })
            .await
    }

    /// Write one validated locale inside its own savepoint.
    ///
    /// On error the savepoint is dropped before returning, so nothing this
    /// call wrote survives while the enclosing transaction stays usable.
    pub fn save_locale(
        tx: &mut Transaction<'_>,
        content: &EntityContent,
        locale: &str,
        translation: &LocaleTranslation,
    ) -> Result<(), StoreError> {
        let sp = tx.savepoint()?;
        content.write(&sp, locale, translation)?;
        sp.commit()?;

        debug!("Saved '{}' translation for {}", locale, content.entity_type());
        Ok(())
    }

    // =========================================================================
    // Seeding & Inspection
    // =========================================================================

    /// Insert a recipe with its food, steps and ingredients; returns its id
    pub async fn insert_recipe(&self, recipe: &NewRecipe) -> Result<i64> {
        let recipe = recipe.clone();

        self.db
            .immediate_transaction_async(move |tx| {
                let food_id = match &recipe.food_name {
                    Some(name) => {
                        tx.execute("INSERT INTO foods_master (name) VALUES (?1)", [name])?;
                        Some(tx.last_insert_rowid())
                    }
                    None => None,
                };

                tx.execute(
                    "INSERT INTO recipes (food_master_id, title, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![food_id, recipe.title, recipe.description, now_timestamp()],
                )?;
                let recipe_id = tx.last_insert_rowid();

                for (i, description) in recipe.steps.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO recipe_steps (recipe_id, step_number, description) VALUES (?1, ?2, ?3)",
                        params![recipe_id, i as i64 + 1, description],
                    )?;
                }
                for (i, ingredient) in recipe.ingredients.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO recipe_ingredients (recipe_id, position, name, quantity) VALUES (?1, ?2, ?3, ?4)",
                        params![recipe_id, i as i64 + 1, ingredient.name, ingredient.quantity],
                    )?;
                }

                Ok(recipe_id)
            })
            .await
            .context("Failed to insert recipe")
    }

    /// Insert a log post; returns its id
    pub async fn insert_log_post(&self, title: &str, content: &str) -> Result<i64> {
        let title = title.to_string();
        let content = content.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO log_posts (title, content, created_at) VALUES (?1, ?2, ?3)",
                    params![title, content, now_timestamp()],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// Ids of a recipe's step rows, by step number
    pub async fn step_ids(&self, recipe_id: i64) -> Result<Vec<i64>> {
        self.child_ids("recipe_steps", "step_number", recipe_id).await
    }

    /// Ids of a recipe's ingredient rows, by position
    pub async fn ingredient_ids(&self, recipe_id: i64) -> Result<Vec<i64>> {
        self.child_ids("recipe_ingredients", "position", recipe_id).await
    }

    async fn child_ids(&self, table: &'static str, order: &'static str, recipe_id: i64) -> Result<Vec<i64>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id FROM {} WHERE recipe_id = ?1 ORDER BY {}",
                    table, order
                ))?;
                let rows = stmt.query_map([recipe_id], |row| row.get(0))?;
                Ok(rows.collect::<rusqlite::Result<Vec<i64>>>()?)
            })
            .await
    }

    /// Read one translation map column of one row
    pub async fn translations_of(
        &self,
        table: &'static str,
        column: &'static str,
        id: i64,
    ) -> Result<TranslationMap> {
        self.db
            .execute_async(move |conn| {
                let text: String = conn.query_row(
                    &format!("SELECT {} FROM {} WHERE id = ?1", column, table),
                    [id],
                    |row| row.get(0),
                )?;
                Ok(parse_map(&text)?)
            })
            .await
    }
}
