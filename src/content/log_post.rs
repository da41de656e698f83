/*!
 * Cooking log posts.
 */

use rusqlite::{Connection, OptionalExtension};

use super::store::{merge_translation, parse_map};
use super::{FieldBundle, Translatable, TranslationMap, sent_field};
use crate::database::models::EntityType;
use crate::errors::{StoreError, TranslationError};

/// A log post
#[derive(Debug, Clone)]
pub struct LogPostContent {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub title_translations: TranslationMap,
    pub content_translations: TranslationMap,
}

/// Validated log post translation
#[derive(Debug, Clone)]
pub struct LogPostTranslation {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl Translatable for LogPostContent {
    type Translation = LogPostTranslation;

    const ENTITY_TYPE: EntityType = EntityType::LogPost;

    fn load(conn: &Connection, id: i64) -> Result<Option<Self>, StoreError> {
        let row = conn
            .query_row(
                r#"
                SELECT title, content, title_translations, content_translations
                FROM log_posts WHERE id = ?1
                "#,
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(title, content, title_map, content_map)| {
            Ok::<_, StoreError>(LogPostContent {
                id,
                title,
                content,
                title_translations: parse_map(&title_map)?,
                content_translations: parse_map(&content_map)?,
            })
        })
        .transpose()
    }

    fn source_fields(&self) -> FieldBundle {
        let mut fields = FieldBundle::new();
        if !self.title.trim().is_empty() {
            fields.insert("title".to_string(), self.title.clone());
        }
        if !self.content.trim().is_empty() {
            fields.insert("content".to_string(), self.content.clone());
        }
        fields
    }

    fn validate(&self, translated: &FieldBundle) -> Result<LogPostTranslation, TranslationError> {
        let sent = self.source_fields();
        Ok(LogPostTranslation {
            title: sent_field(&sent, translated, "title")?,
            content: sent_field(&sent, translated, "content")?,
        })
    }

    fn write(
        &self,
        conn: &Connection,
        locale: &str,
        translation: &LogPostTranslation,
    ) -> Result<(), StoreError> {
        if let Some(title) = &translation.title {
            merge_translation(conn, "log_posts", "title_translations", self.id, locale, title)?;
        }
        if let Some(content) = &translation.content {
            merge_translation(conn, "log_posts", "content_translations", self.id, locale, content)?;
        }
        Ok(())
    }
}
