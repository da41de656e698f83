/*!
 * Common test utilities for the cookloc test suite
 */

use anyhow::Result;
use std::sync::Arc;

use cookloc::app_config::WorkerConfig;
use cookloc::content::store::{NewIngredient, NewRecipe};
use cookloc::database::models::{EntityType, NewTranslationEvent, TranslationEventRecord};
use cookloc::events::{self, BatchRunner};
use cookloc::translator::MockTranslator;
use cookloc::{ContentStore, DatabaseConnection, Repository};

/// Route library logs to the test output
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Repository and content store sharing one in-memory database
pub struct TestDb {
    pub repo: Repository,
    pub store: ContentStore,
}

impl TestDb {
    pub fn in_memory() -> Result<Self> {
        init_logger();
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::over(db))
    }

    pub fn over(db: DatabaseConnection) -> Self {
        Self {
            repo: Repository::new(db.clone()),
            store: ContentStore::new(db),
        }
    }

    /// Runner over this database with a shared mock translator
    pub fn runner(&self, translator: &Arc<MockTranslator>, config: &WorkerConfig) -> BatchRunner {
        BatchRunner::new(
            self.repo.clone(),
            self.store.clone(),
            translator.clone(),
            config,
        )
    }

    /// Queue an event through the public enqueue path
    pub async fn enqueue(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        targets: &[&str],
    ) -> Result<TranslationEventRecord> {
        events::enqueue(
            &self.repo,
            NewTranslationEvent {
                entity_type,
                entity_id,
                source_locale: "ko".to_string(),
                target_locales: targets.iter().map(|t| t.to_string()).collect(),
            },
        )
        .await
    }

    /// Re-read an event that must exist
    pub async fn reload(&self, event: &TranslationEventRecord) -> Result<TranslationEventRecord> {
        self.repo
            .get_event(event.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("event {} disappeared", event.id))
    }
}

/// Worker settings suited to tests: a one second translator timeout
pub fn test_worker_config() -> WorkerConfig {
    WorkerConfig {
        translate_timeout_secs: 1,
        ..WorkerConfig::default()
    }
}

/// Kimchi stew with a linked food, two steps and two ingredients
pub fn kimchi_stew() -> NewRecipe {
    NewRecipe {
        title: "김치찌개".to_string(),
        description: "묵은지로 끓이는 찌개".to_string(),
        food_name: Some("김치찌개".to_string()),
        steps: vec![
            "돼지고기를 볶는다".to_string(),
            "김치와 물을 넣고 끓인다".to_string(),
        ],
        ingredients: vec![
            NewIngredient {
                name: "김치".to_string(),
                quantity: Some("300g".to_string()),
            },
            NewIngredient {
                name: "돼지고기".to_string(),
                quantity: Some("200g".to_string()),
            },
        ],
    }
}

/// Recipe with `steps` numbered steps and no food link
pub fn recipe_with_steps(steps: usize) -> NewRecipe {
    NewRecipe {
        title: "계란말이".to_string(),
        description: String::new(),
        food_name: None,
        steps: (1..=steps).map(|n| format!("단계 {}", n)).collect(),
        ingredients: vec![NewIngredient {
            name: "계란".to_string(),
            quantity: Some("3".to_string()),
        }],
    }
}
