/*!
 * Integration tests for the event pipeline.
 *
 * Each test seeds content in an in-memory database, queues an event and
 * drives a batch runner with a scripted translator.
 */

use std::sync::Arc;

use cookloc::Trigger;
use cookloc::app_config::WorkerConfig;
use cookloc::content::ContentHint;
use cookloc::database::models::{EntityType, EventStatus};
use cookloc::database::repository::EventRef;
use cookloc::events::{EventFetcher, EventProcessor, StatusTracker};
use cookloc::translator::MockTranslator;

use crate::common::{TestDb, kimchi_stew, recipe_with_steps, test_worker_config};

#[tokio::test]
async fn test_run_withHealthyTranslator_shouldCompleteEveryLocale() {
    let db = TestDb::in_memory().unwrap();
    let recipe_id = db.store.insert_recipe(&kimchi_stew()).await.unwrap();
    let event = db
        .enqueue(EntityType::Recipe, recipe_id, &["en", "ko", "ja"])
        .await
        .unwrap();
    // Source locale is dropped from the targets
    assert_eq!(event.target_locales, vec!["en", "ja"]);

    let translator = Arc::new(MockTranslator::new());
    let summary = db
        .runner(&translator, &test_worker_config())
        .run(Trigger::Scheduled { limit: None })
        .await
        .unwrap();

    assert_eq!(summary.claimed, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(translator.called_locales(), vec!["en", "ja"]);

    let done = db.reload(&event).await.unwrap();
    assert_eq!(done.status, EventStatus::Completed);
    assert_eq!(done.completed_locales, vec!["en", "ja"]);
    assert_eq!(done.retry_count, 0);
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());
    assert!(done.lease_token.is_none());

    let titles = db
        .store
        .translations_of("recipes", "title_translations", recipe_id)
        .await
        .unwrap();
    assert_eq!(titles["en"], "[en] 김치찌개");
    assert_eq!(titles["ja"], "[ja] 김치찌개");

    let step_ids = db.store.step_ids(recipe_id).await.unwrap();
    let second_step = db
        .store
        .translations_of("recipe_steps", "description_translations", step_ids[1])
        .await
        .unwrap();
    assert_eq!(second_step["ja"], "[ja] 김치와 물을 넣고 끓인다");
}

#[tokio::test]
async fn test_run_shouldSendRecipeBundleWithIndexedKeys() {
    let db = TestDb::in_memory().unwrap();
    let recipe_id = db.store.insert_recipe(&kimchi_stew()).await.unwrap();
    db.enqueue(EntityType::Recipe, recipe_id, &["en"]).await.unwrap();

    let translator = Arc::new(MockTranslator::new());
    db.runner(&translator, &test_worker_config())
        .run(Trigger::Scheduled { limit: None })
        .await
        .unwrap();

    let calls = translator.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].source_locale, "ko");
    assert_eq!(calls[0].hint, ContentHint::Recipe);
    let keys: Vec<&str> = calls[0].fields.keys().map(|k| k.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "description",
            "food_name",
            "ingredient.1",
            "ingredient.2",
            "step.1",
            "step.2",
            "title"
        ]
    );
}

#[tokio::test]
async fn test_run_withOneFailingLocale_shouldKeepPartialProgress() {
    let db = TestDb::in_memory().unwrap();
    let recipe_id = db.store.insert_recipe(&kimchi_stew()).await.unwrap();
    let event = db
        .enqueue(EntityType::Recipe, recipe_id, &["en", "zh-CN", "ja"])
        .await
        .unwrap();

    let translator = Arc::new(MockTranslator::new());
    translator.fail_locale("ja");
    let runner = db.runner(&translator, &test_worker_config());

    let summary = runner.run(Trigger::Scheduled { limit: None }).await.unwrap();
    assert_eq!(summary.failed, 1);

    let failed = db.reload(&event).await.unwrap();
    assert_eq!(failed.status, EventStatus::Failed);
    assert_eq!(failed.completed_locales, vec!["en", "zh-CN"]);
    assert_eq!(failed.retry_count, 1);
    let last_error = failed.last_error.clone().unwrap();
    assert!(last_error.starts_with("ja: "), "unexpected error: {}", last_error);

    // The retry only asks for what is still missing
    translator.heal_locale("ja");
    let summary = runner.run(Trigger::Scheduled { limit: None }).await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(translator.called_locales(), vec!["en", "zh-CN", "ja", "ja"]);

    let done = db.reload(&event).await.unwrap();
    assert_eq!(done.status, EventStatus::Completed);
    assert_eq!(done.completed_locales, vec!["en", "zh-CN", "ja"]);
    assert_eq!(done.started_at, failed.started_at);
}

#[tokio::test]
async fn test_run_withMissingChildKey_shouldFailWithCountMismatch() {
    let db = TestDb::in_memory().unwrap();
    let recipe_id = db.store.insert_recipe(&recipe_with_steps(3)).await.unwrap();
    let event = db
        .enqueue(EntityType::Recipe, recipe_id, &["en"])
        .await
        .unwrap();

    let translator = Arc::new(MockTranslator::new());
    translator.drop_key("en", "step.3");
    db.runner(&translator, &test_worker_config())
        .run(Trigger::Scheduled { limit: None })
        .await
        .unwrap();

    let failed = db.reload(&event).await.unwrap();
    assert_eq!(failed.status, EventStatus::Failed);
    assert!(failed.completed_locales.is_empty());
    assert!(
        failed
            .last_error
            .as_deref()
            .unwrap_or_default()
            .contains("step count mismatch: expected 3, got 2")
    );

    // Nothing of the rejected locale reached storage
    let titles = db
        .store
        .translations_of("recipes", "title_translations", recipe_id)
        .await
        .unwrap();
    assert!(titles.is_empty());
}

#[tokio::test]
async fn test_run_withBlankedTitle_shouldFailWithoutWriting() {
    let db = TestDb::in_memory().unwrap();
    let post_id = db.store.insert_log_post("오늘의 요리", "된장찌개를 끓였다").await.unwrap();
    let event = db.enqueue(EntityType::LogPost, post_id, &["en", "ja"]).await.unwrap();

    let translator = Arc::new(MockTranslator::new());
    translator.blank_key("ja", "content");
    db.runner(&translator, &test_worker_config())
        .run(Trigger::Scheduled { limit: None })
        .await
        .unwrap();

    let failed = db.reload(&event).await.unwrap();
    assert_eq!(failed.completed_locales, vec!["en"]);
    assert!(failed.last_error.unwrap().contains("'content' is empty"));

    let contents = db
        .store
        .translations_of("log_posts", "content_translations", post_id)
        .await
        .unwrap();
    assert_eq!(contents.keys().collect::<Vec<_>>(), vec!["en"]);
    assert_eq!(translator.calls()[0].hint, ContentHint::LogPost);
}

#[tokio::test]
async fn test_run_withHangingTranslator_shouldTimeOutThatLocaleOnly() {
    let db = TestDb::in_memory().unwrap();
    let post_id = db.store.insert_log_post("제목", "본문").await.unwrap();
    let event = db.enqueue(EntityType::LogPost, post_id, &["ja", "en"]).await.unwrap();

    let translator = Arc::new(MockTranslator::new());
    translator.hang_locale("ja");
    let summary = db
        .runner(&translator, &test_worker_config())
        .run(Trigger::Scheduled { limit: None })
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    let failed = db.reload(&event).await.unwrap();
    assert_eq!(failed.completed_locales, vec!["en"]);
    assert!(failed.last_error.unwrap().contains("timed out after 1s"));
}

#[tokio::test]
async fn test_process_withNothingPending_shouldNotCallTranslator() {
    let db = TestDb::in_memory().unwrap();
    let post_id = db.store.insert_log_post("제목", "본문").await.unwrap();
    let mut event = db.enqueue(EntityType::LogPost, post_id, &["en"]).await.unwrap();
    event.completed_locales = vec!["en".to_string()];

    let config = WorkerConfig::default();
    let translator = Arc::new(MockTranslator::new());
    let tracker = StatusTracker::new(db.repo.clone(), &config);
    let processor = EventProcessor::new(
        db.store.clone(),
        translator.clone(),
        tracker,
        config.translate_timeout(),
    );
    let lease = EventFetcher::new(db.repo.clone(), &config).new_lease();

    let report = processor.process(&event, &lease).await.unwrap();

    assert!(report.success());
    assert!(report.attempted.is_empty());
    assert_eq!(translator.call_count(), 0);
}

#[tokio::test]
async fn test_run_withExplicitTrigger_shouldOnlyTouchNamedEvents() {
    let db = TestDb::in_memory().unwrap();
    let first_post = db.store.insert_log_post("하나", "첫 번째").await.unwrap();
    let second_post = db.store.insert_log_post("둘", "두 번째").await.unwrap();
    let first = db.enqueue(EntityType::LogPost, first_post, &["en"]).await.unwrap();
    let second = db.enqueue(EntityType::LogPost, second_post, &["en"]).await.unwrap();

    let translator = Arc::new(MockTranslator::new());
    let runner = db.runner(&translator, &test_worker_config());
    let summary = runner
        .run(Trigger::Explicit(vec![EventRef::PublicId(second.public_id.clone())]))
        .await
        .unwrap();

    assert_eq!(summary.claimed, 1);
    assert_eq!(db.reload(&first).await.unwrap().status, EventStatus::Pending);
    assert_eq!(db.reload(&second).await.unwrap().status, EventStatus::Completed);

    // A completed event named again is skipped
    let summary = runner
        .run(Trigger::Explicit(vec![EventRef::Id(second.id)]))
        .await
        .unwrap();
    assert_eq!(summary.claimed, 0);
    assert_eq!(translator.call_count(), 1);
}

#[tokio::test]
async fn test_run_withSingleStepEvent_shouldWriteOnlyThatStep() {
    let db = TestDb::in_memory().unwrap();
    let recipe_id = db.store.insert_recipe(&kimchi_stew()).await.unwrap();
    let step_ids = db.store.step_ids(recipe_id).await.unwrap();
    let event = db
        .enqueue(EntityType::RecipeStep, step_ids[0], &["en"])
        .await
        .unwrap();

    let translator = Arc::new(MockTranslator::new());
    db.runner(&translator, &test_worker_config())
        .run(Trigger::Scheduled { limit: None })
        .await
        .unwrap();

    assert_eq!(db.reload(&event).await.unwrap().status, EventStatus::Completed);
    let first = db
        .store
        .translations_of("recipe_steps", "description_translations", step_ids[0])
        .await
        .unwrap();
    let second = db
        .store
        .translations_of("recipe_steps", "description_translations", step_ids[1])
        .await
        .unwrap();
    assert_eq!(first["en"], "[en] 돼지고기를 볶는다");
    assert!(second.is_empty());
}

#[tokio::test]
async fn test_run_withScheduledLimit_shouldClaimOldestFirst() {
    let db = TestDb::in_memory().unwrap();
    let mut events = Vec::new();
    for i in 0..3 {
        let post_id = db
            .store
            .insert_log_post(&format!("제목 {}", i), "본문")
            .await
            .unwrap();
        events.push(db.enqueue(EntityType::LogPost, post_id, &["en"]).await.unwrap());
    }

    let translator = Arc::new(MockTranslator::new());
    let summary = db
        .runner(&translator, &test_worker_config())
        .run(Trigger::Scheduled { limit: Some(2) })
        .await
        .unwrap();

    assert_eq!(summary.claimed, 2);
    assert_eq!(db.reload(&events[0]).await.unwrap().status, EventStatus::Completed);
    assert_eq!(db.reload(&events[1]).await.unwrap().status, EventStatus::Completed);
    assert_eq!(db.reload(&events[2]).await.unwrap().status, EventStatus::Pending);
}

#[tokio::test]
async fn test_run_withBlankChildRows_shouldCompleteWithoutTranslatingThem() {
    let db = TestDb::in_memory().unwrap();
    let mut recipe = recipe_with_steps(1);
    recipe.steps.push(String::new());
    recipe.ingredients.push(cookloc::content::store::NewIngredient {
        name: " ".to_string(),
        quantity: None,
    });
    let recipe_id = db.store.insert_recipe(&recipe).await.unwrap();
    let blank_step = db.store.step_ids(recipe_id).await.unwrap()[1];
    let blank_ingredient = db.store.ingredient_ids(recipe_id).await.unwrap()[1];

    let whole = db.enqueue(EntityType::Recipe, recipe_id, &["en"]).await.unwrap();
    let step = db.enqueue(EntityType::RecipeStep, blank_step, &["en"]).await.unwrap();
    let ingredient = db
        .enqueue(EntityType::RecipeIngredient, blank_ingredient, &["en"])
        .await
        .unwrap();

    let translator = Arc::new(MockTranslator::new());
    let summary = db
        .runner(&translator, &test_worker_config())
        .run(Trigger::Scheduled { limit: None })
        .await
        .unwrap();

    assert_eq!(summary.completed, 3);
    // Only the recipe bundle had anything to send
    assert_eq!(translator.call_count(), 1);
    assert!(!translator.calls()[0].fields.contains_key("step.2"));

    for event in [&whole, &step, &ingredient] {
        let done = db.reload(event).await.unwrap();
        assert_eq!(done.status, EventStatus::Completed);
        assert_eq!(done.retry_count, 0);
        assert_eq!(done.completed_locales, vec!["en"]);
    }

    let blank_step_map = db
        .store
        .translations_of("recipe_steps", "description_translations", blank_step)
        .await
        .unwrap();
    assert!(blank_step_map.is_empty());
}
