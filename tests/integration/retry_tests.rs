/*!
 * Integration tests for retry accounting, exhaustion and lease recovery
 */

use chrono::{Duration, Utc};
use std::sync::Arc;

use cookloc::Trigger;
use cookloc::database::models::{EntityType, EventStatus, format_timestamp};
use cookloc::database::repository::{EventRef, Lease};
use cookloc::events::tracker::LEASE_EXPIRED_ERROR;
use cookloc::translator::MockTranslator;

use crate::common::{TestDb, kimchi_stew, test_worker_config};

#[tokio::test]
async fn test_run_withPersistentFailure_shouldStopAtRetryCap() {
    let db = TestDb::in_memory().unwrap();
    let post_id = db.store.insert_log_post("제목", "본문").await.unwrap();
    let event = db.enqueue(EntityType::LogPost, post_id, &["en"]).await.unwrap();

    let translator = Arc::new(MockTranslator::new());
    translator.fail_locale("en");
    let runner = db.runner(&translator, &test_worker_config());

    for attempt in 1..=3u32 {
        let summary = runner.run(Trigger::Scheduled { limit: None }).await.unwrap();
        assert_eq!(summary.claimed, 1);
        let reloaded = db.reload(&event).await.unwrap();
        assert_eq!(reloaded.status, EventStatus::Failed);
        assert_eq!(reloaded.retry_count, attempt);
        if attempt == 3 {
            assert_eq!(summary.exhausted, 1);
        } else {
            assert_eq!(summary.failed, 1);
        }
    }

    // Exhausted events are inert
    let summary = runner.run(Trigger::Scheduled { limit: None }).await.unwrap();
    assert_eq!(summary.claimed, 0);
    let summary = runner
        .run(Trigger::Explicit(vec![EventRef::Id(event.id)]))
        .await
        .unwrap();
    assert_eq!(summary.claimed, 0);
    assert_eq!(translator.call_count(), 3);

    let exhausted = db.reload(&event).await.unwrap();
    assert_eq!(exhausted.status, EventStatus::Failed);
    assert!(exhausted.is_exhausted(3));
}

#[tokio::test]
async fn test_run_withMissingEntity_shouldExhaustImmediately() {
    let db = TestDb::in_memory().unwrap();
    let event = db.enqueue(EntityType::Recipe, 404, &["en"]).await.unwrap();

    let translator = Arc::new(MockTranslator::new());
    let summary = db
        .runner(&translator, &test_worker_config())
        .run(Trigger::Scheduled { limit: None })
        .await
        .unwrap();

    assert_eq!(summary.exhausted, 1);
    assert_eq!(translator.call_count(), 0);
    let failed = db.reload(&event).await.unwrap();
    assert_eq!(failed.retry_count, 3);
    assert_eq!(failed.last_error.as_deref(), Some("recipe 404 not found"));
}

#[tokio::test]
async fn test_completedLocales_acrossRounds_shouldOnlyGrow() {
    let db = TestDb::in_memory().unwrap();
    let recipe_id = db.store.insert_recipe(&kimchi_stew()).await.unwrap();
    let event = db
        .enqueue(EntityType::Recipe, recipe_id, &["en", "ja", "zh-CN"])
        .await
        .unwrap();

    let translator = Arc::new(MockTranslator::new());
    translator.fail_locale("ja").fail_locale("zh-CN");
    let runner = db.runner(&translator, &test_worker_config());

    runner.run(Trigger::Scheduled { limit: None }).await.unwrap();
    let first = db.reload(&event).await.unwrap().completed_locales;
    assert_eq!(first, vec!["en"]);

    // en now fails too, but it is never asked for again
    translator.fail_locale("en").heal_locale("zh-CN");
    runner.run(Trigger::Scheduled { limit: None }).await.unwrap();
    let second = db.reload(&event).await.unwrap().completed_locales;
    assert_eq!(second, vec!["en", "zh-CN"]);
    assert!(first.iter().all(|l| second.contains(l)));

    translator.heal_locale("ja");
    runner.run(Trigger::Scheduled { limit: None }).await.unwrap();
    let done = db.reload(&event).await.unwrap();
    assert_eq!(done.status, EventStatus::Completed);
    assert_eq!(done.completed_locales, vec!["en", "ja", "zh-CN"]);
    assert_eq!(
        translator.called_locales(),
        vec!["en", "ja", "zh-CN", "ja", "zh-CN", "ja"]
    );
}

#[tokio::test]
async fn test_sweep_withExpiredLease_shouldReturnEventToRetryPool() {
    let db = TestDb::in_memory().unwrap();
    let post_id = db.store.insert_log_post("제목", "본문").await.unwrap();
    let event = db.enqueue(EntityType::LogPost, post_id, &["en"]).await.unwrap();

    // A worker that claimed the event and died
    let stale = Lease {
        token: "dead-worker".to_string(),
        expires_at: format_timestamp(Utc::now() - Duration::minutes(1)),
    };
    let claimed = db.repo.claim_eligible(10, 3, &stale).await.unwrap();
    assert_eq!(claimed.len(), 1);
    // Claimed rows are invisible to other fetchers until swept
    let fresh = Lease {
        token: "other-worker".to_string(),
        expires_at: format_timestamp(Utc::now() + Duration::minutes(15)),
    };
    assert!(db.repo.claim_eligible(10, 3, &fresh).await.unwrap().is_empty());

    let translator = Arc::new(MockTranslator::new());
    let summary = db
        .runner(&translator, &test_worker_config())
        .run(Trigger::Scheduled { limit: None })
        .await
        .unwrap();

    assert_eq!(summary.swept, 1);
    assert_eq!(summary.claimed, 1);
    assert_eq!(summary.completed, 1);
    let done = db.reload(&event).await.unwrap();
    assert_eq!(done.status, EventStatus::Completed);
    assert_eq!(done.retry_count, 1);
    assert_eq!(done.last_error.as_deref(), Some(LEASE_EXPIRED_ERROR));

    // The dead worker's late writes are ignored
    assert!(!db.repo.mark_completed(event.id, "dead-worker").await.unwrap());
}

#[tokio::test]
async fn test_requeue_withExhaustedEvent_shouldResetRetryBudget() {
    let db = TestDb::in_memory().unwrap();
    let post_id = db.store.insert_log_post("제목", "본문").await.unwrap();
    let event = db.enqueue(EntityType::LogPost, post_id, &["en"]).await.unwrap();

    let translator = Arc::new(MockTranslator::new());
    translator.fail_locale("en");
    let runner = db.runner(&translator, &test_worker_config());
    for _ in 0..3 {
        runner.run(Trigger::Scheduled { limit: None }).await.unwrap();
    }

    let stats = db.repo.queue_stats(3).await.unwrap();
    assert_eq!(stats.exhausted, 1);
    assert_eq!(stats.total(), 1);
    let exhausted = db.repo.list_exhausted(3).await.unwrap();
    assert_eq!(exhausted.len(), 1);
    assert_eq!(exhausted[0].public_id, event.public_id);

    assert!(db.repo.requeue(&EventRef::PublicId(event.public_id.clone())).await.unwrap());
    let requeued = db.reload(&event).await.unwrap();
    assert_eq!(requeued.status, EventStatus::Pending);
    assert_eq!(requeued.retry_count, 0);
    assert!(requeued.last_error.is_none());

    translator.heal_locale("en");
    let summary = runner.run(Trigger::Scheduled { limit: None }).await.unwrap();
    assert_eq!(summary.completed, 1);

    // Completed events cannot be requeued
    assert!(!db.repo.requeue(&EventRef::Id(event.id)).await.unwrap());
}

#[tokio::test]
async fn test_fail_withLongError_shouldTruncateLastError() {
    let db = TestDb::in_memory().unwrap();
    let post_id = db.store.insert_log_post("제목", "본문").await.unwrap();
    let event = db.enqueue(EntityType::LogPost, post_id, &["en"]).await.unwrap();

    let mut config = test_worker_config();
    config.last_error_max_len = 12;
    let translator = Arc::new(MockTranslator::new());
    translator.fail_locale("en");
    db.runner(&translator, &config)
        .run(Trigger::Scheduled { limit: None })
        .await
        .unwrap();

    let failed = db.reload(&event).await.unwrap();
    assert_eq!(failed.last_error.unwrap().chars().count(), 12);
}
