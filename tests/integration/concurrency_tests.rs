/*!
 * Integration tests for concurrent workers.
 *
 * Each worker gets its own SQLite connection to the same file, the way two
 * worker processes would.
 */

use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

use cookloc::Trigger;
use cookloc::database::models::{EntityType, EventStatus};
use cookloc::events::EventFetcher;
use cookloc::translator::MockTranslator;
use cookloc::DatabaseConnection;

use crate::common::{TestDb, init_logger, test_worker_config};

fn two_workers(dir: &TempDir) -> (TestDb, TestDb) {
    init_logger();
    let path = dir.path().join("cookloc.db");
    let first = DatabaseConnection::new(&path).unwrap();
    let second = DatabaseConnection::new(&path).unwrap();
    (TestDb::over(first), TestDb::over(second))
}

async fn seed_posts(db: &TestDb, count: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let post_id = db
            .store
            .insert_log_post(&format!("제목 {}", i), "본문")
            .await
            .unwrap();
        ids.push(db.enqueue(EntityType::LogPost, post_id, &["en"]).await.unwrap().id);
    }
    ids
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claim_fromTwoConnections_shouldNeverOverlap() {
    let dir = TempDir::new().unwrap();
    let (a, b) = two_workers(&dir);
    let seeded = seed_posts(&a, 12).await;

    let config = test_worker_config();
    let fetcher_a = EventFetcher::new(a.repo.clone(), &config);
    let fetcher_b = EventFetcher::new(b.repo.clone(), &config);

    let mut seen = HashSet::new();
    loop {
        let (batch_a, batch_b) = tokio::join!(fetcher_a.fetch_eligible(5), fetcher_b.fetch_eligible(5));
        let (batch_a, batch_b) = (batch_a.unwrap(), batch_b.unwrap());
        if batch_a.is_empty() && batch_b.is_empty() {
            break;
        }
        for event in batch_a.events.iter().chain(batch_b.events.iter()) {
            assert!(seen.insert(event.id), "event {} claimed twice", event.id);
            assert_eq!(event.status, EventStatus::Processing);
        }
    }

    assert_eq!(seen, seeded.into_iter().collect::<HashSet<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_run_withTwoRunners_shouldTranslateEachEventOnce() {
    let dir = TempDir::new().unwrap();
    let (a, b) = two_workers(&dir);
    let seeded = seed_posts(&a, 8).await;

    let config = test_worker_config();
    let translator = Arc::new(MockTranslator::new());
    let runner_a = a.runner(&translator, &config);
    let runner_b = b.runner(&translator, &config);

    let (summary_a, summary_b) = tokio::join!(
        runner_a.run(Trigger::Scheduled { limit: Some(5) }),
        runner_b.run(Trigger::Scheduled { limit: Some(5) })
    );
    let (summary_a, summary_b) = (summary_a.unwrap(), summary_b.unwrap());

    assert_eq!(summary_a.claimed + summary_b.claimed, 8);
    assert_eq!(summary_a.completed + summary_b.completed, 8);
    assert_eq!(translator.call_count(), 8);

    for id in seeded {
        let event = b.repo.get_event(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Completed);
        assert_eq!(event.completed_locales, vec!["en"]);
    }
}
