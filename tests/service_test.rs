//! Batch orchestration tests against a mocked store

mod common;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use mockall::{mock, predicate, Sequence};

use common::{posts, FakeSource, TopCall};
use subharvest::models::{Comment, Community, CrossPost, IncompleteCommunity, Submission};
use subharvest::{BatchPolicy, CollectorSettings, HarvestService, HarvestStore};

mock! {
    pub Store {}

    impl HarvestStore for Store {
        fn upsert_community(&self, community: &Community) -> Result<()>;
        fn upsert_submissions(&self, submissions: &[Submission]) -> Result<usize>;
        fn upsert_comments(&self, comments: &[Comment]) -> Result<usize>;
        fn upsert_crossposts(&self, crossposts: &[CrossPost]) -> Result<usize>;
        fn query_unexplored_community_names(&self) -> Result<BTreeSet<String>>;
        fn query_incomplete_communities(&self, min_submissions: usize) -> Result<Vec<IncompleteCommunity>>;
    }
}

fn settings() -> CollectorSettings {
    CollectorSettings {
        submissions_limit: 3,
        ..CollectorSettings::default()
    }
}

fn source() -> FakeSource {
    FakeSource::new()
        .with_listing("alpha", posts("a", "alpha", 5))
        .with_listing("beta", posts("b", "beta", 5))
}

/// Accept any number of saves
fn accept_saves(store: &mut MockStore) {
    store.expect_upsert_community().returning(|_| Ok(()));
    store.expect_upsert_submissions().returning(|s| Ok(s.len()));
    store.expect_upsert_comments().returning(|c| Ok(c.len()));
    store.expect_upsert_crossposts().returning(|c| Ok(c.len()));
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|name| (*name).to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_saves_each_harvest_in_order() {
    let mut store = MockStore::new();
    let mut seq = Sequence::new();
    store
        .expect_upsert_community()
        .withf(|community| community.name == "alpha")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    store
        .expect_upsert_submissions()
        .withf(|submissions| submissions.len() == 3 && submissions.iter().all(|s| s.from_listing))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|s| Ok(s.len()));
    store
        .expect_upsert_comments()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|c| Ok(c.len()));
    store
        .expect_upsert_crossposts()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|c| Ok(c.len()));

    let service = HarvestService::new(source(), store, settings(), BatchPolicy::Continue);
    let report = service
        .collect_communities(Some(vec!["r/alpha".to_string(), "alpha".to_string()]))
        .await
        .expect("Batch failed");

    assert_eq!(report.collected, vec!["alpha".to_string()]);
    assert!(report.failures.is_empty());
    assert_eq!(report.attempted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_name_rejects_batch() {
    let store = MockStore::new();
    let service = HarvestService::new(source(), store, settings(), BatchPolicy::Continue);

    let result = service
        .collect_communities(Some(vec!["alpha".to_string(), "bad name!".to_string()]))
        .await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_continue_isolates_failures() {
    let mut store = MockStore::new();
    accept_saves(&mut store);

    let service = HarvestService::new(source(), store, settings(), BatchPolicy::Continue);
    let report = service
        .collect_communities(Some(vec!["missing".to_string(), "beta".to_string()]))
        .await
        .expect("Batch failed");

    assert_eq!(report.collected, vec!["beta".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].community, "missing");
    assert!(!report.halted);
}

#[tokio::test(start_paused = true)]
async fn test_halt_stops_at_first_failure() {
    let store = MockStore::new();

    let service = HarvestService::new(source(), store, settings(), BatchPolicy::Halt);
    let report = service
        .collect_communities(Some(vec!["missing".to_string(), "beta".to_string()]))
        .await
        .expect("Batch failed");

    assert!(report.halted);
    assert!(report.collected.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.attempted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_counts_as_community_failure() {
    let mut store = MockStore::new();
    store
        .expect_upsert_community()
        .returning(|_| Err(anyhow::anyhow!("disk full")));

    let service = HarvestService::new(source(), store, settings(), BatchPolicy::Continue);
    let report = service
        .collect_communities(Some(vec!["alpha".to_string()]))
        .await
        .expect("Batch failed");

    assert_eq!(report.failures.len(), 1);
    let message = format!("{:#}", report.failures[0].error);
    assert!(message.contains("alpha"));
    assert!(message.contains("disk full"));
}

#[tokio::test(start_paused = true)]
async fn test_frontier_used_when_no_names_given() {
    let mut store = MockStore::new();
    store
        .expect_query_unexplored_community_names()
        .times(1)
        .returning(|| Ok(names(&["alpha", "u_someone"])));
    accept_saves(&mut store);

    let service = HarvestService::new(source(), store, settings(), BatchPolicy::Continue);
    let report = service.collect_communities(None).await.expect("Batch failed");

    assert_eq!(report.collected, vec!["alpha".to_string()]);
    assert_eq!(report.attempted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_complete_collection_resumes_from_cursor() {
    let mut store = MockStore::new();
    store
        .expect_query_incomplete_communities()
        .with(predicate::eq(3))
        .times(1)
        .returning(|_| {
            Ok(vec![
                IncompleteCommunity {
                    name: "alpha".to_string(),
                    last_submission_id: "a0001".to_string(),
                    offset: 2,
                },
                IncompleteCommunity {
                    name: "beta".to_string(),
                    last_submission_id: "b0002".to_string(),
                    offset: 3,
                },
            ])
        });
    accept_saves(&mut store);

    let service = HarvestService::new(source(), store, settings(), BatchPolicy::Continue);
    let report = service.complete_collection(3).await.expect("Batch failed");

    assert_eq!(report.collected, vec!["alpha".to_string()]);
    assert_eq!(report.skipped, vec!["beta".to_string()]);
    assert!(report.failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_complete_collection_requests_remainder() {
    let source = FakeSource::new().with_listing("alpha", posts("a", "alpha", 5));
    let calls = source.call_log();

    let mut store = MockStore::new();
    store.expect_query_incomplete_communities().returning(|_| {
        Ok(vec![IncompleteCommunity {
            name: "alpha".to_string(),
            last_submission_id: "a0001".to_string(),
            offset: 2,
        }])
    });
    store.expect_upsert_community().returning(|_| Ok(()));
    store
        .expect_upsert_submissions()
        .withf(|submissions| submissions.len() == 1 && submissions[0].id == "a0002")
        .times(1)
        .returning(|s| Ok(s.len()));
    store.expect_upsert_comments().returning(|c| Ok(c.len()));
    store.expect_upsert_crossposts().returning(|c| Ok(c.len()));

    let service = HarvestService::new(source, store, settings(), BatchPolicy::Continue);
    let report = service.complete_collection(3).await.expect("Batch failed");

    assert_eq!(report.collected, vec!["alpha".to_string()]);
    assert_eq!(
        *calls.lock().expect("calls lock"),
        vec![TopCall {
            community: "alpha".to_string(),
            after: Some("a0001".to_string()),
            limit: 1,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_complete_collection_targets_min_submissions_over_limit() {
    let source = FakeSource::new().with_listing("alpha", posts("a", "alpha", 12));
    let calls = source.call_log();

    let mut store = MockStore::new();
    store
        .expect_query_incomplete_communities()
        .with(predicate::eq(10))
        .times(1)
        .returning(|_| {
            Ok(vec![IncompleteCommunity {
                name: "alpha".to_string(),
                last_submission_id: "a0004".to_string(),
                offset: 5,
            }])
        });
    store.expect_upsert_community().returning(|_| Ok(()));
    store
        .expect_upsert_submissions()
        .withf(|submissions| {
            let ids: Vec<&str> = submissions.iter().map(|s| s.id.as_str()).collect();
            ids == ["a0005", "a0006", "a0007", "a0008", "a0009"]
        })
        .times(1)
        .returning(|s| Ok(s.len()));
    store.expect_upsert_comments().returning(|c| Ok(c.len()));
    store.expect_upsert_crossposts().returning(|c| Ok(c.len()));

    // The configured limit of 3 is below both the offset and the minimum
    let service = HarvestService::new(source, store, settings(), BatchPolicy::Continue);
    let report = service.complete_collection(10).await.expect("Batch failed");

    assert_eq!(report.collected, vec!["alpha".to_string()]);
    assert!(report.skipped.is_empty());
    assert_eq!(
        *calls.lock().expect("calls lock"),
        vec![TopCall {
            community: "alpha".to_string(),
            after: Some("a0004".to_string()),
            limit: 5,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_explore_follows_new_communities_once() {
    let mut store = MockStore::new();
    let round = AtomicUsize::new(0);
    store.expect_query_unexplored_community_names().returning(move || {
        let frontier = match round.fetch_add(1, Ordering::SeqCst) {
            0 => names(&["alpha"]),
            1 => names(&["alpha", "beta", "missing"]),
            _ => names(&["missing"]),
        };
        Ok(frontier)
    });
    accept_saves(&mut store);

    let service = HarvestService::new(source(), store, settings(), BatchPolicy::Continue);
    let report = service.explore(5).await.expect("Exploration failed");

    assert_eq!(report.collected, vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].community, "missing");
    assert_eq!(report.attempted(), 3);
}
