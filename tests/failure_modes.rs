//! Submission failures and the stale-request policy.

#![allow(missing_docs)]

#[macro_use]
mod common;

use gcs_tables::lab::MemoryStore;
use gcs_tables::types::ErrorTableData;
use gcs_tables::{DispatchOutcome, GcsConfig, JobId, Reply, TaskId, UniqueId};
use gcs_tables::{CallbackRegistry, Dispatch, GcsClient};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn init_test(name: &str) {
    common::init_test_logging();
    test_phase!(name);
}

fn error_record() -> ErrorTableData {
    ErrorTableData {
        job_id: JobId::from_bytes([1; 20]),
        error_type: "task_failed".to_string(),
        error_message: "division by zero".to_string(),
        timestamp_ms: 1_700_000_000_000,
    }
}

fn client_with_timeout(store: &MemoryStore, timeout: Option<Duration>) -> GcsClient {
    let mut config = GcsConfig::default();
    config.pending_request_timeout = timeout;
    let registry = Arc::new(CallbackRegistry::new());
    let connection = store.connect(Arc::clone(&registry) as Arc<dyn Dispatch>);
    GcsClient::with_client_id(config, registry, Arc::new(connection), common::client_id(1))
        .expect("client")
}

#[test]
fn rejected_submission_never_calls_back() {
    init_test("rejected_submission_never_calls_back");
    let store = MemoryStore::new();
    let client = common::process(&store, 1);
    let calls = Arc::new(AtomicUsize::new(0));
    store.reject_submissions(true);

    let counter = Arc::clone(&calls);
    let err = client
        .error_table()
        .add(JobId::nil(), TaskId::from_bytes([1; 20]), error_record(), move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect_err("rejected");
    assert!(err.is_submission());
    let err = client
        .object_table()
        .subscribe_to_notifications(JobId::nil(), true, |_, _| {}, || {})
        .expect_err("rejected");
    assert!(err.is_submission());
    assert!(!client.object_table().is_subscribed_to_notifications());

    store.reject_submissions(false);
    store.run_until_idle();
    assert_with_log!(
        client.registry().is_empty(),
        "no leaked entries",
        0,
        client.registry().len()
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    test_complete!("rejected_submission_never_calls_back");
}

#[test]
fn unanswered_requests_expire_under_policy() {
    init_test("unanswered_requests_expire_under_policy");
    let store = MemoryStore::new();
    let client = client_with_timeout(&store, Some(Duration::from_secs(5)));
    let calls = Arc::new(AtomicUsize::new(0));
    store.hold_replies(true);

    let counter = Arc::clone(&calls);
    client
        .error_table()
        .lookup(JobId::nil(), TaskId::from_bytes([2; 20]), move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("lookup");
    client
        .actor_table()
        .subscribe(JobId::nil(), UniqueId::nil(), |_, _| {}, |_| {})
        .expect("subscribe");
    assert_eq!(client.registry().pending_one_shot(), 1);

    test_section!("not yet stale");
    assert!(client.expire_stale_requests(Instant::now()).is_empty());

    test_section!("stale");
    let expired = client.expire_stale_requests(Instant::now() + Duration::from_secs(6));
    assert_with_log!(expired.len() == 1, "one request expired", 1, expired.len());
    assert_eq!(client.registry().pending_one_shot(), 0);
    assert_eq!(client.registry().subscriptions(), 1, "subscriptions never expire");

    test_section!("late reply is dropped");
    let outcome = client.registry().dispatch(expired[0], Reply::Value(None));
    assert_eq!(outcome, DispatchOutcome::Unknown);
    store.hold_replies(false);
    store.run_until_idle();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    test_complete!("unanswered_requests_expire_under_policy");
}

#[test]
fn without_policy_requests_stay_pending() {
    init_test("without_policy_requests_stay_pending");
    let store = MemoryStore::new();
    let client = client_with_timeout(&store, None);
    store.hold_replies(true);
    client
        .error_table()
        .lookup(JobId::nil(), TaskId::nil(), |_, _| {})
        .expect("lookup");

    let far_future = Instant::now() + Duration::from_secs(3_600);
    assert!(client.expire_stale_requests(far_future).is_empty());
    assert_eq!(client.registry().pending_one_shot(), 1);

    store.hold_replies(false);
    store.run_until_idle();
    assert!(client.registry().is_empty());
    test_complete!("without_policy_requests_stay_pending");
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    init_test("invalid_config_is_rejected_at_construction");
    let store = MemoryStore::new();
    let err = store
        .connect_client(GcsConfig::new("localhost:80", 1))
        .expect_err("not an IP address");
    assert_eq!(err.kind(), gcs_tables::ErrorKind::Config);
    test_complete!("invalid_config_is_rejected_at_construction");
}
