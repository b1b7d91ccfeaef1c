//! Generic add/lookup/subscribe protocol against the lab store.

#![allow(missing_docs)]

#[macro_use]
mod common;

use gcs_tables::lab::MemoryStore;
use gcs_tables::types::{ActorTableData, ConfigTableData, FunctionTableData};
use gcs_tables::{ActorId, ClassId, ClientId, ConfigId, FunctionId, JobId, UniqueId};
use parking_lot::Mutex;
use std::sync::Arc;

fn init_test(name: &str) {
    common::init_test_logging();
    test_phase!(name);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Installed,
    Data(ActorId, ActorTableData),
}

fn actor(seed: u8) -> (ActorId, ActorTableData) {
    let id = ActorId::from_bytes([seed; 20]);
    (
        id,
        ActorTableData {
            actor_id: id,
            class_id: ClassId::from_bytes([seed.wrapping_add(1); 20]),
            job_id: JobId::from_bytes([7; 20]),
            node_manager_id: ClientId::from_bytes([seed.wrapping_add(2); 20]),
        },
    )
}

#[test]
fn add_then_lookup_returns_the_same_record() {
    init_test("add_then_lookup_returns_the_same_record");
    let store = MemoryStore::new();
    let client = common::process(&store, 1);
    let table = client.function_table();
    let id = FunctionId::from_bytes([3; 20]);
    let record = FunctionTableData {
        job_id: JobId::from_bytes([1; 20]),
        module: "numpy.linalg".to_string(),
        name: "svd".to_string(),
        data: vec![0, 1, 2, 3],
    };

    let added = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&added);
    table
        .add(JobId::nil(), id, record.clone(), move |id, r| {
            *sink.lock() = Some((id, r));
        })
        .expect("add");
    store.run_until_idle();
    assert_with_log!(
        added.lock().is_some(),
        "add callback fired",
        true,
        added.lock().is_some()
    );

    let looked_up = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&looked_up);
    table
        .lookup(JobId::nil(), id, move |_, r| *sink.lock() = Some(r))
        .expect("lookup");
    store.run_until_idle();

    let got = looked_up.lock().clone();
    assert_with_log!(
        got == Some(Some(record.clone())),
        "lookup equals add",
        Some(Some(record.clone())),
        got
    );
    assert!(client.registry().is_empty());
    test_complete!("add_then_lookup_returns_the_same_record");
}

#[test]
fn lookup_of_missing_row_reports_none() {
    init_test("lookup_of_missing_row_reports_none");
    let store = MemoryStore::new();
    let client = common::process(&store, 2);
    let result = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&result);
    client
        .config_table()
        .lookup(JobId::nil(), ConfigId::from_bytes([9; 20]), move |id, r| {
            *sink.lock() = Some((id, r));
        })
        .expect("lookup");
    store.run_until_idle();
    assert_eq!(
        *result.lock(),
        Some((ConfigId::from_bytes([9; 20]), None::<ConfigTableData>))
    );
    test_complete!("lookup_of_missing_row_reports_none");
}

#[test]
fn installation_precedes_data_even_when_writes_race() {
    init_test("installation_precedes_data_even_when_writes_race");
    let store = MemoryStore::new();
    let writer = common::process(&store, 3);
    let reader = common::process(&store, 4);
    let events = Arc::new(Mutex::new(Vec::new()));

    test_section!("write queued before subscription");
    let (first_id, first) = actor(10);
    writer
        .actor_table()
        .add(JobId::nil(), first_id, first, |_, _| {})
        .expect("add");

    let on_event = Arc::clone(&events);
    let on_installed = Arc::clone(&events);
    reader
        .actor_table()
        .subscribe(
            JobId::nil(),
            UniqueId::nil(),
            move |id, record| on_event.lock().push(Event::Data(id, record)),
            move |_| on_installed.lock().push(Event::Installed),
        )
        .expect("subscribe");

    test_section!("writes after subscription");
    let (second_id, second) = actor(20);
    let (third_id, third) = actor(30);
    writer
        .actor_table()
        .add(JobId::nil(), second_id, second.clone(), |_, _| {})
        .expect("add");
    writer
        .actor_table()
        .add(JobId::nil(), third_id, third.clone(), |_, _| {})
        .expect("add");
    store.run_until_idle();

    let got = events.lock().clone();
    let expected = vec![
        Event::Installed,
        Event::Data(second_id, second),
        Event::Data(third_id, third),
    ];
    assert_with_log!(got == expected, "event order", expected, got);
    test_complete!("installation_precedes_data_even_when_writes_race");
}

#[test]
fn filtered_subscription_sees_only_its_row() {
    init_test("filtered_subscription_sees_only_its_row");
    let store = MemoryStore::new();
    let client = common::process(&store, 5);
    let (watched_id, watched) = actor(1);
    let (other_id, other) = actor(2);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    client
        .actor_table()
        .subscribe(
            JobId::nil(),
            watched_id.unique(),
            move |id, _| sink.lock().push(id),
            |filter| assert!(!filter.is_nil()),
        )
        .expect("subscribe");
    store.run_until_idle();

    let table = client.actor_table();
    table.add(JobId::nil(), other_id, other, |_, _| {}).expect("add");
    table
        .add(JobId::nil(), watched_id, watched, |_, _| {})
        .expect("add");
    store.run_until_idle();

    assert_eq!(*seen.lock(), vec![watched_id]);
    test_complete!("filtered_subscription_sees_only_its_row");
}

#[test]
fn non_publishing_tables_notify_nobody() {
    init_test("non_publishing_tables_notify_nobody");
    let store = MemoryStore::new();
    let client = common::process(&store, 6);
    let table = client.config_table();
    let seen = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&seen);
    table
        .subscribe(JobId::nil(), UniqueId::nil(), move |_, _| *sink.lock() += 1, |_| {})
        .expect("subscribe");
    table
        .add(
            JobId::nil(),
            ConfigId::from_bytes([1; 20]),
            ConfigTableData {
                key: "k".to_string(),
                value: Vec::new(),
            },
            |_, _| {},
        )
        .expect("add");
    store.run_until_idle();
    assert_eq!(*seen.lock(), 0);
    test_complete!("non_publishing_tables_notify_nobody");
}
