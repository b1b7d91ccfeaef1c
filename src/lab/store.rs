//! In-memory backing store.
//!
//! Commands execute atomically inside `submit` under the store lock, which
//! is what makes test-and-update a real compare-and-set across simulated
//! processes. Replies and publications are queued per connection and only
//! dispatched by [`MemoryStore::step`] / [`MemoryStore::run_until_idle`],
//! never from inside `submit`.
//!
//! Publication routing per channel:
//!
//! | channel    | delivered to subscriptions whose filter is                 |
//! |------------|------------------------------------------------------------|
//! | `Task`     | nil, or the record's scheduler ID                          |
//! | `Object`   | nil, the object ID, or a client that requested the object  |
//! | `Client`   | nil, or the row ID                                         |
//! | `Actor`    | nil, or the row ID                                         |
//! | `NoPublish`| nobody                                                     |

use crate::callback::{CallbackHandle, CallbackRegistry, Dispatch};
use crate::client::GcsClient;
use crate::codec::Record;
use crate::config::GcsConfig;
use crate::error::{Error, Result};
use crate::store::{Command, CommandKind, Reply, StoreClient, Subscription};
use crate::tracing_compat::{debug, error, trace};
use crate::types::{
    TablePrefix, TablePubsub, TaskTableData, TaskTableTestAndUpdate, TestAndUpdateReply, UniqueId,
};
use crate::util::{DetEntropy, EntropySource, OsEntropy};
use core::fmt;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

type ConnectionId = usize;

struct Subscriber {
    connection: ConnectionId,
    filter: UniqueId,
    channel: TablePubsub,
    handle: CallbackHandle,
}

struct Delivery {
    connection: ConnectionId,
    handle: CallbackHandle,
    reply: Reply,
}

/// A pending object notification: which client on which connection asked.
#[derive(Clone, Copy, PartialEq, Eq)]
struct Requester {
    connection: ConnectionId,
    client: UniqueId,
}

#[derive(Default)]
struct StoreState {
    rows: BTreeMap<(TablePrefix, UniqueId), Vec<u8>>,
    subscribers: Vec<Subscriber>,
    notification_requests: BTreeMap<UniqueId, Vec<Requester>>,
    connections: Vec<Arc<dyn Dispatch>>,
    queue: VecDeque<Delivery>,
    reject_submissions: bool,
    hold_replies: bool,
    commands: u64,
}

impl StoreState {
    fn reply(&mut self, connection: ConnectionId, handle: Option<CallbackHandle>, reply: Reply) {
        if let Some(handle) = handle {
            self.queue.push_back(Delivery {
                connection,
                handle,
                reply,
            });
        }
    }

    fn execute(&mut self, connection: ConnectionId, command: Command) {
        self.commands += 1;
        match command.kind {
            CommandKind::Write => {
                self.rows
                    .insert((command.prefix, command.id), command.payload.clone());
                let requesters = if command.channel == TablePubsub::Object {
                    self.notification_requests
                        .remove(&command.id)
                        .unwrap_or_default()
                } else {
                    Vec::new()
                };
                self.publish(command.channel, command.id, &command.payload, &requesters);
                self.reply(connection, command.handle, Reply::Ack);
            }
            CommandKind::Read => {
                let value = self.rows.get(&(command.prefix, command.id)).cloned();
                self.reply(connection, command.handle, Reply::Value(value));
            }
            CommandKind::ConditionalUpdate => {
                let value = self.test_and_update(&command);
                self.reply(connection, command.handle, Reply::Value(value));
            }
            CommandKind::RequestNotifications => {
                self.request_notification(connection, &command);
            }
        }
    }

    fn test_and_update(&mut self, command: &Command) -> Option<Vec<u8>> {
        let request = match TaskTableTestAndUpdate::decode(&command.payload) {
            Ok(request) => request,
            Err(err) => {
                error!(task = %command.id, error = %err, "malformed test-and-update request");
                return None;
            }
        };
        let key = (command.prefix, command.id);
        let current = match self.rows.get(&key).map(|bytes| TaskTableData::decode(bytes)) {
            None => None,
            Some(Ok(task)) => Some(task),
            Some(Err(err)) => {
                error!(task = %command.id, error = %err, "stored task record is corrupt");
                return None;
            }
        };

        let reply = match current {
            Some(mut task) if task.scheduling_state.intersects(request.test_state_bitmask) => {
                task.scheduling_state = request.update_state;
                task.scheduler_id = request.scheduler_id;
                let bytes = task.encode().ok()?;
                self.rows.insert(key, bytes.clone());
                self.publish(command.channel, command.id, &bytes, &[]);
                TestAndUpdateReply {
                    task: Some(task),
                    updated: true,
                }
            }
            task => TestAndUpdateReply {
                task,
                updated: false,
            },
        };
        trace!(task = %command.id, updated = reply.updated, "test-and-update executed");
        reply.encode().ok()
    }

    fn request_notification(&mut self, connection: ConnectionId, command: &Command) {
        let Some(client) = UniqueId::from_slice(&command.payload) else {
            error!(object = %command.id, "notification request without a requester ID");
            return;
        };
        let requester = Requester { connection, client };

        if let Some(payload) = self.rows.get(&(command.prefix, command.id)).cloned() {
            let targets: Vec<_> = self
                .subscribers
                .iter()
                .filter(|sub| {
                    sub.channel == command.channel
                        && (sub.filter == client
                            || (sub.filter.is_nil() && sub.connection == connection))
                })
                .map(|sub| (sub.connection, sub.handle))
                .collect();
            trace!(object = %command.id, targets = targets.len(), "object already available");
            for (connection, handle) in targets {
                self.queue.push_back(Delivery {
                    connection,
                    handle,
                    reply: Reply::Published {
                        id: command.id,
                        payload: payload.clone(),
                    },
                });
            }
            return;
        }

        let pending = self.notification_requests.entry(command.id).or_default();
        if !pending.contains(&requester) {
            pending.push(requester);
        }
    }

    fn routing_key(channel: TablePubsub, id: UniqueId, payload: &[u8]) -> UniqueId {
        if channel != TablePubsub::Task {
            return id;
        }
        match TaskTableData::decode(payload) {
            Ok(task) => task.scheduler_id.unique(),
            Err(err) => {
                error!(task = %id, error = %err, "cannot route task publication");
                UniqueId::nil()
            }
        }
    }

    fn publish(
        &mut self,
        channel: TablePubsub,
        id: UniqueId,
        payload: &[u8],
        requesters: &[Requester],
    ) {
        if !channel.publishes() {
            return;
        }
        let key = Self::routing_key(channel, id, payload);
        let mut delivered = 0usize;
        for sub in &self.subscribers {
            if sub.channel != channel {
                continue;
            }
            let matched = sub.filter.is_nil()
                || sub.filter == key
                || requesters.iter().any(|r| r.client == sub.filter);
            if matched {
                self.queue.push_back(Delivery {
                    connection: sub.connection,
                    handle: sub.handle,
                    reply: Reply::Published {
                        id,
                        payload: payload.to_vec(),
                    },
                });
                delivered += 1;
            }
        }
        trace!(%channel, %id, delivered, "published");
    }
}

/// In-process backing store shared by simulated processes.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    entropy: Arc<dyn EntropySource>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_entropy(Arc::new(OsEntropy))
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryStore")
            .field("rows", &state.rows.len())
            .field("subscribers", &state.subscribers.len())
            .field("connections", &state.connections.len())
            .field("queued", &state.queue.len())
            .field("entropy", &self.entropy.source_id())
            .finish()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store whose [`connect_client`](Self::connect_client)
    /// mints client IDs from `entropy`, one forked stream per connection.
    #[must_use]
    pub fn with_entropy(entropy: Arc<dyn EntropySource>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            entropy,
        }
    }

    /// Creates an empty store with deterministic client IDs.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::with_entropy(Arc::new(DetEntropy::new(seed)))
    }

    /// Open a connection whose replies are routed through `dispatcher`.
    #[must_use]
    pub fn connect(&self, dispatcher: Arc<dyn Dispatch>) -> MemoryStoreClient {
        let mut state = self.state.lock();
        state.connections.push(dispatcher);
        MemoryStoreClient {
            store: self.clone(),
            connection: state.connections.len() - 1,
        }
    }

    /// Build a [`GcsClient`] on a fresh connection with its own registry.
    pub fn connect_client(&self, config: GcsConfig) -> Result<GcsClient> {
        let registry = Arc::new(CallbackRegistry::new());
        let store = self.connect(Arc::clone(&registry) as Arc<dyn Dispatch>);
        let entropy = self.entropy.fork(store.connection as u64);
        trace!(source = entropy.source_id(), connection = store.connection, "minting client id");
        GcsClient::with_entropy(config, registry, Arc::new(store), entropy.as_ref())
    }

    /// Make every submission fail synchronously (`true`) or succeed again.
    pub fn reject_submissions(&self, reject: bool) {
        self.state.lock().reject_submissions = reject;
    }

    /// Withhold every reply (`true`), modelling a store that never answers.
    /// Queued replies are kept and flow again once released.
    pub fn hold_replies(&self, hold: bool) {
        self.state.lock().hold_replies = hold;
    }

    /// Number of replies and publications waiting for delivery.
    #[must_use]
    pub fn pending_replies(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Number of commands executed so far.
    #[must_use]
    pub fn commands_executed(&self) -> u64 {
        self.state.lock().commands
    }

    /// Raw bytes stored under `id` in `prefix`.
    #[must_use]
    pub fn row(&self, prefix: TablePrefix, id: UniqueId) -> Option<Vec<u8>> {
        self.state.lock().rows.get(&(prefix, id)).cloned()
    }

    /// Deliver the oldest queued reply. Returns `false` if nothing was
    /// delivered.
    pub fn step(&self) -> bool {
        let (dispatcher, delivery) = {
            let mut state = self.state.lock();
            if state.hold_replies {
                return false;
            }
            let Some(delivery) = state.queue.pop_front() else {
                return false;
            };
            (Arc::clone(&state.connections[delivery.connection]), delivery)
        };
        let outcome = dispatcher.dispatch(delivery.handle, delivery.reply);
        trace!(handle = %delivery.handle, ?outcome, "delivered");
        true
    }

    /// Deliver replies until the queue is empty, including replies to
    /// commands submitted by the callbacks themselves. Returns the number
    /// delivered.
    pub fn run_until_idle(&self) -> usize {
        let mut delivered = 0;
        while self.step() {
            delivered += 1;
        }
        delivered
    }
}

/// One process's connection to a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryStoreClient {
    store: MemoryStore,
    connection: ConnectionId,
}

impl MemoryStoreClient {
    fn check_accepting(state: &StoreState) -> Result<()> {
        if state.reject_submissions {
            return Err(Error::submission().with_context("memory store is rejecting submissions"));
        }
        Ok(())
    }
}

impl StoreClient for MemoryStoreClient {
    fn submit(&self, command: Command) -> Result<()> {
        let mut state = self.store.state.lock();
        Self::check_accepting(&state)?;
        debug!(connection = self.connection, command = %command.kind, id = %command.id, "executing");
        state.execute(self.connection, command);
        Ok(())
    }

    fn subscribe(&self, subscription: Subscription) -> Result<()> {
        let mut state = self.store.state.lock();
        Self::check_accepting(&state)?;
        debug!(
            connection = self.connection,
            channel = %subscription.channel,
            filter = %subscription.filter,
            "subscriber added"
        );
        state.subscribers.push(Subscriber {
            connection: self.connection,
            filter: subscription.filter,
            channel: subscription.channel,
            handle: subscription.handle,
        });
        state.reply(
            self.connection,
            Some(subscription.handle),
            Reply::SubscriptionInstalled,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::DispatchOutcome;
    use crate::test_utils::init_test_logging;
    use crate::types::{ClientId, ObjectTableData, SchedulingState};

    /// Collects every reply delivered to a connection.
    #[derive(Default)]
    struct Collector {
        replies: Mutex<Vec<(CallbackHandle, Reply)>>,
    }

    impl Dispatch for Collector {
        fn dispatch(&self, handle: CallbackHandle, reply: Reply) -> DispatchOutcome {
            self.replies.lock().push((handle, reply));
            DispatchOutcome::Delivered
        }
    }

    fn connection(store: &MemoryStore) -> (Arc<Collector>, MemoryStoreClient) {
        let collector = Arc::new(Collector::default());
        let client = store.connect(Arc::clone(&collector) as Arc<dyn Dispatch>);
        (collector, client)
    }

    fn command(kind: CommandKind, prefix: TablePrefix, channel: TablePubsub, id: u8) -> Command {
        Command {
            kind,
            prefix,
            id: UniqueId::from_bytes([id; 20]),
            payload: Vec::new(),
            channel,
            handle: Some(CallbackHandle::new_for_test(u64::from(id))),
        }
    }

    fn task(state: SchedulingState, scheduler: ClientId) -> TaskTableData {
        TaskTableData {
            scheduling_state: state,
            scheduler_id: scheduler,
            execution_dependencies: Vec::new(),
            spillback_count: 0,
            task_info: Vec::new(),
        }
    }

    #[test]
    fn replies_wait_for_the_harness() {
        init_test_logging();
        crate::test_phase!("replies_wait_for_the_harness");
        let store = MemoryStore::new();
        let (collector, client) = connection(&store);

        let mut write = command(CommandKind::Write, TablePrefix::Config, TablePubsub::NoPublish, 1);
        write.payload = vec![1, 2, 3];
        client.submit(write).unwrap();
        assert!(collector.replies.lock().is_empty());
        assert_eq!(store.pending_replies(), 1);

        assert_eq!(store.run_until_idle(), 1);
        assert_eq!(collector.replies.lock()[0].1, Reply::Ack);
        assert_eq!(
            store.row(TablePrefix::Config, UniqueId::from_bytes([1; 20])),
            Some(vec![1, 2, 3])
        );
        crate::test_complete!("replies_wait_for_the_harness");
    }

    #[test]
    fn prefixes_keep_rows_apart() {
        init_test_logging();
        let store = MemoryStore::new();
        let (collector, client) = connection(&store);

        let mut write = command(CommandKind::Write, TablePrefix::Function, TablePubsub::NoPublish, 7);
        write.payload = vec![9];
        client.submit(write).unwrap();
        client
            .submit(command(CommandKind::Read, TablePrefix::Class, TablePubsub::NoPublish, 7))
            .unwrap();
        client
            .submit(command(CommandKind::Read, TablePrefix::Function, TablePubsub::NoPublish, 7))
            .unwrap();
        store.run_until_idle();

        let replies = collector.replies.lock();
        assert_eq!(replies[1].1, Reply::Value(None));
        assert_eq!(replies[2].1, Reply::Value(Some(vec![9])));
    }

    #[test]
    fn subscription_installed_before_publication() {
        init_test_logging();
        let store = MemoryStore::new();
        let (collector, client) = connection(&store);
        let handle = CallbackHandle::new_for_test(100);
        client
            .subscribe(Subscription {
                filter: UniqueId::nil(),
                channel: TablePubsub::Client,
                handle,
            })
            .unwrap();
        let mut write = command(CommandKind::Write, TablePrefix::Client, TablePubsub::Client, 2);
        write.payload = vec![5];
        client.submit(write).unwrap();
        store.run_until_idle();

        let replies = collector.replies.lock();
        assert_eq!(replies[0], (handle, Reply::SubscriptionInstalled));
        assert_eq!(
            replies[1],
            (
                handle,
                Reply::Published {
                    id: UniqueId::from_bytes([2; 20]),
                    payload: vec![5]
                }
            )
        );
        assert_eq!(replies[2].1, Reply::Ack);
    }

    #[test]
    fn task_publications_route_by_scheduler() {
        init_test_logging();
        let store = MemoryStore::new();
        let (collector, client) = connection(&store);
        let mine = ClientId::from_bytes([1; 20]);
        let theirs = ClientId::from_bytes([2; 20]);
        let handle = CallbackHandle::new_for_test(50);
        client
            .subscribe(Subscription {
                filter: mine.unique(),
                channel: TablePubsub::Task,
                handle,
            })
            .unwrap();

        for (id, owner) in [(10, theirs), (11, mine)] {
            let mut write = command(CommandKind::Write, TablePrefix::Task, TablePubsub::Task, id);
            write.handle = None;
            write.payload = task(SchedulingState::WAITING, owner).encode().unwrap();
            client.submit(write).unwrap();
        }
        store.run_until_idle();

        let replies = collector.replies.lock();
        assert_eq!(replies.len(), 2);
        assert!(matches!(
            &replies[1].1,
            Reply::Published { id, .. } if *id == UniqueId::from_bytes([11; 20])
        ));
    }

    #[test]
    fn conditional_update_applies_atomically() {
        init_test_logging();
        let store = MemoryStore::new();
        let (collector, client) = connection(&store);
        let winner = ClientId::from_bytes([3; 20]);

        let mut write = command(CommandKind::Write, TablePrefix::Task, TablePubsub::Task, 4);
        write.payload = task(SchedulingState::WAITING, ClientId::nil()).encode().unwrap();
        client.submit(write).unwrap();

        for scheduler in [winner, ClientId::from_bytes([9; 20])] {
            let mut update =
                command(CommandKind::ConditionalUpdate, TablePrefix::Task, TablePubsub::Task, 4);
            update.payload = TaskTableTestAndUpdate {
                test_state_bitmask: SchedulingState::WAITING,
                update_state: SchedulingState::SCHEDULED,
                scheduler_id: scheduler,
            }
            .encode()
            .unwrap();
            client.submit(update).unwrap();
        }
        store.run_until_idle();

        let outcomes: Vec<_> = collector
            .replies
            .lock()
            .iter()
            .filter_map(|(_, reply)| match reply {
                Reply::Value(Some(bytes)) => Some(TestAndUpdateReply::decode(bytes).unwrap()),
                _ => None,
            })
            .collect();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].updated);
        assert!(!outcomes[1].updated);
        let current = outcomes[1].task.as_ref().unwrap();
        assert_eq!(current.scheduling_state, SchedulingState::SCHEDULED);
        assert_eq!(current.scheduler_id, winner);
    }

    #[test]
    fn conditional_update_on_missing_task_is_a_miss() {
        init_test_logging();
        let store = MemoryStore::new();
        let (collector, client) = connection(&store);
        let mut update =
            command(CommandKind::ConditionalUpdate, TablePrefix::Task, TablePubsub::Task, 8);
        update.payload = TaskTableTestAndUpdate {
            test_state_bitmask: SchedulingState::ALL,
            update_state: SchedulingState::DONE,
            scheduler_id: ClientId::nil(),
        }
        .encode()
        .unwrap();
        client.submit(update).unwrap();
        store.run_until_idle();

        let replies = collector.replies.lock();
        let Reply::Value(Some(bytes)) = &replies[0].1 else {
            panic!("expected an encoded reply, got {:?}", replies[0].1);
        };
        let reply = TestAndUpdateReply::decode(bytes).unwrap();
        assert_eq!(reply.task, None);
        assert!(!reply.updated);
        assert_eq!(store.row(TablePrefix::Task, UniqueId::from_bytes([8; 20])), None);
    }

    #[test]
    fn notification_request_is_consumed_once() {
        init_test_logging();
        let store = MemoryStore::new();
        let (collector, client) = connection(&store);
        let requester = ClientId::from_bytes([6; 20]);
        let handle = CallbackHandle::new_for_test(60);
        client
            .subscribe(Subscription {
                filter: requester.unique(),
                channel: TablePubsub::Object,
                handle,
            })
            .unwrap();

        let mut request = command(
            CommandKind::RequestNotifications,
            TablePrefix::Object,
            TablePubsub::Object,
            12,
        );
        request.handle = None;
        request.payload = requester.unique().as_bytes().to_vec();
        client.submit(request.clone()).unwrap();
        client.submit(request).unwrap();

        let location = ObjectTableData {
            managers: vec![requester],
            data_size: 64,
            hash: String::new(),
        };
        for _ in 0..2 {
            let mut write = command(CommandKind::Write, TablePrefix::Object, TablePubsub::Object, 12);
            write.handle = None;
            write.payload = location.encode().unwrap();
            client.submit(write).unwrap();
        }
        store.run_until_idle();

        let published = collector
            .replies
            .lock()
            .iter()
            .filter(|(_, reply)| matches!(reply, Reply::Published { .. }))
            .count();
        assert_eq!(published, 1);
    }

    #[test]
    fn seeded_stores_mint_repeatable_client_ids() {
        init_test_logging();
        let ids = |seed| {
            let store = MemoryStore::seeded(seed);
            let a = store.connect_client(GcsConfig::default()).unwrap().client_id();
            let b = store.connect_client(GcsConfig::default()).unwrap().client_id();
            (a, b)
        };
        let (a, b) = ids(42);
        assert_ne!(a, b);
        assert_eq!(ids(42), (a, b));
        assert_ne!(ids(43).0, a);
    }

    #[test]
    fn hold_and_reject() {
        init_test_logging();
        let store = MemoryStore::new();
        let (collector, client) = connection(&store);

        store.hold_replies(true);
        client
            .submit(command(CommandKind::Read, TablePrefix::Actor, TablePubsub::Actor, 1))
            .unwrap();
        assert_eq!(store.run_until_idle(), 0);
        assert_eq!(store.pending_replies(), 1);
        store.hold_replies(false);
        assert_eq!(store.run_until_idle(), 1);
        assert_eq!(collector.replies.lock().len(), 1);

        store.reject_submissions(true);
        let err = client
            .submit(command(CommandKind::Read, TablePrefix::Actor, TablePubsub::Actor, 1))
            .unwrap_err();
        assert!(err.is_submission());
        assert_eq!(store.commands_executed(), 1);
        assert_eq!(store.pending_replies(), 0);
    }
}
