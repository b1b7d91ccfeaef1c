//! Node membership table and the local liveness cache.
//!
//! # Client Lifecycle
//!
//! ```text
//! Unregistered ── connect() ──► Connected ── disconnect() ──► Disconnected
//! ```
//!
//! `Disconnected` is terminal: a client ID is never reused. Connecting
//! writes `{id, address, port, alive = true}` and, once the write is
//! acknowledged, subscribes to every membership update. The cache is fed
//! by that subscription and by the local node's own writes, so it is
//! eventually consistent with the true membership. Lookups never touch the
//! network.
//!
//! The subscription is issued from the connect acknowledgement, so its
//! outcome is reported through [`ClientTable::membership_tracking`] rather
//! than by `connect` itself.

use super::generic::Table;
use crate::callback::CallbackRegistry;
use crate::error::{Error, ErrorKind, Result};
use crate::store::StoreClient;
use crate::tracing_compat::{error, info, trace, warn};
use crate::types::{ClientId, ClientTableData, JobId, TablePrefix, TablePubsub, UniqueId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Snapshot of one node's membership record.
///
/// Built from a single received record and never mutated; a later record
/// for the same node replaces the snapshot in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInformation {
    client_id: ClientId,
    ip_address: String,
    port: u16,
    alive: bool,
}

impl ClientInformation {
    /// Build a snapshot from a membership record.
    #[must_use]
    pub fn from_record(record: &ClientTableData) -> Self {
        Self {
            client_id: record.client_id,
            ip_address: record.node_manager_address.clone(),
            port: record.node_manager_port,
            alive: record.alive,
        }
    }

    /// Returns the node's client ID.
    #[must_use]
    pub const fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Returns the IP address of the node manager.
    #[must_use]
    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    /// Returns the TCP port of the node manager.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns `false` once the node has disconnected.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Connection state of the local client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// `connect` has not been called.
    Unregistered,
    /// Registered and tracking membership.
    Connected,
    /// Marked dead. Terminal.
    Disconnected,
}

/// Progress of the membership subscription issued by `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipTracking {
    /// `connect` has not been acknowledged yet.
    NotStarted,
    /// Subscription submitted, installation not yet acknowledged.
    Pending,
    /// Membership updates are being delivered.
    Installed,
    /// The subscription could not be submitted. The cache only reflects
    /// the local node's own writes.
    Failed,
}

type MembershipCallback = Box<dyn FnMut(&ClientInformation) + Send>;

/// State shared with the membership subscription.
struct Membership {
    cache: Mutex<BTreeMap<ClientId, ClientInformation>>,
    tracking: Mutex<MembershipTracking>,
    on_added: Mutex<Vec<MembershipCallback>>,
    on_removed: Mutex<Vec<MembershipCallback>>,
}

enum Transition {
    Added,
    Removed,
    Unchanged,
}

impl Membership {
    fn new() -> Self {
        Self {
            cache: Mutex::new(BTreeMap::new()),
            tracking: Mutex::new(MembershipTracking::NotStarted),
            on_added: Mutex::new(Vec::new()),
            on_removed: Mutex::new(Vec::new()),
        }
    }

    /// Apply one membership record to the cache and notify listeners.
    fn observe(&self, record: &ClientTableData) {
        let info = ClientInformation::from_record(record);
        let transition = {
            let mut cache = self.cache.lock();
            let previous = cache.get(&info.client_id).map(ClientInformation::is_alive);
            let transition = match (previous, info.alive) {
                (Some(false), true) => {
                    warn!(client = %info.client_id, "ignoring registration of a disconnected client");
                    return;
                }
                (None, true) => Transition::Added,
                (Some(true), false) => Transition::Removed,
                _ => Transition::Unchanged,
            };
            cache.insert(info.client_id, info.clone());
            transition
        };

        trace!(client = %info.client_id, alive = info.alive, "membership update");
        let listeners = match transition {
            Transition::Added => &self.on_added,
            Transition::Removed => &self.on_removed,
            Transition::Unchanged => return,
        };
        for callback in listeners.lock().iter_mut() {
            callback(&info);
        }
    }
}

/// Node membership table with a local cache of every observed node.
pub struct ClientTable {
    table: Table<ClientId, ClientTableData>,
    local: ClientTableData,
    state: Mutex<ConnectionState>,
    membership: Arc<Membership>,
}

impl fmt::Debug for ClientTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTable")
            .field("client_id", &self.local.client_id)
            .field("state", &*self.state.lock())
            .field("cached", &self.membership.cache.lock().len())
            .field("tracking", &*self.membership.tracking.lock())
            .finish_non_exhaustive()
    }
}

impl ClientTable {
    /// Creates the membership table for the local node.
    ///
    /// `address` and `port` are the node manager's endpoint published on
    /// connect.
    #[must_use]
    pub fn new(
        store: Arc<dyn StoreClient>,
        registry: Arc<CallbackRegistry>,
        client_id: ClientId,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            table: Table::new(store, registry, TablePrefix::Client, TablePubsub::Client),
            local: ClientTableData {
                client_id,
                node_manager_address: address.into(),
                node_manager_port: port,
                alive: true,
            },
            state: Mutex::new(ConnectionState::Unregistered),
            membership: Arc::new(Membership::new()),
        }
    }

    /// Returns the local client's ID.
    #[must_use]
    pub const fn local_client_id(&self) -> ClientId {
        self.local.client_id
    }

    /// Returns the local client's connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Register the local client and start tracking membership.
    ///
    /// Writes the local membership record; when the write is acknowledged,
    /// subscribes to every membership update. The local record enters the
    /// cache when that subscription is installed. Returns the local client
    /// ID. A failure to subscribe surfaces as
    /// [`MembershipTracking::Failed`].
    pub fn connect(&self) -> Result<ClientId> {
        let mut state = self.state.lock();
        match *state {
            ConnectionState::Unregistered => {}
            ConnectionState::Connected => {
                return Err(Error::new(ErrorKind::AlreadyConnected)
                    .with_context(self.local.client_id.to_string()));
            }
            ConnectionState::Disconnected => {
                return Err(Error::new(ErrorKind::Disconnected)
                    .with_context(self.local.client_id.to_string()));
            }
        }

        let table = self.table.clone();
        let membership = Arc::clone(&self.membership);
        let local = self.local.clone();
        self.table
            .add(JobId::nil(), local.client_id, local.clone(), move |id, _| {
                let events = Arc::clone(&membership);
                let installed = Arc::clone(&membership);
                *membership.tracking.lock() = MembershipTracking::Pending;
                let subscribed = table.subscribe(
                    JobId::nil(),
                    UniqueId::nil(),
                    move |_, record: ClientTableData| events.observe(&record),
                    move |_| {
                        info!(client = %local.client_id, "membership subscription installed");
                        *installed.tracking.lock() = MembershipTracking::Installed;
                        installed.observe(&local);
                    },
                );
                if let Err(err) = subscribed {
                    *membership.tracking.lock() = MembershipTracking::Failed;
                    error!(client = %id, error = %err, "failed to subscribe to membership updates");
                }
            })?;

        *state = ConnectionState::Connected;
        info!(client = %self.local.client_id, address = %self.local.node_manager_address, port = self.local.node_manager_port, "client connected");
        Ok(self.local.client_id)
    }

    /// Mark the local client dead.
    ///
    /// The membership subscription stays installed, so the cache keeps
    /// tracking other nodes. The dead record enters the local cache when
    /// the write is acknowledged, even if the subscription has not been
    /// installed yet. The client ID cannot be connected again.
    pub fn disconnect(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            ConnectionState::Connected => {}
            ConnectionState::Unregistered => {
                return Err(Error::new(ErrorKind::NotConnected)
                    .with_context(self.local.client_id.to_string()));
            }
            ConnectionState::Disconnected => {
                return Err(Error::new(ErrorKind::Disconnected)
                    .with_context(self.local.client_id.to_string()));
            }
        }

        let record = ClientTableData {
            alive: false,
            ..self.local.clone()
        };
        let membership = Arc::clone(&self.membership);
        self.table
            .add(JobId::nil(), record.client_id, record.clone(), move |id, _| {
                trace!(client = %id, "disconnect acknowledged");
                membership.observe(&record);
            })?;

        *state = ConnectionState::Disconnected;
        info!(client = %self.local.client_id, "client disconnected");
        Ok(())
    }

    /// Returns the progress of the membership subscription.
    #[must_use]
    pub fn membership_tracking(&self) -> MembershipTracking {
        *self.membership.tracking.lock()
    }

    /// Returns `true` once membership updates are being delivered.
    #[must_use]
    pub fn is_tracking_membership(&self) -> bool {
        self.membership_tracking() == MembershipTracking::Installed
    }

    /// Look up a node in the local cache.
    ///
    /// Returns the most recent snapshot observed, which may report the node
    /// as not alive, or [`ErrorKind::NotFound`] if no membership event for
    /// `client_id` has been seen.
    pub fn get_client_information(&self, client_id: ClientId) -> Result<ClientInformation> {
        self.membership
            .cache
            .lock()
            .get(&client_id)
            .cloned()
            .ok_or_else(|| Error::not_found().with_context(format!("client {client_id}")))
    }

    /// IDs of every node observed so far, in ID order.
    #[must_use]
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.membership.cache.lock().keys().copied().collect()
    }

    /// Snapshots of every node currently believed alive, in ID order.
    #[must_use]
    pub fn alive_clients(&self) -> Vec<ClientInformation> {
        self.membership
            .cache
            .lock()
            .values()
            .filter(|info| info.is_alive())
            .cloned()
            .collect()
    }

    /// Run `callback` whenever a node is first observed alive.
    ///
    /// Only nodes observed after registration are reported.
    pub fn register_client_added_callback<F>(&self, callback: F)
    where
        F: FnMut(&ClientInformation) + Send + 'static,
    {
        self.membership.on_added.lock().push(Box::new(callback));
    }

    /// Run `callback` whenever a node observed alive is reported dead.
    pub fn register_client_removed_callback<F>(&self, callback: F)
    where
        F: FnMut(&ClientInformation) + Send + 'static,
    {
        self.membership.on_removed.lock().push(Box::new(callback));
    }
}
