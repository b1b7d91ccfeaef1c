//! Object location table and the object notification protocol.
//!
//! Interest in objects is registered in two phases, because delivery and
//! interest are decoupled at the store:
//!
//! 1. [`ObjectTable::subscribe_to_notifications`] installs this client's
//!    notification channel (or the cluster-wide one) and the callback that
//!    fires once per available object.
//! 2. [`ObjectTable::request_notifications`] asks the store to publish on
//!    that channel when each listed object becomes available. An object
//!    that is already available is notified immediately.
//!
//! Requesting notifications before step 1 is rejected with
//! [`ErrorKind::NoSubscription`]: nothing would be listening, and the
//! store consumes a request once it fires.
//!
//! A table holds at most one notification channel. A second
//! `subscribe_to_notifications` is rejected with
//! [`ErrorKind::AlreadySubscribed`] and submits nothing, so every
//! notification reaches exactly one callback.

use super::generic::Table;
use crate::callback::{CallbackHandle, CallbackRegistry};
use crate::error::{Error, ErrorKind, Result};
use crate::store::{CommandKind, StoreClient};
use crate::tracing_compat::debug;
use crate::types::{ClientId, JobId, ObjectId, ObjectTableData, TablePrefix, TablePubsub, UniqueId};
use parking_lot::Mutex;
use std::sync::Arc;

/// Object location table.
#[derive(Debug)]
pub struct ObjectTable {
    table: Table<ObjectId, ObjectTableData>,
    client_id: ClientId,
    notifications: Mutex<Option<CallbackHandle>>,
}

impl ObjectTable {
    /// Creates the object table for the local client `client_id`.
    #[must_use]
    pub fn new(
        store: Arc<dyn StoreClient>,
        registry: Arc<CallbackRegistry>,
        client_id: ClientId,
    ) -> Self {
        Self {
            table: Table::new(store, registry, TablePrefix::Object, TablePubsub::Object),
            client_id,
            notifications: Mutex::new(None),
        }
    }

    /// Returns the underlying generic table.
    #[must_use]
    pub const fn table(&self) -> &Table<ObjectId, ObjectTableData> {
        &self.table
    }

    /// Record the locations of an object. See [`Table::add`].
    pub fn add<F>(&self, job_id: JobId, id: ObjectId, data: ObjectTableData, done: F) -> Result<()>
    where
        F: FnOnce(ObjectId, ObjectTableData) + Send + 'static,
    {
        self.table.add(job_id, id, data, done)
    }

    /// Read the locations of an object. See [`Table::lookup`].
    pub fn lookup<F>(&self, job_id: JobId, id: ObjectId, on_lookup: F) -> Result<()>
    where
        F: FnOnce(ObjectId, Option<ObjectTableData>) + Send + 'static,
    {
        self.table.lookup(job_id, id, on_lookup)
    }

    /// Install the channel on which object availability is reported.
    ///
    /// With `subscribe_all` the channel receives every object write in the
    /// cluster; otherwise only objects this client asked about through
    /// [`request_notifications`](Self::request_notifications).
    /// `on_available` runs once per notification; `on_installed` runs once
    /// the store confirms the channel.
    ///
    /// Fails with [`ErrorKind::AlreadySubscribed`] if a channel is already
    /// installed.
    pub fn subscribe_to_notifications<F, D>(
        &self,
        job_id: JobId,
        subscribe_all: bool,
        on_available: F,
        on_installed: D,
    ) -> Result<CallbackHandle>
    where
        F: FnMut(ObjectId, ObjectTableData) + Send + 'static,
        D: FnOnce() + Send + 'static,
    {
        let mut notifications = self.notifications.lock();
        if let Some(existing) = *notifications {
            return Err(Error::new(ErrorKind::AlreadySubscribed)
                .with_context(format!("client {} channel {existing}", self.client_id)));
        }
        let filter = if subscribe_all {
            UniqueId::nil()
        } else {
            self.client_id.unique()
        };
        let handle = self
            .table
            .subscribe(job_id, filter, on_available, move |_| on_installed())?;
        *notifications = Some(handle);
        Ok(handle)
    }

    /// Returns `true` once a notification channel has been subscribed.
    #[must_use]
    pub fn is_subscribed_to_notifications(&self) -> bool {
        self.notifications.lock().is_some()
    }

    /// Ask for a notification when each of `object_ids` becomes available.
    ///
    /// Issues no callback of its own; notifications arrive through the
    /// channel installed by
    /// [`subscribe_to_notifications`](Self::subscribe_to_notifications).
    /// Requests are submitted in order; if one is rejected the error is
    /// returned and the remaining IDs are not submitted.
    pub fn request_notifications(&self, job_id: JobId, object_ids: &[ObjectId]) -> Result<()> {
        if !self.is_subscribed_to_notifications() {
            return Err(Error::new(ErrorKind::NoSubscription)
                .with_context(format!("client {}", self.client_id)));
        }
        debug!(client = %self.client_id, count = object_ids.len(), "requesting object notifications");
        let requester = self.client_id.unique().as_bytes().to_vec();
        for &object_id in object_ids {
            self.table.submit(
                job_id,
                CommandKind::RequestNotifications,
                object_id.unique(),
                requester.clone(),
                None,
            )?;
        }
        Ok(())
    }
}
