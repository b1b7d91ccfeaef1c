//! The generic table protocol.
//!
//! Every operation encodes what it needs, registers a pending-request value
//! object with the [`CallbackRegistry`], and submits one command carrying
//! the returned handle. If submission fails the entry is discarded and the
//! error is returned; the callback never fires.

use crate::callback::{CallbackHandle, CallbackRegistry, OneShotRequest, PersistentRequest};
use crate::codec::Record;
use crate::error::{Error, Result};
use crate::store::{Command, CommandKind, Reply, StoreClient, Subscription};
use crate::tracing_compat::{debug, error, warn};
use crate::types::{JobId, TableId, TablePrefix, TablePubsub, UniqueId};
use core::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed table bound to one channel and one key namespace.
///
/// Cloning is cheap; clones share the store connection and registry.
pub struct Table<ID, R> {
    store: Arc<dyn StoreClient>,
    registry: Arc<CallbackRegistry>,
    prefix: TablePrefix,
    channel: TablePubsub,
    _marker: PhantomData<fn() -> (ID, R)>,
}

impl<ID, R> Clone for Table<ID, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            prefix: self.prefix,
            channel: self.channel,
            _marker: PhantomData,
        }
    }
}

impl<ID, R> fmt::Debug for Table<ID, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("prefix", &self.prefix)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl<ID: TableId, R: Record> Table<ID, R> {
    /// Creates a table over `store`, reporting completions through `registry`.
    #[must_use]
    pub fn new(
        store: Arc<dyn StoreClient>,
        registry: Arc<CallbackRegistry>,
        prefix: TablePrefix,
        channel: TablePubsub,
    ) -> Self {
        Self {
            store,
            registry,
            prefix,
            channel,
            _marker: PhantomData,
        }
    }

    /// Returns the key namespace.
    #[must_use]
    pub const fn prefix(&self) -> TablePrefix {
        self.prefix
    }

    /// Returns the channel writes are published to.
    #[must_use]
    pub const fn channel(&self) -> TablePubsub {
        self.channel
    }

    /// Returns the registry completions are routed through.
    #[must_use]
    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Write `record` under `id`, publishing it on the table's channel.
    ///
    /// `done` receives the record passed in here, not a re-read: once the
    /// store acknowledges, the caller's copy is authoritative.
    pub fn add<F>(&self, job_id: JobId, id: ID, record: R, done: F) -> Result<()>
    where
        F: FnOnce(ID, R) + Send + 'static,
    {
        let payload = record.encode()?;
        self.submit_one_shot(
            job_id,
            CommandKind::Write,
            id.into(),
            payload,
            PendingAdd { id, record, done },
        )
    }

    /// Read the row under `id`.
    ///
    /// `on_lookup` receives `None` if the row does not exist.
    pub fn lookup<F>(&self, job_id: JobId, id: ID, on_lookup: F) -> Result<()>
    where
        F: FnOnce(ID, Option<R>) + Send + 'static,
    {
        self.submit_one_shot(
            job_id,
            CommandKind::Read,
            id.into(),
            Vec::new(),
            PendingLookup {
                id,
                on_lookup,
                _record: PhantomData,
            },
        )
    }

    /// Listen for writes on the table's channel.
    ///
    /// `filter` restricts delivery to publications routed to one ID; nil
    /// receives everything. `on_installed` runs exactly once, before any
    /// data event, when the store confirms the listener. `on_event` then
    /// runs once per publication with the written row's ID and record.
    pub fn subscribe<F, D>(
        &self,
        job_id: JobId,
        filter: UniqueId,
        on_event: F,
        on_installed: D,
    ) -> Result<CallbackHandle>
    where
        F: FnMut(ID, R) + Send + 'static,
        D: FnOnce(UniqueId) + Send + 'static,
    {
        self.subscribe_with(
            job_id,
            filter,
            TableSubscription {
                filter,
                on_event,
                on_installed: Some(on_installed),
                _types: PhantomData,
            },
        )
    }

    /// Delete the row under `id`.
    ///
    /// Removal has no defined semantics yet and always fails with
    /// [`ErrorKind::NotImplemented`](crate::error::ErrorKind::NotImplemented).
    pub fn remove<F>(&self, _job_id: JobId, id: ID, _done: F) -> Result<()>
    where
        F: FnOnce(ID) + Send + 'static,
    {
        Err(Error::not_implemented(format!("remove {} {id}", self.prefix)))
    }

    /// Cancel a subscription.
    ///
    /// Subscriptions have no unregistration path: the entry lives as long
    /// as the registry. Always fails with
    /// [`ErrorKind::NotImplemented`](crate::error::ErrorKind::NotImplemented).
    pub fn unsubscribe(&self, handle: CallbackHandle) -> Result<()> {
        Err(Error::not_implemented(format!("unsubscribe {handle}")))
    }

    pub(crate) fn submit_one_shot(
        &self,
        job_id: JobId,
        kind: CommandKind,
        id: UniqueId,
        payload: Vec<u8>,
        request: impl OneShotRequest,
    ) -> Result<()> {
        let handle = self.registry.register_one_shot(request);
        self.submit(job_id, kind, id, payload, Some(handle))
    }

    pub(crate) fn submit(
        &self,
        job_id: JobId,
        kind: CommandKind,
        id: UniqueId,
        payload: Vec<u8>,
        handle: Option<CallbackHandle>,
    ) -> Result<()> {
        debug!(
            job = %job_id,
            command = %kind,
            prefix = %self.prefix,
            %id,
            bytes = payload.len(),
            "submitting command"
        );
        let command = Command {
            kind,
            prefix: self.prefix,
            id,
            payload,
            channel: self.channel,
            handle,
        };
        self.store.submit(command).inspect_err(|err| {
            if let Some(handle) = handle {
                self.registry.discard(handle);
            }
            debug!(command = %kind, %id, error = %err, "command rejected by store");
        })
    }

    pub(crate) fn subscribe_with(
        &self,
        job_id: JobId,
        filter: UniqueId,
        request: impl PersistentRequest,
    ) -> Result<CallbackHandle> {
        let handle = self.registry.register_persistent(request);
        debug!(job = %job_id, channel = %self.channel, %filter, %handle, "subscribing");
        let subscription = Subscription {
            filter,
            channel: self.channel,
            handle,
        };
        match self.store.subscribe(subscription) {
            Ok(()) => Ok(handle),
            Err(err) => {
                self.registry.discard(handle);
                debug!(channel = %self.channel, error = %err, "subscription rejected by store");
                Err(err)
            }
        }
    }
}

/// Decode a record from a reply, logging failures.
///
/// A decode failure has no path back to the caller, so the request's
/// callback is skipped.
pub(crate) fn decode_or_log<R: Record>(bytes: &[u8], operation: &'static str) -> Option<R> {
    match R::decode(bytes) {
        Ok(record) => Some(record),
        Err(err) => {
            error!(operation, error = %err, "dropping undecodable reply");
            None
        }
    }
}

// ============================================================================
// Pending requests
// ============================================================================

struct PendingAdd<ID, R, F> {
    id: ID,
    record: R,
    done: F,
}

impl<ID, R, F> OneShotRequest for PendingAdd<ID, R, F>
where
    ID: TableId,
    R: Record,
    F: FnOnce(ID, R) + Send + 'static,
{
    fn operation(&self) -> &'static str {
        "add"
    }

    fn complete(self: Box<Self>, _reply: Reply) {
        let Self { id, record, done } = *self;
        done(id, record);
    }
}

struct PendingLookup<ID, R, F> {
    id: ID,
    on_lookup: F,
    _record: PhantomData<fn() -> R>,
}

impl<ID, R, F> OneShotRequest for PendingLookup<ID, R, F>
where
    ID: TableId,
    R: Record,
    F: FnOnce(ID, Option<R>) + Send + 'static,
{
    fn operation(&self) -> &'static str {
        "lookup"
    }

    fn complete(self: Box<Self>, reply: Reply) {
        let Self { id, on_lookup, .. } = *self;
        match reply {
            Reply::Value(None) => on_lookup(id, None),
            Reply::Value(Some(bytes)) => {
                if let Some(record) = decode_or_log::<R>(&bytes, "lookup") {
                    on_lookup(id, Some(record));
                }
            }
            other => error!(%id, reply = other.variant(), "unexpected reply to lookup"),
        }
    }
}

struct TableSubscription<ID, R, F, D> {
    filter: UniqueId,
    on_event: F,
    on_installed: Option<D>,
    _types: PhantomData<fn(ID, R)>,
}

impl<ID, R, F, D> PersistentRequest for TableSubscription<ID, R, F, D>
where
    ID: TableId,
    R: Record,
    F: FnMut(ID, R) + Send + 'static,
    D: FnOnce(UniqueId) + Send + 'static,
{
    fn operation(&self) -> &'static str {
        "subscribe"
    }

    fn deliver(&mut self, reply: Reply) {
        match reply {
            Reply::SubscriptionInstalled => match self.on_installed.take() {
                Some(done) => done(self.filter),
                None => warn!(filter = %self.filter, "duplicate installation event ignored"),
            },
            Reply::Published { id, payload } => {
                if let Some(record) = decode_or_log::<R>(&payload, "subscribe") {
                    (self.on_event)(ID::from(id), record);
                }
            }
            other => error!(reply = other.variant(), "unexpected reply on subscription"),
        }
    }
}
