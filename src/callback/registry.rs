//! The callback registry.
//!
//! The registry is an explicit instance shared by a process's tables and
//! its store connection, not a global. Handles are allocated from a
//! monotonically increasing 64-bit counter and never reused.
//!
//! # Concurrency
//!
//! All state sits behind one `parking_lot::Mutex`, which is never held
//! while user code runs: a one-shot entry is removed before it completes,
//! and a persistent entry is cloned out and invoked under its own lock.
//! The per-subscription lock serializes deliveries, so a store that
//! services replies from several threads still delivers one subscription's
//! events one at a time and in dispatch order. Callbacks may therefore
//! register or submit new requests, but a store must not dispatch to a
//! subscription from inside that same subscription's callback.

use crate::store::Reply;
use crate::tracing_compat::{trace, warn};
use core::fmt;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Opaque handle correlating a request with its reply.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackHandle(u64);

impl CallbackHandle {
    /// Returns the raw index.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Creates a handle for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(index: u64) -> Self {
        Self(index)
    }
}

impl fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallbackHandle({})", self.0)
    }
}

impl fmt::Display for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb#{}", self.0)
    }
}

/// How long an entry stays registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Removed after its single reply.
    OneShot,
    /// Kept for every event of a subscription.
    Persistent,
}

/// A pending request that completes on its single reply.
pub trait OneShotRequest: Send + 'static {
    /// Operation name for diagnostics (e.g. `"lookup"`).
    fn operation(&self) -> &'static str;

    /// Consume the request with its reply.
    fn complete(self: Box<Self>, reply: Reply);
}

/// A subscription receiving every event published to it.
pub trait PersistentRequest: Send + 'static {
    /// Operation name for diagnostics (e.g. `"subscribe"`).
    fn operation(&self) -> &'static str;

    /// Handle one event.
    fn deliver(&mut self, reply: Reply);
}

/// What happened to a dispatched reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A one-shot request completed and its entry was removed.
    Completed,
    /// A subscription received the event and stays registered.
    Delivered,
    /// No entry exists for the handle; the reply was dropped.
    Unknown,
}

/// Routes replies to pending requests by handle.
///
/// Stores hold an `Arc<dyn Dispatch>` so tests can observe or replace the
/// routing.
pub trait Dispatch: Send + Sync + 'static {
    /// Route `reply` to the request registered under `handle`.
    fn dispatch(&self, handle: CallbackHandle, reply: Reply) -> DispatchOutcome;
}

struct OneShotEntry {
    request: Box<dyn OneShotRequest>,
    registered_at: Instant,
}

type SharedSubscription = Arc<Mutex<Box<dyn PersistentRequest>>>;

#[derive(Default)]
struct Entries {
    one_shot: BTreeMap<CallbackHandle, OneShotEntry>,
    persistent: BTreeMap<CallbackHandle, SharedSubscription>,
}

/// Registry of pending requests keyed by [`CallbackHandle`].
pub struct CallbackRegistry {
    next_index: AtomicU64,
    entries: Mutex<Entries>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_index: AtomicU64::new(0),
            entries: Mutex::new(Entries::default()),
        }
    }

    fn allocate(&self) -> CallbackHandle {
        CallbackHandle(self.next_index.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a request that completes on its first reply.
    pub fn register_one_shot(&self, request: impl OneShotRequest) -> CallbackHandle {
        let handle = self.allocate();
        trace!(%handle, operation = request.operation(), "registered one-shot request");
        self.entries.lock().one_shot.insert(
            handle,
            OneShotEntry {
                request: Box::new(request),
                registered_at: Instant::now(),
            },
        );
        handle
    }

    /// Register a subscription that receives every event for its handle.
    pub fn register_persistent(&self, request: impl PersistentRequest) -> CallbackHandle {
        let handle = self.allocate();
        trace!(%handle, operation = request.operation(), "registered subscription");
        let request: Box<dyn PersistentRequest> = Box::new(request);
        self.entries
            .lock()
            .persistent
            .insert(handle, Arc::new(Mutex::new(request)));
        handle
    }

    /// Remove an entry without invoking it.
    ///
    /// Used when the command carrying `handle` was rejected at submission.
    /// Returns `false` if no entry existed.
    pub fn discard(&self, handle: CallbackHandle) -> bool {
        let mut entries = self.entries.lock();
        entries.one_shot.remove(&handle).is_some() || entries.persistent.remove(&handle).is_some()
    }

    /// Returns the lifetime of the entry registered under `handle`.
    #[must_use]
    pub fn lifetime(&self, handle: CallbackHandle) -> Option<Lifetime> {
        let entries = self.entries.lock();
        if entries.one_shot.contains_key(&handle) {
            Some(Lifetime::OneShot)
        } else if entries.persistent.contains_key(&handle) {
            Some(Lifetime::Persistent)
        } else {
            None
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.lock();
        entries.one_shot.len() + entries.persistent.len()
    }

    /// Returns `true` if no entries are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of one-shot requests still waiting for a reply.
    #[must_use]
    pub fn pending_one_shot(&self) -> usize {
        self.entries.lock().one_shot.len()
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn subscriptions(&self) -> usize {
        self.entries.lock().persistent.len()
    }

    /// Drop one-shot requests registered at least `max_age` before `now`.
    ///
    /// A store that loses a submitted command never replies, which would
    /// otherwise leave the entry pending forever. Expired requests are
    /// dropped without invoking their callbacks; a late reply for one of
    /// them dispatches as [`DispatchOutcome::Unknown`]. Subscriptions are
    /// never expired.
    pub fn expire_stale(&self, now: Instant, max_age: Duration) -> Vec<CallbackHandle> {
        let mut expired = Vec::new();
        self.entries.lock().one_shot.retain(|handle, entry| {
            let stale = now.saturating_duration_since(entry.registered_at) >= max_age;
            if stale {
                warn!(
                    %handle,
                    operation = entry.request.operation(),
                    ?max_age,
                    "expiring request with no reply from the store"
                );
                expired.push(*handle);
            }
            !stale
        });
        expired
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("CallbackRegistry")
            .field("next_index", &self.next_index.load(Ordering::Relaxed))
            .field("one_shot", &entries.one_shot.len())
            .field("persistent", &entries.persistent.len())
            .finish()
    }
}

impl Dispatch for CallbackRegistry {
    fn dispatch(&self, handle: CallbackHandle, reply: Reply) -> DispatchOutcome {
        let (one_shot, subscription) = {
            let mut entries = self.entries.lock();
            match entries.one_shot.remove(&handle) {
                Some(entry) => (Some(entry), None),
                None => (None, entries.persistent.get(&handle).map(Arc::clone)),
            }
        };

        if let Some(entry) = one_shot {
            trace!(%handle, operation = entry.request.operation(), reply = reply.variant(), "completing request");
            entry.request.complete(reply);
            return DispatchOutcome::Completed;
        }
        if let Some(subscription) = subscription {
            let mut request = subscription.lock();
            trace!(%handle, operation = request.operation(), reply = reply.variant(), "delivering event");
            request.deliver(reply);
            return DispatchOutcome::Delivered;
        }
        trace!(%handle, reply = reply.variant(), "reply for unknown handle dropped");
        DispatchOutcome::Unknown
    }
}
