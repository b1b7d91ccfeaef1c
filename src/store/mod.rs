//! Backing store contract.
//!
//! The store is an external pub/sub-capable key-value service. Tables talk
//! to it only through [`StoreClient`]: submission is synchronous and may
//! fail immediately, while the reply is delivered later by the store
//! calling [`Dispatch::dispatch`](crate::callback::Dispatch::dispatch) with
//! the handle carried by the command.
//!
//! A store implementation must:
//!
//! - deliver exactly one reply per submitted command that carries a handle;
//! - deliver [`Reply::SubscriptionInstalled`] once per subscription before
//!   any [`Reply::Published`] for it;
//! - deliver publications for one subscription in publication order;
//! - never dispatch synchronously from inside `submit`/`subscribe`.
//!
//! [`crate::lab::MemoryStore`] is an in-process implementation used by the
//! tests.

use crate::callback::CallbackHandle;
use crate::error::Result;
use crate::types::{TablePrefix, TablePubsub, UniqueId};
use core::fmt;

/// Kind of command submitted to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Overwrite a row and publish it on the command's channel.
    Write,
    /// Read a row.
    Read,
    /// Atomically test a task's state against a mask and update it.
    ConditionalUpdate,
    /// Ask for an availability notification of an object on the requester's
    /// notification channel. Carries no reply handle.
    RequestNotifications,
}

impl CommandKind {
    /// Returns the wire name of the command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Write => "TABLE_ADD",
            Self::Read => "TABLE_LOOKUP",
            Self::ConditionalUpdate => "TABLE_TEST_AND_UPDATE",
            Self::RequestNotifications => "OBJECT_TABLE_REQUEST_NOTIFICATIONS",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command addressed to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// What to do.
    pub kind: CommandKind,
    /// Key namespace of the row.
    pub prefix: TablePrefix,
    /// Row key.
    pub id: UniqueId,
    /// Encoded record or request; empty for reads.
    pub payload: Vec<u8>,
    /// Channel notified as a side effect of a write.
    pub channel: TablePubsub,
    /// Where the reply goes. `None` for commands that expect no reply.
    pub handle: Option<CallbackHandle>,
}

/// A persistent listener on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    /// Only publications routed to this ID are delivered; nil means all.
    pub filter: UniqueId,
    /// Channel to listen on.
    pub channel: TablePubsub,
    /// Where every event goes.
    pub handle: CallbackHandle,
}

/// A reply or event delivered by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A write was acknowledged.
    Ack,
    /// Result of a read or conditional update. `None` when the row is absent.
    Value(Option<Vec<u8>>),
    /// A subscription is installed; publications follow.
    SubscriptionInstalled,
    /// A publication matching a subscription.
    Published {
        /// Key of the row that was written.
        id: UniqueId,
        /// The encoded record.
        payload: Vec<u8>,
    },
}

impl Reply {
    /// Short name of the variant for diagnostics.
    #[must_use]
    pub const fn variant(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Value(_) => "value",
            Self::SubscriptionInstalled => "subscription_installed",
            Self::Published { .. } => "published",
        }
    }
}

/// Client half of the backing store.
///
/// Both methods return as soon as the request is handed off. An `Err`
/// means the request never reached the store and no reply will follow.
pub trait StoreClient: Send + Sync + 'static {
    /// Submit a command.
    fn submit(&self, command: Command) -> Result<()>;

    /// Register a persistent listener.
    fn subscribe(&self, subscription: Subscription) -> Result<()>;
}
