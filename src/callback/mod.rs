//! Correlation of store replies with pending requests.
//!
//! Every asynchronous request registers a pending-request value object with
//! the [`CallbackRegistry`] and receives an opaque [`CallbackHandle`]. The
//! handle travels with the command to the store; the store hands it back
//! with the reply and the registry routes the reply to the request.
//!
//! # Entry Lifecycle
//!
//! ```text
//! register_one_shot()   ──► pending ── dispatch() ──► completed (entry removed)
//!                                  └── expire_stale() ──► expired (entry removed)
//!
//! register_persistent() ──► live ── dispatch() ──► delivered (entry kept)
//! ```
//!
//! A request whose submission fails is discarded before any reply can
//! arrive, so no callback fires for it.

pub mod registry;

pub use registry::{
    CallbackHandle, CallbackRegistry, Dispatch, DispatchOutcome, Lifetime, OneShotRequest,
    PersistentRequest,
};
