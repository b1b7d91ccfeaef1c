//! Task table and the test-and-update ownership handoff.
//!
//! Competing schedulers claim a task by racing a conditional update:
//!
//! ```text
//! scheduler A: test_and_update(T, test = WAITING, update = SCHEDULED)  ──► updated = true
//! scheduler B: test_and_update(T, test = WAITING, update = SCHEDULED)  ──► updated = false
//! ```
//!
//! The test and the write happen atomically at the store, so at most one
//! caller observes `updated = true` per transition. The winner is recorded
//! as the task's scheduler.

use super::generic::{Table, decode_or_log};
use crate::callback::{CallbackHandle, CallbackRegistry, OneShotRequest, PersistentRequest};
use crate::codec::Record;
use crate::error::Result;
use crate::store::{CommandKind, Reply, StoreClient};
use crate::tracing_compat::{error, trace, warn};
use crate::types::{
    ClientId, JobId, SchedulingState, TablePrefix, TablePubsub, TaskId, TaskTableData,
    TaskTableTestAndUpdate, TestAndUpdateReply,
};
use std::sync::Arc;

/// Task scheduling table.
#[derive(Debug, Clone)]
pub struct TaskTable {
    table: Table<TaskId, TaskTableData>,
    scheduler_id: ClientId,
}

impl TaskTable {
    /// Creates the task table for the scheduler `scheduler_id`, which is
    /// recorded as owner by every successful test-and-update.
    #[must_use]
    pub fn new(
        store: Arc<dyn StoreClient>,
        registry: Arc<CallbackRegistry>,
        scheduler_id: ClientId,
    ) -> Self {
        Self {
            table: Table::new(store, registry, TablePrefix::Task, TablePubsub::Task),
            scheduler_id,
        }
    }

    /// Returns the underlying generic table.
    #[must_use]
    pub const fn table(&self) -> &Table<TaskId, TaskTableData> {
        &self.table
    }

    /// Returns the scheduler ID recorded by successful updates.
    #[must_use]
    pub const fn scheduler_id(&self) -> ClientId {
        self.scheduler_id
    }

    /// Write a task record. See [`Table::add`].
    pub fn add<F>(&self, job_id: JobId, id: TaskId, task: TaskTableData, done: F) -> Result<()>
    where
        F: FnOnce(TaskId, TaskTableData) + Send + 'static,
    {
        self.table.add(job_id, id, task, done)
    }

    /// Read a task record. See [`Table::lookup`].
    pub fn lookup<F>(&self, job_id: JobId, id: TaskId, on_lookup: F) -> Result<()>
    where
        F: FnOnce(TaskId, Option<TaskTableData>) + Send + 'static,
    {
        self.table.lookup(job_id, id, on_lookup)
    }

    /// Conditionally move a task to `update_state`.
    ///
    /// The store applies the update, recording this table's scheduler as
    /// owner, iff the task's current state intersects `test_state_bitmask`.
    /// `callback` runs exactly once with the task as it is after the
    /// attempt and whether the update was applied. A task that does not
    /// exist is reported as `(None, false)`.
    pub fn test_and_update<F>(
        &self,
        job_id: JobId,
        task_id: TaskId,
        test_state_bitmask: SchedulingState,
        update_state: SchedulingState,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(TaskId, Option<TaskTableData>, bool) + Send + 'static,
    {
        let request = TaskTableTestAndUpdate {
            test_state_bitmask,
            update_state,
            scheduler_id: self.scheduler_id,
        };
        self.table.submit_one_shot(
            job_id,
            CommandKind::ConditionalUpdate,
            task_id.unique(),
            request.encode()?,
            PendingTestAndUpdate { task_id, callback },
        )
    }

    /// Listen for task updates.
    ///
    /// Only updates of tasks owned by `scheduler_filter` are delivered (nil
    /// for every scheduler), and of those only updates whose new state
    /// intersects `state_filter`. Non-matching updates are dropped, not
    /// queued.
    pub fn subscribe_to_task<F, D>(
        &self,
        job_id: JobId,
        scheduler_filter: ClientId,
        state_filter: SchedulingState,
        on_update: F,
        on_installed: D,
    ) -> Result<CallbackHandle>
    where
        F: FnMut(TaskId, TaskTableData) + Send + 'static,
        D: FnOnce() + Send + 'static,
    {
        self.table.subscribe_with(
            job_id,
            scheduler_filter.unique(),
            TaskSubscription {
                state_filter,
                on_update,
                on_installed: Some(on_installed),
            },
        )
    }
}

struct PendingTestAndUpdate<F> {
    task_id: TaskId,
    callback: F,
}

impl<F> OneShotRequest for PendingTestAndUpdate<F>
where
    F: FnOnce(TaskId, Option<TaskTableData>, bool) + Send + 'static,
{
    fn operation(&self) -> &'static str {
        "test_and_update"
    }

    fn complete(self: Box<Self>, reply: Reply) {
        let Self { task_id, callback } = *self;
        match reply {
            Reply::Value(Some(bytes)) => {
                if let Some(reply) = decode_or_log::<TestAndUpdateReply>(&bytes, "test_and_update")
                {
                    callback(task_id, reply.task, reply.updated);
                }
            }
            Reply::Value(None) => callback(task_id, None, false),
            other => error!(task = %task_id, reply = other.variant(), "unexpected reply to test-and-update"),
        }
    }
}

struct TaskSubscription<F, D> {
    state_filter: SchedulingState,
    on_update: F,
    on_installed: Option<D>,
}

impl<F, D> PersistentRequest for TaskSubscription<F, D>
where
    F: FnMut(TaskId, TaskTableData) + Send + 'static,
    D: FnOnce() + Send + 'static,
{
    fn operation(&self) -> &'static str {
        "subscribe_to_task"
    }

    fn deliver(&mut self, reply: Reply) {
        match reply {
            Reply::SubscriptionInstalled => match self.on_installed.take() {
                Some(done) => done(),
                None => warn!("duplicate installation event ignored"),
            },
            Reply::Published { id, payload } => {
                let Some(task) = decode_or_log::<TaskTableData>(&payload, "subscribe_to_task")
                else {
                    return;
                };
                if task.scheduling_state.intersects(self.state_filter) {
                    (self.on_update)(TaskId::from(id), task);
                } else {
                    trace!(
                        task = %id,
                        state = %task.scheduling_state,
                        filter = %self.state_filter,
                        "task update filtered out"
                    );
                }
            }
            other => error!(reply = other.variant(), "unexpected reply on task subscription"),
        }
    }
}
