//! Aggregate client: one handle per process to every table.
//!
//! A [`GcsClient`] ties together the process's callback registry, its store
//! connection, its client identity and one instance of each table. The
//! registry is shared with the store connection's dispatcher; nothing here
//! is global, so several clients can coexist in one process (as the lab
//! tests do).

use crate::callback::{CallbackHandle, CallbackRegistry};
use crate::codec::Record;
use crate::config::GcsConfig;
use crate::error::Result;
use crate::store::StoreClient;
use crate::table::{
    ActorTable, ClassTable, ClientTable, ConfigTable, CustomSerializerTable, ErrorTable,
    FunctionTable, ObjectTable, Table, TaskTable,
};
use crate::tracing_compat::{info, warn};
use crate::types::{ClientId, TableId, TablePrefix, TablePubsub};
use crate::util::{EntropySource, OsEntropy};
use core::fmt;
use std::sync::Arc;
use std::time::Instant;

fn plain<ID: TableId, R: Record>(
    store: &Arc<dyn StoreClient>,
    registry: &Arc<CallbackRegistry>,
    prefix: TablePrefix,
    channel: TablePubsub,
) -> Table<ID, R> {
    Table::new(Arc::clone(store), Arc::clone(registry), prefix, channel)
}

/// Per-process entry point to the control store.
pub struct GcsClient {
    config: GcsConfig,
    client_id: ClientId,
    registry: Arc<CallbackRegistry>,
    store: Arc<dyn StoreClient>,
    object_table: ObjectTable,
    task_table: TaskTable,
    client_table: ClientTable,
    function_table: FunctionTable,
    class_table: ClassTable,
    actor_table: ActorTable,
    error_table: ErrorTable,
    custom_serializer_table: CustomSerializerTable,
    config_table: ConfigTable,
}

impl fmt::Debug for GcsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsClient")
            .field("client_id", &self.client_id)
            .field("config", &self.config)
            .field("pending", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl GcsClient {
    /// Create a client with a freshly minted ID.
    ///
    /// `registry` must be the dispatcher the `store` connection delivers
    /// replies to.
    pub fn new(
        config: GcsConfig,
        registry: Arc<CallbackRegistry>,
        store: Arc<dyn StoreClient>,
    ) -> Result<Self> {
        Self::with_entropy(config, registry, store, &OsEntropy)
    }

    /// Create a client whose ID is minted from `entropy`.
    pub fn with_entropy(
        config: GcsConfig,
        registry: Arc<CallbackRegistry>,
        store: Arc<dyn StoreClient>,
        entropy: &dyn EntropySource,
    ) -> Result<Self> {
        let client_id = ClientId::from_entropy(entropy)?;
        Self::with_client_id(config, registry, store, client_id)
    }

    /// Create a client with a caller-chosen ID.
    ///
    /// The ID must never have been used by another client.
    pub fn with_client_id(
        config: GcsConfig,
        registry: Arc<CallbackRegistry>,
        store: Arc<dyn StoreClient>,
        client_id: ClientId,
    ) -> Result<Self> {
        config.validate()?;
        let client = Self {
            object_table: ObjectTable::new(Arc::clone(&store), Arc::clone(&registry), client_id),
            task_table: TaskTable::new(Arc::clone(&store), Arc::clone(&registry), client_id),
            client_table: ClientTable::new(
                Arc::clone(&store),
                Arc::clone(&registry),
                client_id,
                config.node_ip_address.clone(),
                config.node_manager_port,
            ),
            function_table: plain(&store, &registry, TablePrefix::Function, TablePubsub::NoPublish),
            class_table: plain(&store, &registry, TablePrefix::Class, TablePubsub::NoPublish),
            actor_table: plain(&store, &registry, TablePrefix::Actor, TablePubsub::Actor),
            error_table: plain(&store, &registry, TablePrefix::Error, TablePubsub::NoPublish),
            custom_serializer_table: plain(
                &store,
                &registry,
                TablePrefix::CustomSerializer,
                TablePubsub::NoPublish,
            ),
            config_table: plain(&store, &registry, TablePrefix::Config, TablePubsub::NoPublish),
            config,
            client_id,
            registry,
            store,
        };
        info!(client = %client_id, "gcs client created");
        Ok(client)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &GcsConfig {
        &self.config
    }

    /// Returns the local client ID.
    #[must_use]
    pub const fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Returns the callback registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Returns the store connection.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StoreClient> {
        &self.store
    }

    /// Object locations and notifications.
    #[must_use]
    pub const fn object_table(&self) -> &ObjectTable {
        &self.object_table
    }

    /// Task scheduling records.
    #[must_use]
    pub const fn task_table(&self) -> &TaskTable {
        &self.task_table
    }

    /// Node membership.
    #[must_use]
    pub const fn client_table(&self) -> &ClientTable {
        &self.client_table
    }

    /// Exported remote functions.
    #[must_use]
    pub const fn function_table(&self) -> &FunctionTable {
        &self.function_table
    }

    /// Exported remote classes.
    #[must_use]
    pub const fn class_table(&self) -> &ClassTable {
        &self.class_table
    }

    /// Actor registrations.
    #[must_use]
    pub const fn actor_table(&self) -> &ActorTable {
        &self.actor_table
    }

    /// Errors pushed to drivers.
    #[must_use]
    pub const fn error_table(&self) -> &ErrorTable {
        &self.error_table
    }

    /// Custom serializers.
    #[must_use]
    pub const fn custom_serializer_table(&self) -> &CustomSerializerTable {
        &self.custom_serializer_table
    }

    /// Cluster configuration entries.
    #[must_use]
    pub const fn config_table(&self) -> &ConfigTable {
        &self.config_table
    }

    /// Drop one-shot requests that have waited longer than the configured
    /// `pending_request_timeout`. Their callbacks never run.
    ///
    /// Returns the expired handles; always empty when no timeout is set.
    pub fn expire_stale_requests(&self, now: Instant) -> Vec<CallbackHandle> {
        let Some(timeout) = self.config.pending_request_timeout else {
            return Vec::new();
        };
        let expired = self.registry.expire_stale(now, timeout);
        if !expired.is_empty() {
            warn!(client = %self.client_id, count = expired.len(), ?timeout, "expired stale requests");
        }
        expired
    }
}
