//! Service lifecycle
//!
//! The store, cache and webhook dispatcher are created once at startup and
//! handed to the bot by handle. `init` and `shutdown` bracket their lifetime.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, MemcachedCache, MemoryCache};
use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::partition::BlobPartitioner;
use crate::store::{Datastore, DocumentStore, FileStore, MemoryStore};
use crate::webhook::{HttpDispatcher, WebhookDispatcher};

/// Long-lived backing services shared by all command handlers
#[derive(Clone)]
pub struct Services {
    pub store: Datastore,
    pub cache: Arc<dyn Cache>,
    pub webhook: Arc<dyn WebhookDispatcher>,
}

impl Services {
    /// Open every backing service described by `config`
    pub fn init(config: &Config) -> Result<Self> {
        let partitioner = BlobPartitioner::new(config.partition_limit)?;

        let backend: Arc<dyn DocumentStore> = match config.store_backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory document store; data is lost on exit");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::File => {
                let root = config.data_dir.join(config.store_namespace());
                Arc::new(FileStore::open(root)?)
            }
        };
        tracing::info!("Document store startup ({:?})", config.store_backend);

        let cache: Arc<dyn Cache> = match &config.cache_endpoint {
            Some(endpoint) => Arc::new(MemcachedCache::connect(
                endpoint.clone(),
                config.cache_credentials.clone(),
                Duration::from_millis(config.cache_timeout_ms),
            )?),
            None => {
                tracing::info!("No cache endpoint configured; using in-memory cache");
                Arc::new(MemoryCache::new())
            }
        };
        tracing::info!("Cache startup");

        let webhook = Arc::new(HttpDispatcher::new(Duration::from_millis(
            config.webhook_timeout_ms,
        ))?);

        Ok(Self::new(Datastore::new(backend, partitioner), cache, webhook))
    }

    /// Assemble services from parts
    pub fn new(
        store: Datastore,
        cache: Arc<dyn Cache>,
        webhook: Arc<dyn WebhookDispatcher>,
    ) -> Self {
        Self {
            store,
            cache,
            webhook,
        }
    }

    /// Volatile services with the given webhook dispatcher
    pub fn in_memory(partitioner: BlobPartitioner, webhook: Arc<dyn WebhookDispatcher>) -> Self {
        Self::new(
            Datastore::new(Arc::new(MemoryStore::new()), partitioner),
            Arc::new(MemoryCache::new()),
            webhook,
        )
    }

    /// Release the services
    ///
    /// Connections close when the last handle drops; records are already
    /// durable once each write returns.
    pub fn shutdown(self) {
        tracing::info!("Services shutting down");
        drop(self);
    }
}
