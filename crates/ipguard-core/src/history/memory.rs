// # Memory History Store
//
// In-memory implementation of AddressHistoryStore.
//
// Nothing survives a restart. Useful for tests and for embedders that keep
// their own audit trail.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::endpoint::Endpoint;
use crate::traits::history_store::{AddressHistoryStore, HistoryStoreFactory};

/// In-memory history store
///
/// Clones share the same underlying list, so a test can keep a handle while
/// the monitor owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    inner: Arc<RwLock<Vec<IpAddr>>>,
}

impl MemoryHistoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded addresses
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl AddressHistoryStore for MemoryHistoryStore {
    async fn record(&self, address: IpAddr) -> Result<bool, Error> {
        let mut addresses = self.inner.write().await;
        if addresses.contains(&address) {
            return Ok(false);
        }
        addresses.push(address);
        Ok(true)
    }

    async fn read_all(&self) -> Result<Vec<IpAddr>, Error> {
        Ok(self.inner.read().await.clone())
    }
}

/// Hands out one shared [`MemoryHistoryStore`] per instance id
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStoreFactory {
    stores: Arc<std::sync::Mutex<HashMap<String, MemoryHistoryStore>>>,
}

impl MemoryHistoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store handed out for an instance id, if one was opened
    pub fn store_for(&self, instance_id: &str) -> Option<MemoryHistoryStore> {
        self.stores
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(instance_id)
            .cloned()
    }
}

#[async_trait]
impl HistoryStoreFactory for MemoryHistoryStoreFactory {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn AddressHistoryStore>, Error> {
        let store = self
            .stores
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(endpoint.instance_id.clone())
            .or_default()
            .clone();
        Ok(Box::new(store))
    }
}
