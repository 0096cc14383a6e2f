//! Per-tenant object-store client cache.
//!
//! Entries are evicted after 30 minutes of idleness and can be dropped
//! explicitly when a tenant rotates their storage config. There is no ping on
//! construction; the first bucket operation surfaces bad credentials.

use crate::client::{ObjectStoreClient, TenantStorageConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const CLIENT_IDLE_TIMEOUT_SECS: i64 = 30 * 60;
const EVICTION_TICK: Duration = Duration::from_secs(60);

struct ClientEntry {
    client: ObjectStoreClient,
    last_accessed: AtomicI64,
}

impl ClientEntry {
    fn touch(&self) {
        self.last_accessed
            .fetch_max(chrono::Utc::now().timestamp(), Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub struct TenantStorageCache {
    clients: Arc<RwLock<HashMap<String, Arc<ClientEntry>>>>,
}

impl Default for TenantStorageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantStorageCache {
    pub fn new() -> Self {
        let cache = Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
        };

        let clients = cache.clients.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(EVICTION_TICK);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let now = chrono::Utc::now().timestamp();
                let mut guard = clients.write().await;
                guard.retain(|tenant_id, entry| {
                    let keep =
                        now - entry.last_accessed.load(Ordering::Relaxed) <= CLIENT_IDLE_TIMEOUT_SECS;
                    if !keep {
                        tracing::debug!(tenant_id = %tenant_id, "Evicted idle tenant storage client");
                    }
                    keep
                });
            }
        });

        cache
    }

    /// Return the tenant's client, building one from the decrypted config on
    /// miss. Double-checked insert keeps at most one live client per tenant.
    pub async fn get_client(
        &self,
        tenant_id: &str,
        config: &TenantStorageConfig,
    ) -> ObjectStoreClient {
        {
            let clients = self.clients.read().await;
            if let Some(entry) = clients.get(tenant_id) {
                entry.touch();
                return entry.client.clone();
            }
        }

        let mut clients = self.clients.write().await;
        if let Some(entry) = clients.get(tenant_id) {
            entry.touch();
            return entry.client.clone();
        }

        let client = ObjectStoreClient::from_tenant_config(config);
        clients.insert(
            tenant_id.to_string(),
            Arc::new(ClientEntry {
                client: client.clone(),
                last_accessed: AtomicI64::new(chrono::Utc::now().timestamp()),
            }),
        );

        tracing::debug!(tenant_id = %tenant_id, "Created new tenant storage client");
        client
    }

    /// Drop a tenant's cached client. Call when their storage config changes.
    pub async fn evict(&self, tenant_id: &str) {
        let mut clients = self.clients.write().await;
        if clients.remove(tenant_id).is_some() {
            tracing::debug!(tenant_id = %tenant_id, "Evicted tenant storage client");
        }
    }

    /// Drop every cached client. Call on server shutdown.
    pub async fn close_all(&self) {
        self.clients.write().await.clear();
    }
}
