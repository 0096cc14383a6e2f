//! Per-tenant database connection pool cache.
//!
//! Pools are cached per tenant and evicted after 30 minutes of idleness. The
//! read path takes a shared guard and bumps the last-access stamp; the write
//! path re-checks membership under the exclusive guard, and holds it across
//! construction, so there is at most one live pool per tenant.

use formgate_core::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const MAX_CONNS_PER_TENANT: u32 = 5;
const MIN_CONNS_PER_TENANT: u32 = 1;
const CONN_LIFETIME: Duration = Duration::from_secs(3600);
const CONN_IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const POOL_IDLE_TIMEOUT_SECS: i64 = 30 * 60;
const EVICTION_TICK: Duration = Duration::from_secs(60);

struct PoolEntry {
    pool: PgPool,
    /// Unix seconds of the last lookup; bumped monotonically.
    last_accessed: AtomicI64,
}

impl PoolEntry {
    fn touch(&self) {
        self.last_accessed
            .fetch_max(chrono::Utc::now().timestamp(), Ordering::Relaxed);
    }
}

/// Cache of per-tenant connection pools with idle eviction.
#[derive(Clone)]
pub struct TenantPoolCache {
    pools: Arc<RwLock<HashMap<String, Arc<PoolEntry>>>>,
}

impl Default for TenantPoolCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantPoolCache {
    /// Create the cache and start its background sweeper.
    pub fn new() -> Self {
        let cache = Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
        };

        let pools = cache.pools.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(EVICTION_TICK);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                Self::evict_idle(&pools).await;
            }
        });

        cache
    }

    /// Return a pool for the tenant, creating one from the supplied connection
    /// string on miss. Construction pings the database once and fails if the
    /// ping fails.
    pub async fn get_pool(&self, tenant_id: &str, conn_string: &str) -> Result<PgPool, AppError> {
        {
            let pools = self.pools.read().await;
            if let Some(entry) = pools.get(tenant_id) {
                entry.touch();
                return Ok(entry.pool.clone());
            }
        }

        let mut pools = self.pools.write().await;
        // Double-check after acquiring the exclusive guard
        if let Some(entry) = pools.get(tenant_id) {
            entry.touch();
            return Ok(entry.pool.clone());
        }

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNS_PER_TENANT)
            .min_connections(MIN_CONNS_PER_TENANT)
            .max_lifetime(CONN_LIFETIME)
            .idle_timeout(CONN_IDLE_TIMEOUT)
            .connect(conn_string)
            .await?;

        if let Err(err) = sqlx::query("SELECT 1").execute(&pool).await {
            pool.close().await;
            return Err(err.into());
        }

        let entry = Arc::new(PoolEntry {
            pool: pool.clone(),
            last_accessed: AtomicI64::new(chrono::Utc::now().timestamp()),
        });
        pools.insert(tenant_id.to_string(), entry);

        tracing::debug!(tenant_id = %tenant_id, "Created new tenant database pool");
        Ok(pool)
    }

    async fn evict_idle(pools: &Arc<RwLock<HashMap<String, Arc<PoolEntry>>>>) {
        let now = chrono::Utc::now().timestamp();
        let expired: Vec<(String, Arc<PoolEntry>)> = {
            let mut guard = pools.write().await;
            let keys: Vec<String> = guard
                .iter()
                .filter(|(_, e)| now - e.last_accessed.load(Ordering::Relaxed) > POOL_IDLE_TIMEOUT_SECS)
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| guard.remove_entry(&k))
                .collect()
        };

        for (tenant_id, entry) in expired {
            entry.pool.close().await;
            tracing::debug!(tenant_id = %tenant_id, "Evicted idle tenant database pool");
        }
    }

    /// Number of live cached pools.
    pub async fn len(&self) -> usize {
        self.pools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pools.read().await.is_empty()
    }

    /// Close and drop all pools. Call on server shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<(String, Arc<PoolEntry>)> = {
            let mut guard = self.pools.write().await;
            guard.drain().collect()
        };
        for (_, entry) in drained {
            entry.pool.close().await;
        }
        tracing::info!("All tenant database pools closed");
    }
}
