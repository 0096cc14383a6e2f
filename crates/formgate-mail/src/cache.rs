//! Per-tenant mail provider cache.
//!
//! Providers are cached to avoid repeated config parsing and client
//! construction, and recreated after 30 minutes so credential rotations are
//! picked up without a restart. `evict` drops an entry immediately when the
//! tenant changes their config.

use crate::factory::create_provider;
use crate::provider::{MailError, MailProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const PROVIDER_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const CLEANUP_TICK: Duration = Duration::from_secs(5 * 60);

struct CachedProvider {
    provider: Arc<dyn MailProvider>,
    created_at: Instant,
}

#[derive(Clone)]
pub struct MailProviderCache {
    providers: Arc<RwLock<HashMap<String, CachedProvider>>>,
}

impl Default for MailProviderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MailProviderCache {
    pub fn new() -> Self {
        let cache = Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
        };

        let providers = cache.providers.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(CLEANUP_TICK);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let mut guard = providers.write().await;
                guard.retain(|tenant_id, cached| {
                    let keep = cached.created_at.elapsed() < PROVIDER_CACHE_TTL;
                    if !keep {
                        tracing::debug!(tenant_id = %tenant_id, "Cleaned up stale mail provider");
                    }
                    keep
                });
            }
        });

        cache
    }

    /// Return the tenant's cached provider, building a fresh one when the
    /// entry is missing or older than the TTL.
    pub async fn get_provider(
        &self,
        tenant_id: &str,
        provider_type: &str,
        config_json: &str,
    ) -> Result<Arc<dyn MailProvider>, MailError> {
        {
            let providers = self.providers.read().await;
            if let Some(cached) = providers.get(tenant_id) {
                if cached.created_at.elapsed() < PROVIDER_CACHE_TTL {
                    return Ok(cached.provider.clone());
                }
            }
        }

        let provider = create_provider(provider_type, config_json)?;

        let mut providers = self.providers.write().await;
        providers.insert(
            tenant_id.to_string(),
            CachedProvider {
                provider: provider.clone(),
                created_at: Instant::now(),
            },
        );

        tracing::debug!(
            tenant_id = %tenant_id,
            provider = %provider_type,
            "Created new mail provider for tenant"
        );
        Ok(provider)
    }

    /// Drop a tenant's cached provider. Call when their mail config changes.
    pub async fn evict(&self, tenant_id: &str) {
        let mut providers = self.providers.write().await;
        if providers.remove(tenant_id).is_some() {
            tracing::debug!(tenant_id = %tenant_id, "Evicted cached mail provider");
        }
    }
}
