//! Shared resources handed to every worker.

use formgate_core::{AppError, CredentialCipher};
use formgate_db::CatalogRepository;
use formgate_storage::{ObjectStoreClient, TenantStorageCache, TenantStorageConfig};
use sqlx::PgPool;

/// Everything a worker needs: the platform pool, catalog lookups, the
/// credential cipher, and both storage paths (platform bucket and the
/// per-tenant client cache).
#[derive(Clone)]
pub struct WorkerContext {
    pub pool: PgPool,
    pub catalog: CatalogRepository,
    pub cipher: CredentialCipher,
    pub platform_storage: Option<ObjectStoreClient>,
    pub tenant_storage: TenantStorageCache,
}

impl WorkerContext {
    pub fn platform_storage(&self) -> Result<ObjectStoreClient, AppError> {
        self.platform_storage
            .clone()
            .ok_or_else(|| AppError::Storage("platform storage is not configured".to_string()))
    }

    /// Resolve a tenant's object-store client from their encrypted config.
    pub async fn tenant_storage_client(
        &self,
        tenant_id: &str,
    ) -> Result<ObjectStoreClient, AppError> {
        let conn = self
            .catalog
            .get_tenant_connection(tenant_id)
            .await?
            .ok_or_else(|| {
                AppError::Storage(format!("tenant {} has no connection record", tenant_id))
            })?;

        if !conn.has_byo_storage() {
            return Err(AppError::Storage(format!(
                "tenant {} has no storage configured",
                tenant_id
            )));
        }

        let config_json = self
            .cipher
            .decrypt(conn.storage_config_encrypted.as_deref().unwrap_or_default())?;
        let config: TenantStorageConfig = serde_json::from_str(&config_json)
            .map_err(|e| AppError::Storage(format!("invalid tenant storage config: {}", e)))?;

        Ok(self.tenant_storage.get_client(tenant_id, &config).await)
    }

    /// Pick the storage client for a job: tenant first when the job says
    /// `user`, with fallback to the platform bucket when the tenant client
    /// cannot be built.
    pub async fn storage_for(
        &self,
        provider: &str,
        tenant_id: Option<&str>,
    ) -> Result<ObjectStoreClient, AppError> {
        if provider == "user" {
            if let Some(tenant_id) = tenant_id {
                match self.tenant_storage_client(tenant_id).await {
                    Ok(client) => return Ok(client),
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            tenant_id = %tenant_id,
                            "Failed to get tenant storage client, falling back to platform storage"
                        );
                    }
                }
            }
        }
        self.platform_storage()
    }
}
