//! Read-only queries and counter mutators on the platform routing catalog.
//!
//! The catalog tables (`formEndpoint`, `connection`, `organization`) are owned
//! by the surrounding product; this repository only reads them, except for the
//! platform email counter whose updates are expressed as single conditional
//! statements so they stay atomic under concurrent submissions.

use formgate_core::models::{FormEndpoint, TenantConnection};
use formgate_core::AppError;
use sqlx::PgPool;

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Look up form routing information by form id.
    pub async fn get_form_endpoint(
        &self,
        form_id: &str,
    ) -> Result<Option<FormEndpoint>, AppError> {
        let endpoint = sqlx::query_as::<_, FormEndpoint>(
            r#"
            SELECT "formId" AS form_id,
                   "tenantId" AS tenant_id,
                   "organizationId" AS organization_id,
                   "isActive" AS is_active
            FROM "formEndpoint"
            WHERE "formId" = $1
            "#,
        )
        .bind(form_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(endpoint)
    }

    /// Fetch a tenant's infrastructure connection credentials. A missing row
    /// means the tenant runs in free-trial mode.
    pub async fn get_tenant_connection(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TenantConnection>, AppError> {
        let conn = sqlx::query_as::<_, TenantConnection>(
            r#"
            SELECT "tenantId" AS tenant_id,
                   "dbConnectionStringEncrypted" AS db_connection_string_encrypted,
                   "dbStatus" AS db_status,
                   "storageConfigEncrypted" AS storage_config_encrypted,
                   "storageStatus" AS storage_status,
                   "spamProvider" AS spam_provider,
                   "spamSiteKey" AS spam_site_key,
                   "spamSecretKeyEncrypted" AS spam_secret_key_encrypted,
                   "emailProvider" AS email_provider,
                   "emailConfigEncrypted" AS email_config_encrypted,
                   "emailStatus" AS email_status,
                   "emailLastCheckedAt" AS email_last_checked_at,
                   "emailError" AS email_error,
                   "emailCountThisMonth" AS email_count_this_month,
                   "emailCountResetAt" AS email_count_reset_at,
                   "schemaInitialized" AS schema_initialized
            FROM "connection"
            WHERE "tenantId" = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conn)
    }

    /// Whether an organization has been paused by the platform.
    pub async fn is_organization_paused(&self, org_id: &str) -> Result<bool, AppError> {
        let paused: Option<bool> =
            sqlx::query_scalar(r#"SELECT "isPaused" FROM "organization" WHERE id = $1"#)
                .bind(org_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(paused.unwrap_or(false))
    }

    /// Atomically increment the platform email counter for a tenant,
    /// resetting the 30-day window first when it has lapsed.
    pub async fn increment_platform_email_count(&self, tenant_id: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE "connection"
            SET "emailCountThisMonth" = CASE
                WHEN "emailCountResetAt" IS NULL OR "emailCountResetAt" <= NOW()
                THEN 1
                ELSE "emailCountThisMonth" + 1
            END,
            "emailCountResetAt" = CASE
                WHEN "emailCountResetAt" IS NULL OR "emailCountResetAt" <= NOW()
                THEN NOW() + INTERVAL '30 days'
                ELSE "emailCountResetAt"
            END,
            "updatedAt" = NOW()
            WHERE "tenantId" = $1
            "#,
        )
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Current platform email count for a tenant; a lapsed window reads as 0.
    pub async fn get_platform_email_count(&self, tenant_id: &str) -> Result<i32, AppError> {
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT CASE
                WHEN "emailCountResetAt" IS NULL OR "emailCountResetAt" <= NOW()
                THEN 0
                ELSE "emailCountThisMonth"
            END
            FROM "connection"
            WHERE "tenantId" = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.unwrap_or(0))
    }
}
