//! Tenant infrastructure connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which data plane a submission writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantMode {
    /// Tenant-provided database and storage.
    Byoi,
    /// Platform database under the free-trial quota.
    FreeTrial,
}

impl TenantMode {
    /// Label used in job args and metrics rows.
    pub fn provider_label(&self) -> &'static str {
        match self {
            TenantMode::Byoi => "user",
            TenantMode::FreeTrial => "platform",
        }
    }
}

/// Encrypted credentials and status for a tenant's own infrastructure.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantConnection {
    pub tenant_id: String,
    pub db_connection_string_encrypted: Option<String>,
    pub db_status: String,
    pub storage_config_encrypted: Option<String>,
    pub storage_status: String,
    pub spam_provider: String,
    pub spam_site_key: Option<String>,
    pub spam_secret_key_encrypted: Option<String>,
    pub email_provider: Option<String>,
    pub email_config_encrypted: Option<String>,
    pub email_status: String,
    pub email_last_checked_at: Option<DateTime<Utc>>,
    pub email_error: Option<String>,
    pub email_count_this_month: i32,
    pub email_count_reset_at: Option<DateTime<Utc>>,
    pub schema_initialized: bool,
}

impl TenantConnection {
    /// A tenant is in BYOI mode iff its database is connected and the schema
    /// has been initialized; anything else falls back to the free trial.
    pub fn mode(&self) -> TenantMode {
        if self.db_status == "connected" && self.schema_initialized {
            TenantMode::Byoi
        } else {
            TenantMode::FreeTrial
        }
    }

    /// Whether the tenant has a usable BYO mail provider configured.
    pub fn has_byo_mail(&self) -> bool {
        self.email_status == "connected"
            && self.email_provider.is_some()
            && self.email_config_encrypted.is_some()
    }

    /// Whether the tenant has a usable BYO object store configured.
    pub fn has_byo_storage(&self) -> bool {
        self.storage_status == "connected" && self.storage_config_encrypted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(db_status: &str, schema_initialized: bool) -> TenantConnection {
        TenantConnection {
            tenant_id: "t1".to_string(),
            db_connection_string_encrypted: Some("blob".to_string()),
            db_status: db_status.to_string(),
            storage_config_encrypted: None,
            storage_status: "not_configured".to_string(),
            spam_provider: String::new(),
            spam_site_key: None,
            spam_secret_key_encrypted: None,
            email_provider: None,
            email_config_encrypted: None,
            email_status: "not_configured".to_string(),
            email_last_checked_at: None,
            email_error: None,
            email_count_this_month: 0,
            email_count_reset_at: None,
            schema_initialized,
        }
    }

    #[test]
    fn byoi_requires_connected_and_initialized() {
        assert_eq!(connection("connected", true).mode(), TenantMode::Byoi);
        assert_eq!(connection("connected", false).mode(), TenantMode::FreeTrial);
        assert_eq!(connection("error", true).mode(), TenantMode::FreeTrial);
        assert_eq!(connection("pending", false).mode(), TenantMode::FreeTrial);
    }

    #[test]
    fn provider_labels() {
        assert_eq!(TenantMode::Byoi.provider_label(), "user");
        assert_eq!(TenantMode::FreeTrial.provider_label(), "platform");
    }
}
