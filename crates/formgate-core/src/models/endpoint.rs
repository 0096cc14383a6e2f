//! Form endpoint routing tuple.

use serde::{Deserialize, Serialize};

/// The routing tuple mapping a public form id to a tenant and organization.
/// Owned by the catalog; read-only from the core.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FormEndpoint {
    pub form_id: String,
    pub tenant_id: String,
    pub organization_id: String,
    pub is_active: bool,
}
