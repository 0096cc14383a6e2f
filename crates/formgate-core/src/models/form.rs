//! Per-form configuration, fetched from the tenant's database in BYOI mode or
//! the platform database in free-trial mode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FormConfig {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub allow_file_uploads: bool,
    pub max_file_count: Option<i32>,
    pub max_file_size: Option<i32>,
    /// JSON array of allowed MIME types, stored as text.
    pub allowed_file_types: Option<String>,
    pub spam_check_enabled: bool,
    pub honeypot_field_name: Option<String>,
    pub webhook_url: Option<String>,
    pub send_email_notifications: bool,
    /// JSON array of addresses or a comma-separated list.
    pub notification_emails: Option<String>,
    /// `json` or `redirect`.
    pub response_type: String,
    pub redirect_url: Option<String>,
    pub success_message: Option<String>,
    pub organization_id: String,
}

impl FormConfig {
    /// Parsed MIME allowlist; `None` or unparseable text means no restriction.
    pub fn allowed_mime_types(&self) -> Vec<String> {
        self.allowed_file_types
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(allowed: Option<&str>) -> FormConfig {
        FormConfig {
            id: "f1".to_string(),
            name: "Contact".to_string(),
            is_active: true,
            allow_file_uploads: true,
            max_file_count: None,
            max_file_size: None,
            allowed_file_types: allowed.map(String::from),
            spam_check_enabled: false,
            honeypot_field_name: None,
            webhook_url: None,
            send_email_notifications: false,
            notification_emails: None,
            response_type: "json".to_string(),
            redirect_url: None,
            success_message: None,
            organization_id: "o1".to_string(),
        }
    }

    #[test]
    fn allowed_mime_types_parses_json_array() {
        let f = form(Some(r#"["image/png","application/pdf"]"#));
        assert_eq!(f.allowed_mime_types(), vec!["image/png", "application/pdf"]);
    }

    #[test]
    fn allowed_mime_types_empty_when_absent_or_invalid() {
        assert!(form(None).allowed_mime_types().is_empty());
        assert!(form(Some("not json")).allowed_mime_types().is_empty());
    }
}
