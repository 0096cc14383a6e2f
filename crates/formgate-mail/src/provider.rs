//! Mail provider abstraction and the per-variant config shapes.
//!
//! Config JSON is decrypted from the tenant's connection row; field names are
//! the wire contract with the provisioning dashboard (camelCase).

use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mail config: {0}")]
    InvalidConfig(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Uniform send contract for all five providers. Dispatch by provider name
/// happens at construction only (see `factory`).
#[async_trait]
pub trait MailProvider: Send + Sync + std::fmt::Debug {
    /// Send one message to all recipients, with an HTML body and a plain-text
    /// fallback.
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), MailError>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpConfig {
    pub from_email: String,
    #[serde(default)]
    pub from_name: String,
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// true for implicit TLS (465), false for STARTTLS (587/25).
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendGridConfig {
    pub from_email: String,
    #[serde(default)]
    pub from_name: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendConfig {
    pub from_email: String,
    #[serde(default)]
    pub from_name: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailgunConfig {
    pub from_email: String,
    #[serde(default)]
    pub from_name: String,
    pub api_key: String,
    pub domain: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSesConfig {
    pub from_email: String,
    #[serde(default)]
    pub from_name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

/// `From:` header value: `Name <email>` when a display name is configured.
pub fn format_from(from_email: &str, from_name: &str) -> String {
    if from_name.is_empty() {
        from_email.to_string()
    } else {
        format!("{} <{}>", from_name, from_email)
    }
}

/// Parse a form's `notificationEmails` value: either a JSON array of strings
/// or a comma-separated list. Blank entries are dropped.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    let parsed: Vec<String> = match serde_json::from_str::<Vec<String>>(raw) {
        Ok(list) => list,
        Err(_) => raw.split(',').map(String::from).collect(),
    };

    parsed
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_from_json_array() {
        let recipients = parse_recipients(r#"["a@x.io", "b@x.io"]"#);
        assert_eq!(recipients, vec!["a@x.io", "b@x.io"]);
    }

    #[test]
    fn recipients_from_comma_list() {
        let recipients = parse_recipients("a@x.io, b@x.io ,, c@x.io");
        assert_eq!(recipients, vec!["a@x.io", "b@x.io", "c@x.io"]);
    }

    #[test]
    fn recipients_empty_input() {
        assert!(parse_recipients("").is_empty());
        assert!(parse_recipients("[]").is_empty());
        assert!(parse_recipients(" , ").is_empty());
    }

    #[test]
    fn from_header_formats() {
        assert_eq!(format_from("no@x.io", ""), "no@x.io");
        assert_eq!(format_from("no@x.io", "Acme"), "Acme <no@x.io>");
    }

    #[test]
    fn smtp_config_wire_shape() {
        let config: SmtpConfig = serde_json::from_str(
            r#"{
                "provider": "smtp",
                "fromEmail": "no@x.io",
                "fromName": "Acme",
                "host": "smtp.x.io",
                "port": 465,
                "username": "u",
                "password": "p",
                "secure": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.host, "smtp.x.io");
        assert_eq!(config.port, 465);
        assert!(config.secure);
    }

    #[test]
    fn ses_config_wire_shape() {
        let config: AwsSesConfig = serde_json::from_str(
            r#"{
                "provider": "aws_ses",
                "fromEmail": "no@x.io",
                "accessKeyId": "AK",
                "secretAccessKey": "SK",
                "region": "eu-west-1"
            }"#,
        )
        .unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.from_name, "");
    }
}
