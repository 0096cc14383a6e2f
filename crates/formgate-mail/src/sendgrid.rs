//! SendGrid provider over the v3 mail/send API.

use crate::provider::{MailError, MailProvider, SendGridConfig};
use async_trait::async_trait;
use serde_json::json;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug)]
pub struct SendGridProvider {
    config: SendGridConfig,
    http: reqwest::Client,
}

impl SendGridProvider {
    pub fn new(config: SendGridConfig) -> Result<Self, MailError> {
        if config.api_key.is_empty() {
            return Err(MailError::InvalidConfig(
                "SendGrid API key is required".into(),
            ));
        }
        if config.from_email.is_empty() {
            return Err(MailError::InvalidConfig("from email is required".into()));
        }
        Ok(Self {
            config,
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl MailProvider for SendGridProvider {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), MailError> {
        let tos: Vec<_> = to.iter().map(|r| json!({ "email": r })).collect();
        let payload = json!({
            "personalizations": [{ "to": tos }],
            "from": { "email": self.config.from_email, "name": self.config.from_name },
            "subject": subject,
            "content": [
                { "type": "text/plain", "value": text_body },
                { "type": "text/html", "value": html_body },
            ],
        });

        let response = self
            .http
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::SendFailed(format!(
                "SendGrid returned status {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}
