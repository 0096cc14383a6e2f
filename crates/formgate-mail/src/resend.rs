//! Resend provider over the emails API.

use crate::provider::{format_from, MailError, MailProvider, ResendConfig};
use async_trait::async_trait;
use serde_json::json;

const RESEND_SEND_URL: &str = "https://api.resend.com/emails";

#[derive(Debug)]
pub struct ResendProvider {
    config: ResendConfig,
    http: reqwest::Client,
}

impl ResendProvider {
    pub fn new(config: ResendConfig) -> Result<Self, MailError> {
        if config.api_key.is_empty() {
            return Err(MailError::InvalidConfig(
                "Resend API key is required".into(),
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
impl MailProvider for ResendProvider {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), MailError> {
        let payload = json!({
            "from": format_from(&self.config.from_email, &self.config.from_name),
            "to": to,
            "subject": subject,
            "html": html_body,
            "text": text_body,
        });

        let response = self
            .http
            .post(RESEND_SEND_URL)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailError::SendFailed(format!("Resend request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::SendFailed(format!(
                "Resend returned status {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}
