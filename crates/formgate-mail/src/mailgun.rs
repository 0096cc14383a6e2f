//! Mailgun provider over the messages API.

use crate::provider::{format_from, MailError, MailgunConfig, MailProvider};
use async_trait::async_trait;

#[derive(Debug)]
pub struct MailgunProvider {
    config: MailgunConfig,
    http: reqwest::Client,
}

impl MailgunProvider {
    pub fn new(config: MailgunConfig) -> Result<Self, MailError> {
        if config.api_key.is_empty() {
            return Err(MailError::InvalidConfig(
                "Mailgun API key is required".into(),
            ));
        }
        if config.domain.is_empty() {
            return Err(MailError::InvalidConfig(
                "Mailgun domain is required".into(),
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

    fn send_url(&self) -> String {
        format!(
            "https://api.mailgun.net/v3/{}/messages",
            self.config.domain
        )
    }
}

#[async_trait]
impl MailProvider for MailgunProvider {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), MailError> {
        let form = [
            ("from", format_from(&self.config.from_email, &self.config.from_name)),
            ("to", to.join(", ")),
            ("subject", subject.to_string()),
            ("text", text_body.to_string()),
            ("html", html_body.to_string()),
        ];

        let response = self
            .http
            .post(self.send_url())
            .basic_auth("api", Some(&self.config.api_key))
            .form(&form)
            .send()
            .await
            .map_err(|e| MailError::SendFailed(format!("Mailgun request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::SendFailed(format!(
                "Mailgun returned status {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "mailgun"
    }
}
