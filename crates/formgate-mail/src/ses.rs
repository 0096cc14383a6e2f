//! AWS SES provider using the SESv2 SDK with static credentials.

use crate::provider::{format_from, AwsSesConfig, MailError, MailProvider};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};

#[derive(Debug)]
pub struct AwsSesProvider {
    client: aws_sdk_sesv2::Client,
    from: String,
}

impl AwsSesProvider {
    pub fn new(config: AwsSesConfig) -> Result<Self, MailError> {
        if config.access_key_id.is_empty() || config.secret_access_key.is_empty() {
            return Err(MailError::InvalidConfig(
                "AWS credentials are required".into(),
            ));
        }
        if config.region.is_empty() {
            return Err(MailError::InvalidConfig("AWS region is required".into()));
        }
        if config.from_email.is_empty() {
            return Err(MailError::InvalidConfig("from email is required".into()));
        }

        let credentials = aws_sdk_sesv2::config::Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "formgate-tenant-mail",
        );
        let sdk_config = aws_sdk_sesv2::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .build();

        Ok(Self {
            client: aws_sdk_sesv2::Client::from_conf(sdk_config),
            from: format_from(&config.from_email, &config.from_name),
        })
    }
}

fn content(data: &str) -> Result<Content, MailError> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| MailError::SendFailed(e.to_string()))
}

#[async_trait]
impl MailProvider for AwsSesProvider {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), MailError> {
        let destination = Destination::builder()
            .set_to_addresses(Some(to.to_vec()))
            .build();

        let body = Body::builder()
            .html(content(html_body)?)
            .text(content(text_body)?)
            .build();

        let message = Message::builder()
            .subject(content(subject)?)
            .body(body)
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| MailError::SendFailed(format!("AWS SES send failed: {}", e)))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "aws_ses"
    }
}
