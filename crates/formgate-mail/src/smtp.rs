//! SMTP provider via lettre.

use crate::provider::{MailError, MailProvider, SmtpConfig};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

const DEFAULT_SUBMISSION_PORT: u16 = 587;

#[derive(Debug)]
pub struct SmtpProvider {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> Result<Self, MailError> {
        if config.host.is_empty() {
            return Err(MailError::InvalidConfig("SMTP host is required".into()));
        }
        if config.from_email.is_empty() {
            return Err(MailError::InvalidConfig("from email is required".into()));
        }
        let port = if config.port == 0 {
            DEFAULT_SUBMISSION_PORT
        } else {
            config.port
        };

        let from = build_mailbox(&config.from_name, &config.from_email)?;

        // secure -> implicit TLS (465); otherwise STARTTLS (587/25)
        let mut builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::InvalidConfig(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailError::InvalidConfig(e.to_string()))?
        };
        builder = builder.port(port);
        if !config.username.is_empty() && !config.password.is_empty() {
            builder = builder.credentials(Credentials::new(config.username, config.password));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

fn build_mailbox(name: &str, email: &str) -> Result<Mailbox, MailError> {
    let address = email
        .parse()
        .map_err(|_| MailError::InvalidConfig(format!("invalid from address: {}", email)))?;
    let display = if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    };
    Ok(Mailbox::new(display, address))
}

#[async_trait]
impl MailProvider for SmtpProvider {
    async fn send(
        &self,
        to: &[String],
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), MailError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        let mut valid = 0;
        for recipient in to {
            if let Ok(mailbox) = recipient.parse::<Mailbox>() {
                builder = builder.to(mailbox);
                valid += 1;
            }
        }
        if valid == 0 {
            return Err(MailError::SendFailed(
                "no valid recipient addresses".to_string(),
            ));
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(
                text_body.to_string(),
                html_body.to_string(),
            ))
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
