//! Provider construction from a decrypted config blob.
//!
//! Dynamic dispatch by provider name happens here, once, at construction;
//! everything downstream sees only the `MailProvider` trait.

use crate::mailgun::MailgunProvider;
use crate::provider::{
    AwsSesConfig, MailError, MailProvider, MailgunConfig, ResendConfig, SendGridConfig, SmtpConfig,
};
use crate::resend::ResendProvider;
use crate::sendgrid::SendGridProvider;
use crate::ses::AwsSesProvider;
use crate::smtp::SmtpProvider;
use std::sync::Arc;

fn parse<T: serde::de::DeserializeOwned>(provider: &str, config_json: &str) -> Result<T, MailError> {
    serde_json::from_str(config_json)
        .map_err(|e| MailError::InvalidConfig(format!("invalid {} config: {}", provider, e)))
}

/// Build a provider from its type name and decrypted JSON config.
/// `provider_type` is one of `smtp`, `sendgrid`, `resend`, `mailgun`,
/// `aws_ses`.
pub fn create_provider(
    provider_type: &str,
    config_json: &str,
) -> Result<Arc<dyn MailProvider>, MailError> {
    match provider_type {
        "smtp" => {
            let config: SmtpConfig = parse("SMTP", config_json)?;
            Ok(Arc::new(SmtpProvider::new(config)?))
        }
        "sendgrid" => {
            let config: SendGridConfig = parse("SendGrid", config_json)?;
            Ok(Arc::new(SendGridProvider::new(config)?))
        }
        "resend" => {
            let config: ResendConfig = parse("Resend", config_json)?;
            Ok(Arc::new(ResendProvider::new(config)?))
        }
        "mailgun" => {
            let config: MailgunConfig = parse("Mailgun", config_json)?;
            Ok(Arc::new(MailgunProvider::new(config)?))
        }
        "aws_ses" => {
            let config: AwsSesConfig = parse("AWS SES", config_json)?;
            Ok(Arc::new(AwsSesProvider::new(config)?))
        }
        other => Err(MailError::InvalidConfig(format!(
            "unknown email provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_rejected() {
        let err = create_provider("carrier-pigeon", "{}").unwrap_err();
        assert!(matches!(err, MailError::InvalidConfig(_)));
        assert!(err.to_string().contains("unknown email provider"));
    }

    #[test]
    fn sendgrid_requires_api_key() {
        let err = create_provider("sendgrid", r#"{"fromEmail":"a@x.io","apiKey":""}"#).unwrap_err();
        assert!(matches!(err, MailError::InvalidConfig(_)));
    }

    #[test]
    fn mailgun_built_from_wire_config() {
        let provider = create_provider(
            "mailgun",
            r#"{"fromEmail":"no@x.io","fromName":"Acme","apiKey":"key-1","domain":"mg.x.io"}"#,
        )
        .unwrap();
        assert_eq!(provider.name(), "mailgun");
    }

    #[test]
    fn resend_built_from_wire_config() {
        let provider =
            create_provider("resend", r#"{"fromEmail":"no@x.io","apiKey":"re_123"}"#).unwrap();
        assert_eq!(provider.name(), "resend");
    }

    #[test]
    fn malformed_config_rejected() {
        let err = create_provider("smtp", "not json").unwrap_err();
        assert!(matches!(err, MailError::InvalidConfig(_)));
    }
}
