//! Remote CAPTCHA verification against Turnstile, reCAPTCHA, and hCaptcha.

use serde::Deserialize;
use std::time::Duration;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

const TURNSTILE_ENDPOINT: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";
const RECAPTCHA_ENDPOINT: &str = "https://www.google.com/recaptcha/api/siteverify";
const HCAPTCHA_ENDPOINT: &str = "https://api.hcaptcha.com/siteverify";

/// Verification outcome. `error` explains every non-success.
#[derive(Debug, Clone)]
pub struct CaptchaOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl CaptchaOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

pub fn endpoint_for(provider: &str) -> Option<&'static str> {
    match provider {
        "turnstile" => Some(TURNSTILE_ENDPOINT),
        "recaptcha" => Some(RECAPTCHA_ENDPOINT),
        "hcaptcha" => Some(HCAPTCHA_ENDPOINT),
        _ => None,
    }
}

#[derive(Clone)]
pub struct CaptchaVerifier {
    http: reqwest::Client,
}

impl Default for CaptchaVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptchaVerifier {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(VERIFY_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// POST the token to the provider's siteverify endpoint and parse the
    /// `{success, error-codes}` response.
    pub async fn verify(
        &self,
        provider: &str,
        secret_key: &str,
        token: &str,
        remote_ip: &str,
    ) -> CaptchaOutcome {
        if token.is_empty() {
            return CaptchaOutcome::failure("missing captcha token");
        }

        let Some(endpoint) = endpoint_for(provider) else {
            return CaptchaOutcome::failure(format!("unknown captcha provider: {}", provider));
        };

        let mut form = vec![("secret", secret_key), ("response", token)];
        if !remote_ip.is_empty() {
            form.push(("remoteip", remote_ip));
        }

        let response = match self.http.post(endpoint).form(&form).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, provider = %provider, "CAPTCHA verification request failed");
                return CaptchaOutcome::failure("captcha verification request failed");
            }
        };

        let parsed: SiteverifyResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::error!(error = %err, provider = %provider, "Failed to parse CAPTCHA response");
                return CaptchaOutcome::failure("invalid captcha response format");
            }
        };

        if !parsed.success {
            let message = if parsed.error_codes.is_empty() {
                "captcha verification failed".to_string()
            } else {
                format!("captcha failed: {}", parsed.error_codes.join(", "))
            };
            tracing::info!(
                provider = %provider,
                errors = ?parsed.error_codes,
                "CAPTCHA verification failed"
            );
            return CaptchaOutcome::failure(message);
        }

        CaptchaOutcome {
            success: true,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_per_provider() {
        assert_eq!(
            endpoint_for("turnstile"),
            Some("https://challenges.cloudflare.com/turnstile/v0/siteverify")
        );
        assert_eq!(
            endpoint_for("recaptcha"),
            Some("https://www.google.com/recaptcha/api/siteverify")
        );
        assert_eq!(
            endpoint_for("hcaptcha"),
            Some("https://api.hcaptcha.com/siteverify")
        );
        assert_eq!(endpoint_for("honeypot"), None);
        assert_eq!(endpoint_for(""), None);
    }

    #[test]
    fn siteverify_response_shapes() {
        let ok: SiteverifyResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(ok.success);
        assert!(ok.error_codes.is_empty());

        let failed: SiteverifyResponse = serde_json::from_str(
            r#"{"success": false, "error-codes": ["timeout-or-duplicate", "invalid-input-secret"]}"#,
        )
        .unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error_codes.len(), 2);

        // Missing fields default to a non-success
        let empty: SiteverifyResponse = serde_json::from_str("{}").unwrap();
        assert!(!empty.success);
    }

    #[tokio::test]
    async fn empty_token_short_circuits() {
        let verifier = CaptchaVerifier::new();
        let outcome = verifier.verify("turnstile", "secret", "", "1.2.3.4").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("missing captcha token"));
    }

    #[tokio::test]
    async fn unknown_provider_short_circuits() {
        let verifier = CaptchaVerifier::new();
        let outcome = verifier.verify("akismet", "secret", "tok", "").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("unknown captcha provider"));
    }
}
