//! Rate-limited alerts to an external chat webhook.
//!
//! Delivery is fire-and-forget: a failed webhook call is logged and never
//! propagated. Alerts are limited to one per `(title, error_code)` pair per
//! five minutes so an outage does not flood the channel.

use formgate_core::{AppError, ErrorMetadata};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl Severity {
    fn glyph(&self) -> &'static str {
        match self {
            Severity::Critical => "\u{1F6A8}",
            Severity::Error => "\u{274C}",
            Severity::Warning => "\u{26A0}\u{FE0F}",
            Severity::Info => "\u{2139}\u{FE0F}",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub error_code: String,
    pub error: Option<String>,
    pub context: Vec<(String, String)>,
}

impl Alert {
    /// Build the standard infrastructure alert for a severe `AppError`.
    pub fn from_app_error(err: &AppError, context: Vec<(String, String)>) -> Self {
        let (title, description) = match err {
            AppError::Database(_) => (
                "Database Connection Error",
                "Database is unreachable or a query failed.",
            ),
            AppError::Storage(_) => (
                "Storage Service Error",
                "Object storage encountered an error.",
            ),
            AppError::Crypto(_) => (
                "Cryptography Error",
                "Credential decryption failed; a tenant may be mis-provisioned.",
            ),
            _ => ("Ingestion Error", "The submission pipeline hit an internal error."),
        };
        Alert {
            title: title.to_string(),
            description: description.to_string(),
            severity: Severity::Critical,
            error_code: err.error_code().to_string(),
            error: Some(err.detailed_message()),
            context,
        }
    }
}

#[derive(Clone)]
pub struct AlertSink {
    webhook_url: Option<String>,
    environment: String,
    http: reqwest::Client,
    recent: Arc<Mutex<HashMap<String, Instant>>>,
}

impl AlertSink {
    pub fn new(webhook_url: Option<String>, environment: String) -> Self {
        Self {
            webhook_url,
            environment,
            http: reqwest::Client::new(),
            recent: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// True when an alert with this key fired within the window. Records the
    /// attempt otherwise.
    fn is_rate_limited(&self, key: &str) -> bool {
        let mut recent = match self.recent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(last) = recent.get(key) {
            if last.elapsed() < RATE_LIMIT_WINDOW {
                return true;
            }
        }
        recent.insert(key.to_string(), Instant::now());
        false
    }

    /// Queue an alert for delivery. Returns immediately; delivery happens on
    /// a detached task.
    pub fn send(&self, alert: Alert) {
        let Some(webhook_url) = self.webhook_url.clone() else {
            return;
        };

        let key = format!("{}:{}", alert.title, alert.error_code);
        if self.is_rate_limited(&key) {
            tracing::debug!(key = %key, "Alert rate limited");
            return;
        }

        let http = self.http.clone();
        let environment = self.environment.clone();
        tokio::spawn(async move {
            let content = format_alert(&alert, &environment);
            let payload = serde_json::json!({ "content": content });

            match http.post(&webhook_url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    tracing::error!(
                        status = response.status().as_u16(),
                        "Alert webhook returned error"
                    );
                }
                Err(err) => {
                    tracing::error!(error = %err, "Failed to send alert");
                }
            }
        });
    }
}

fn format_alert(alert: &Alert, environment: &str) -> String {
    let mut message = String::new();
    message.push_str(&format!("{} **{}**\n", alert.severity.glyph(), alert.title));
    message.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    message.push_str(&alert.description);
    message.push_str("\n\n");
    message.push_str(&format!("**Severity:** {}\n", alert.severity.label()));
    message.push_str(&format!("**Environment:** {}\n", environment));
    message.push_str(&format!(
        "**Timestamp:** {}\n",
        chrono::Utc::now().to_rfc3339()
    ));
    message.push_str(&format!("**Error Code:** {}\n", alert.error_code));

    if !alert.context.is_empty() {
        message.push('\n');
        for (key, value) in &alert.context {
            message.push_str(&format!("**{}:** {}\n", key, value));
        }
    }

    if let Some(error) = &alert.error {
        message.push_str(&format!("\n**Error:** {}\n", error));
    }

    message.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    message.push_str("*Formgate Alert System*");
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(title: &str, code: &str) -> Alert {
        Alert {
            title: title.to_string(),
            description: "something broke".to_string(),
            severity: Severity::Critical,
            error_code: code.to_string(),
            error: None,
            context: vec![],
        }
    }

    #[test]
    fn rate_limits_per_title_and_code() {
        let sink = AlertSink::new(None, "test".to_string());
        assert!(!sink.is_rate_limited("Database Connection Error:DATABASE_ERROR"));
        assert!(sink.is_rate_limited("Database Connection Error:DATABASE_ERROR"));
        // A different pair is tracked independently
        assert!(!sink.is_rate_limited("Storage Service Error:STORAGE_ERROR"));
    }

    #[test]
    fn formats_context_and_error() {
        let mut a = alert("Storage Service Error", "STORAGE_ERROR");
        a.context.push(("Form ID".to_string(), "f1".to_string()));
        a.error = Some("bucket unreachable".to_string());
        let text = format_alert(&a, "production");
        assert!(text.contains("**Storage Service Error**"));
        assert!(text.contains("**Severity:** critical"));
        assert!(text.contains("**Environment:** production"));
        assert!(text.contains("**Form ID:** f1"));
        assert!(text.contains("**Error:** bucket unreachable"));
    }

    #[test]
    fn alert_from_app_error_maps_titles() {
        let err = AppError::from(sqlx::Error::PoolClosed);
        let a = Alert::from_app_error(&err, vec![]);
        assert_eq!(a.title, "Database Connection Error");
        assert_eq!(a.error_code, "DATABASE_ERROR");
        assert_eq!(a.severity, Severity::Critical);
    }

    #[test]
    fn severity_glyphs() {
        assert_eq!(Severity::Critical.glyph(), "🚨");
        assert_eq!(Severity::Error.glyph(), "❌");
        assert_eq!(Severity::Warning.glyph(), "⚠️");
        assert_eq!(Severity::Info.glyph(), "ℹ️");
    }
}
