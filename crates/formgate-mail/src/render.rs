//! Notification rendering: subject, HTML body, and plain-text fallback for a
//! new-submission email.
//!
//! Field keys beginning with `_` are internal and never rendered. Every
//! user-supplied string is HTML-escaped before it reaches the HTML body.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A file reference rendered into the attachments block.
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub name: String,
    pub url: String,
    pub size: i64,
}

/// Everything the renderer needs about one submission.
#[derive(Debug, Clone)]
pub struct SubmissionNotification {
    pub form_id: String,
    pub form_name: String,
    pub submission_id: String,
    pub organization_id: String,
    pub form_data: serde_json::Map<String, Value>,
    pub files: Vec<FileAttachment>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RenderedNotification {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Render the notification email for a submission.
pub fn render(app_url: &str, data: &SubmissionNotification) -> RenderedNotification {
    RenderedNotification {
        subject: format!("New submission: {}", data.form_name),
        html_body: build_html(app_url, data),
        text_body: build_text(app_url, data),
    }
}

/// Dashboard deep link to the specific submission.
pub fn dashboard_url(app_url: &str, data: &SubmissionNotification) -> String {
    format!(
        "{}/spaces/{}/forms/{}?submission={}",
        app_url.trim_end_matches('/'),
        data.organization_id,
        data.form_id,
        data.submission_id
    )
}

fn visible_fields(data: &SubmissionNotification) -> Vec<(String, String)> {
    data.form_data
        .iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, value)| (humanize_field_name(key), format_value(value)))
        .collect()
}

fn build_html(app_url: &str, data: &SubmissionNotification) -> String {
    let fields = visible_fields(data);
    let mut fields_html = String::new();
    for (i, (key, value)) in fields.iter().enumerate() {
        let border = if i == fields.len() - 1 {
            ""
        } else {
            "border-bottom: 1px solid #e5e7eb;"
        };
        fields_html.push_str(&format!(
            r#"<tr>
    <td style="padding: 12px 16px; {border} color: #6b7280; font-weight: 500; width: 140px; vertical-align: top;">{key}</td>
    <td style="padding: 12px 16px; {border} color: #111827;">{value}</td>
</tr>
"#,
            border = border,
            key = escape_html(key),
            value = escape_html(value),
        ));
    }

    let mut attachments_html = String::new();
    if !data.files.is_empty() {
        let mut items = String::new();
        for file in &data.files {
            items.push_str(&format!(
                r#"<li style="margin-bottom: 8px;"><a href="{url}" style="color: #2563eb; text-decoration: none;">{name}</a> <span style="color: #9ca3af; font-size: 12px;">({size})</span></li>
"#,
                url = escape_html(&file.url),
                name = escape_html(&file.name),
                size = format_file_size(file.size),
            ));
        }
        attachments_html = format!(
            r#"<div style="margin-top: 24px; padding: 16px; background-color: #f9fafb; border-radius: 8px;">
    <h3 style="margin: 0 0 12px 0; font-size: 14px; font-weight: 600; color: #374151;">Attachments</h3>
    <ul style="margin: 0; padding-left: 20px; color: #374151;">{items}</ul>
</div>"#,
            items = items,
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="margin: 0; padding: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f3f4f6;">
    <div style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
        <div style="background-color: #ffffff; border-radius: 12px; overflow: hidden; box-shadow: 0 1px 3px rgba(0,0,0,0.1);">
            <div style="padding: 24px 32px; border-bottom: 1px solid #e5e7eb;">
                <h1 style="margin: 0; font-size: 20px; font-weight: 600; color: #111827;">New submission: {form_name}</h1>
            </div>
            <div style="padding: 24px 32px;">
                <table style="width: 100%; border-collapse: collapse;">
{fields_html}                </table>
                {attachments_html}
            </div>
            <div style="padding: 24px 32px; background-color: #f9fafb; border-top: 1px solid #e5e7eb;">
                <p style="margin: 0 0 16px 0; font-size: 13px; color: #6b7280;">Submitted on {timestamp}</p>
                <a href="{dashboard}" style="display: inline-block; padding: 10px 20px; background-color: #2563eb; color: #ffffff; text-decoration: none; border-radius: 6px; font-size: 14px; font-weight: 500;">View in Dashboard</a>
            </div>
        </div>
    </div>
</body>
</html>
"#,
        form_name = escape_html(&data.form_name),
        fields_html = fields_html,
        attachments_html = attachments_html,
        timestamp = format_timestamp(data.submitted_at),
        dashboard = dashboard_url(app_url, data),
    )
}

fn build_text(app_url: &str, data: &SubmissionNotification) -> String {
    let mut text = String::new();
    text.push_str(&format!("New submission: {}\n\n", data.form_name));
    text.push_str("--- Form Data ---\n\n");

    for (key, value) in visible_fields(data) {
        text.push_str(&format!("{}: {}\n", key, value));
    }

    if !data.files.is_empty() {
        text.push_str("\n--- Attachments ---\n\n");
        for file in &data.files {
            text.push_str(&format!("- {}: {}\n", file.name, file.url));
        }
    }

    text.push_str(&format!(
        "\nSubmitted: {}\n",
        format_timestamp(data.submitted_at)
    ));
    text.push_str(&format!(
        "\nView in Dashboard: {}\n",
        dashboard_url(app_url, data)
    ));

    text
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%b %-d, %Y at %-I:%M %p").to_string()
}

/// Humanize a field key: `user_email` and `userEmail` both become
/// `User Email`.
pub fn humanize_field_name(name: &str) -> String {
    let spaced = name.replace(['_', '-'], " ");

    let mut split = String::with_capacity(spaced.len() + 4);
    for (i, c) in spaced.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            split.push(' ');
        }
        split.push(c);
    }

    split
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stringify a form value for display. Whole numbers drop the trailing `.0`,
/// booleans become Yes/No, arrays comma-join recursively.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 {
                    format!("{}", f as i64)
                } else {
                    format!("{:.2}", f)
                }
            } else {
                n.to_string()
            }
        }
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Array(items) => items
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Minimal HTML escaping for user-supplied strings.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Human readable file size (1024-based).
pub fn format_file_size(bytes: i64) -> String {
    const UNIT: i64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, ['K', 'M', 'G', 'T', 'P', 'E'][exp])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notification(data: serde_json::Map<String, Value>) -> SubmissionNotification {
        SubmissionNotification {
            form_id: "f1".to_string(),
            form_name: "Contact Us".to_string(),
            submission_id: "s1".to_string(),
            organization_id: "o1".to_string(),
            form_data: data,
            files: vec![],
            submitted_at: DateTime::parse_from_rfc3339("2025-06-01T15:04:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    fn map(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn humanize_cases() {
        assert_eq!(humanize_field_name("user_email"), "User Email");
        assert_eq!(humanize_field_name("first-name"), "First Name");
        assert_eq!(humanize_field_name("camelCaseKey"), "Camel Case Key");
        assert_eq!(humanize_field_name("message"), "Message");
    }

    #[test]
    fn format_value_cases() {
        assert_eq!(format_value(&json!("hi")), "hi");
        assert_eq!(format_value(&json!(42)), "42");
        assert_eq!(format_value(&json!(42.0)), "42");
        assert_eq!(format_value(&json!(3.14159)), "3.14");
        assert_eq!(format_value(&json!(true)), "Yes");
        assert_eq!(format_value(&json!(false)), "No");
        assert_eq!(format_value(&json!(["a", 1, true])), "a, 1, Yes");
        assert_eq!(format_value(&Value::Null), "");
    }

    #[test]
    fn escape_html_cases() {
        assert_eq!(
            escape_html(r#"<script>alert("x&y')</script>"#),
            "&lt;script&gt;alert(&quot;x&amp;y&#39;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn hidden_fields_are_skipped() {
        let data = map(&[
            ("message", json!("hello")),
            ("_internal_tag", json!("secret-routing")),
        ]);
        let rendered = render("https://app.example.com", &notification(data));
        assert!(rendered.html_body.contains("hello"));
        assert!(!rendered.html_body.contains("secret-routing"));
        assert!(!rendered.text_body.contains("secret-routing"));
    }

    #[test]
    fn user_strings_are_escaped_in_html() {
        let data = map(&[("message", json!("<img src=x onerror=alert(1)>"))]);
        let rendered = render("https://app.example.com", &notification(data));
        assert!(!rendered.html_body.contains("<img src=x"));
        assert!(rendered.html_body.contains("&lt;img src=x"));
        // Plain text is left as-is
        assert!(rendered.text_body.contains("<img src=x"));
    }

    #[test]
    fn dashboard_link_shape() {
        let rendered = render("https://app.example.com/", &notification(map(&[])));
        assert!(rendered
            .html_body
            .contains("https://app.example.com/spaces/o1/forms/f1?submission=s1"));
        assert!(rendered
            .text_body
            .contains("https://app.example.com/spaces/o1/forms/f1?submission=s1"));
    }

    #[test]
    fn subject_carries_form_name() {
        let rendered = render("https://app.example.com", &notification(map(&[])));
        assert_eq!(rendered.subject, "New submission: Contact Us");
    }

    #[test]
    fn attachments_render_with_sizes() {
        let mut n = notification(map(&[]));
        n.files.push(FileAttachment {
            name: "cv.pdf".to_string(),
            url: "https://cdn.example.com/cv.pdf".to_string(),
            size: 2048,
        });
        let rendered = render("https://app.example.com", &n);
        assert!(rendered.html_body.contains("Attachments"));
        assert!(rendered.html_body.contains("cv.pdf"));
        assert!(rendered.html_body.contains("(2.0 KB)"));
        assert!(rendered.text_body.contains("- cv.pdf: https://cdn.example.com/cv.pdf"));
    }
}
