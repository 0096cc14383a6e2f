//! Storage key construction and parsing.
//!
//! Key format: `submissions/{formId}/{submissionId}/{safeName}-{shortId}{ext}`.
//! All backends use this shape; the orphan scanner depends on the first two
//! segments being `/`-free.

use rand::Rng;

pub const SUBMISSIONS_PREFIX: &str = "submissions/";

/// Replace characters that are unsafe in object keys with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

/// Random 8-character hex suffix to disambiguate same-named uploads.
pub fn short_id() -> String {
    let bytes: [u8; 4] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Build the object key for a submission file. The sanitized stem gets the
/// short id appended before the original extension.
pub fn submission_file_key(
    form_id: &str,
    submission_id: &str,
    filename: &str,
    suffix: &str,
) -> String {
    let safe = sanitize_filename(filename);
    let (stem, ext) = match safe.rfind('.') {
        Some(idx) if idx > 0 => safe.split_at(idx),
        _ => (safe.as_str(), ""),
    };
    format!(
        "submissions/{}/{}/{}-{}{}",
        form_id, submission_id, stem, suffix, ext
    )
}

/// Prefix covering every file of one submission.
pub fn submission_prefix(form_id: &str, submission_id: &str) -> String {
    format!("submissions/{}/{}/", form_id, submission_id)
}

/// Prefix covering every file of one form.
pub fn form_prefix(form_id: &str) -> String {
    format!("submissions/{}/", form_id)
}

/// Parse `submissions/{formId}/{submissionId}/...` back into its segments.
/// Returns `None` for keys that do not match the canonical shape.
pub fn parse_submission_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix(SUBMISSIONS_PREFIX)?;
    let mut parts = rest.splitn(3, '/');
    let form_id = parts.next().filter(|s| !s.is_empty())?;
    let submission_id = parts.next().filter(|s| !s.is_empty())?;
    parts.next().filter(|s| !s.is_empty())?;
    Some((form_id, submission_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(
            sanitize_filename(r#"my file/with\bad:chars*?"<>|.pdf"#),
            "my_file_with_bad_chars______.pdf"
        );
        assert_eq!(sanitize_filename("clean-name.txt"), "clean-name.txt");
    }

    #[test]
    fn key_shape_preserves_extension() {
        let key = submission_file_key("f1", "s1", "annual report.pdf", "a1b2c3d4");
        assert_eq!(key, "submissions/f1/s1/annual_report-a1b2c3d4.pdf");
    }

    #[test]
    fn key_shape_without_extension() {
        let key = submission_file_key("f1", "s1", "README", "deadbeef");
        assert_eq!(key, "submissions/f1/s1/README-deadbeef");
    }

    #[test]
    fn hidden_file_keeps_leading_dot() {
        // A leading dot is a hidden-file marker, not an extension separator.
        let key = submission_file_key("f1", "s1", ".env", "cafebabe");
        assert_eq!(key, "submissions/f1/s1/.env-cafebabe");
    }

    #[test]
    fn short_id_is_eight_hex_chars() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parse_round_trip() {
        let key = submission_file_key("form-9", "0b5c…-uuid", "a.txt", "11223344");
        let (form_id, submission_id) = parse_submission_key(&key).unwrap();
        assert_eq!(form_id, "form-9");
        assert_eq!(submission_id, "0b5c…-uuid");
    }

    #[test]
    fn parse_rejects_foreign_keys() {
        assert!(parse_submission_key("logos/brand.png").is_none());
        assert!(parse_submission_key("submissions/only-form").is_none());
        assert!(parse_submission_key("submissions/f1/s1").is_none());
        assert!(parse_submission_key("submissions//s1/file").is_none());
    }

    #[test]
    fn prefixes() {
        assert_eq!(submission_prefix("f1", "s1"), "submissions/f1/s1/");
        assert_eq!(form_prefix("f1"), "submissions/f1/");
    }
}
