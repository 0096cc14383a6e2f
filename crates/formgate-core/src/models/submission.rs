//! Submission record and uploaded-file shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file staged in object storage for a submission.
///
/// Serialized into the submission row's `files` JSON column; the field names
/// are a wire contract with the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub path: String,
    pub url: String,
    pub size: i64,
    pub content_type: String,
}

/// A fully assembled submission, ready for its single INSERT.
///
/// The id and timestamp are allocated once in the pipeline and fixed for the
/// remainder of the request; `created_at` and `updated_at` both take
/// `submitted_at`.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub id: Uuid,
    pub form_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub data: serde_json::Value,
    pub files: Option<serde_json::Value>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub is_spam: bool,
    pub spam_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploaded_file_wire_shape() {
        let file = UploadedFile {
            id: "a1b2c3d4".to_string(),
            name: "resume.pdf".to_string(),
            path: "submissions/f1/s1/resume-a1b2c3d4.pdf".to_string(),
            url: "https://cdn.example.com/submissions/f1/s1/resume-a1b2c3d4.pdf".to_string(),
            size: 1024,
            content_type: "application/pdf".to_string(),
        };
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["id"], "a1b2c3d4");
        assert_eq!(json["content_type"], "application/pdf");
        assert!(json.get("contentType").is_none());
    }
}
