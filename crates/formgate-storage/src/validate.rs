//! Upload validation: file count, per-file size, MIME allowlist.

use crate::error::{StorageError, StorageResult};

pub const DEFAULT_MAX_FILE_SIZE: i64 = 2 * 1024 * 1024;
pub const DEFAULT_MAX_FILE_COUNT: usize = 3;

/// Per-form validation settings, built from the form's upload policy.
#[derive(Debug, Clone)]
pub struct FileValidationConfig {
    pub max_file_size: i64,
    pub max_file_count: usize,
    /// Empty means no restriction. Entries like `image/*` match any subtype.
    pub allowed_mime_types: Vec<String>,
}

impl Default for FileValidationConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
            allowed_mime_types: Vec::new(),
        }
    }
}

impl FileValidationConfig {
    pub fn check_count(&self, count: usize) -> StorageResult<()> {
        if count > self.max_file_count {
            return Err(StorageError::ValidationFailed(format!(
                "too many files: {} (max {})",
                count, self.max_file_count
            )));
        }
        Ok(())
    }

    pub fn check_file(&self, filename: &str, size: i64, content_type: &str) -> StorageResult<()> {
        if size > self.max_file_size {
            return Err(StorageError::ValidationFailed(format!(
                "file {} too large: {} bytes (max {})",
                filename, size, self.max_file_size
            )));
        }
        if !self.allowed_mime_types.is_empty() && !is_allowed_mime(content_type, &self.allowed_mime_types)
        {
            return Err(StorageError::ValidationFailed(format!(
                "file type not allowed: {}",
                content_type
            )));
        }
        Ok(())
    }
}

/// Case-insensitive MIME match with `type/*` wildcard support. Parameters
/// like `; charset=utf-8` are stripped before comparison.
fn is_allowed_mime(content_type: &str, allowed: &[String]) -> bool {
    let ct = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    allowed.iter().any(|a| {
        let a = a.trim().to_ascii_lowercase();
        if let Some(prefix) = a.strip_suffix("/*") {
            ct.starts_with(&format!("{}/", prefix))
        } else {
            ct == a
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(allowed: &[&str]) -> FileValidationConfig {
        FileValidationConfig {
            allowed_mime_types: allowed.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let cfg = FileValidationConfig::default();
        assert_eq!(cfg.max_file_size, 2 * 1024 * 1024);
        assert_eq!(cfg.max_file_count, 3);
        assert!(cfg.allowed_mime_types.is_empty());
    }

    #[test]
    fn count_boundary() {
        let cfg = FileValidationConfig::default();
        assert!(cfg.check_count(3).is_ok());
        assert!(cfg.check_count(4).is_err());
    }

    #[test]
    fn size_boundary() {
        let cfg = FileValidationConfig::default();
        assert!(cfg.check_file("a.bin", 2 * 1024 * 1024, "application/octet-stream").is_ok());
        assert!(cfg
            .check_file("a.bin", 2 * 1024 * 1024 + 1, "application/octet-stream")
            .is_err());
    }

    #[test]
    fn mime_exact_and_wildcard() {
        let cfg = config(&["image/*", "application/pdf"]);
        assert!(cfg.check_file("p.png", 10, "image/png").is_ok());
        assert!(cfg.check_file("d.pdf", 10, "application/pdf").is_ok());
        assert!(cfg.check_file("d.pdf", 10, "APPLICATION/PDF").is_ok());
        assert!(cfg
            .check_file("d.pdf", 10, "application/pdf; charset=binary")
            .is_ok());
        assert!(cfg.check_file("x.exe", 10, "application/x-msdownload").is_err());
    }

    #[test]
    fn empty_allowlist_means_unrestricted() {
        let cfg = config(&[]);
        assert!(cfg.check_file("x.exe", 10, "application/x-msdownload").is_ok());
    }
}
