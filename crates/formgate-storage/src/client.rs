//! S3-compatible object store adapter.
//!
//! One client per bucket, parameterized with static credentials and a custom
//! endpoint so the same adapter serves the platform bucket and every
//! tenant-provided store (R2, S3, Backblaze, GCS in S3 mode).

use crate::error::{StorageError, StorageResult};
use crate::keys;
use crate::validate::FileValidationConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use formgate_core::models::UploadedFile;
use serde::Deserialize;

const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Batch-delete page size per storage provider.
pub fn provider_batch_limit(provider: &str) -> i32 {
    match provider {
        "r2" | "s3" => 1000,
        "backblaze" | "gcs" => 100,
        _ => 100,
    }
}

/// Tenant storage credentials, decrypted from the connection row.
/// Field names are the wire contract with the provisioning dashboard.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantStorageConfig {
    #[serde(default)]
    pub provider: Option<String>,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    #[serde(default)]
    pub public_url: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// A file carried in from the multipart request, pending upload.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// One object returned from a listing page.
#[derive(Debug, Clone)]
pub struct ListedObject {
    pub key: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsPage {
    pub objects: Vec<ListedObject>,
    pub next_token: Option<String>,
    pub truncated: bool,
}

/// Outcome of a batch delete sweep. `error` is set only when a listing or
/// delete call fails at the transport layer; per-object failures are counted
/// in `items_failed` and logged.
#[derive(Debug, Clone, Default)]
pub struct DeleteResult {
    pub items_deleted: i32,
    pub items_failed: i32,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct ObjectStoreClient {
    client: Client,
    bucket: String,
    public_url: String,
    provider: String,
}

impl ObjectStoreClient {
    pub fn new(
        provider: &str,
        endpoint: &str,
        access_key_id: &str,
        secret_access_key: &str,
        bucket: &str,
        public_url: &str,
        region: Option<&str>,
    ) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "formgate-storage",
        );
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.unwrap_or("auto").to_string()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
            provider: provider.to_string(),
        }
    }

    pub fn from_tenant_config(config: &TenantStorageConfig) -> Self {
        Self::new(
            config.provider.as_deref().unwrap_or("r2"),
            &config.endpoint,
            &config.access_key_id,
            &config.secret_access_key,
            &config.bucket,
            &config.public_url,
            config.region.as_deref(),
        )
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a single submission file. The key carries a sanitized filename
    /// plus a random 8-character suffix.
    pub async fn upload_file(
        &self,
        form_id: &str,
        submission_id: &str,
        filename: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<UploadedFile> {
        let suffix = keys::short_id();
        let key = keys::submission_file_key(form_id, submission_id, filename, &suffix);
        let size = data.len() as i64;
        let content_type = if content_type.is_empty() {
            "application/octet-stream"
        } else {
            content_type
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .cache_control(CACHE_CONTROL)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "Object upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            form_id = %form_id,
            submission_id = %submission_id,
            key = %key,
            size_bytes = size,
            "File uploaded"
        );

        Ok(UploadedFile {
            id: suffix,
            name: filename.to_string(),
            path: key.clone(),
            url: format!("{}/{}", self.public_url, key),
            size,
            content_type: content_type.to_string(),
        })
    }

    /// Validate and upload a batch of files for one submission. On any
    /// validation or upload failure, files already uploaded for this
    /// submission are deleted before the error is returned.
    pub async fn upload_files(
        &self,
        form_id: &str,
        submission_id: &str,
        files: &[IncomingFile],
        config: &FileValidationConfig,
    ) -> StorageResult<Vec<UploadedFile>> {
        config.check_count(files.len())?;

        let mut uploaded: Vec<UploadedFile> = Vec::with_capacity(files.len());
        for file in files {
            if let Err(err) =
                config.check_file(&file.name, file.bytes.len() as i64, &file.content_type)
            {
                self.rollback_uploads(&uploaded).await;
                return Err(err);
            }

            match self
                .upload_file(
                    form_id,
                    submission_id,
                    &file.name,
                    &file.content_type,
                    file.bytes.clone(),
                )
                .await
            {
                Ok(info) => uploaded.push(info),
                Err(err) => {
                    self.rollback_uploads(&uploaded).await;
                    return Err(err);
                }
            }
        }

        Ok(uploaded)
    }

    async fn rollback_uploads(&self, uploaded: &[UploadedFile]) {
        for file in uploaded {
            if let Err(err) = self.delete(&file.path).await {
                tracing::warn!(error = %err, key = %file.path, "Failed to clean up partial upload");
            }
        }
    }

    /// List one page of objects under a prefix.
    pub async fn list(
        &self,
        prefix: &str,
        max_keys: i32,
        continuation_token: Option<String>,
    ) -> StorageResult<ListObjectsPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                let size = obj.size().unwrap_or(0);
                let last_modified = obj
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), 0))
                    .unwrap_or_else(Utc::now);
                Some(ListedObject {
                    key,
                    size,
                    last_modified,
                })
            })
            .collect();

        Ok(ListObjectsPage {
            objects,
            next_token: output.next_continuation_token().map(String::from),
            truncated: output.is_truncated().unwrap_or(false),
        })
    }

    /// Delete a single object.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, key = %key, "Failed to delete object");
                StorageError::DeleteFailed(e.to_string())
            })?;

        tracing::info!(key = %key, "Object deleted");
        Ok(())
    }

    /// Paged list-then-batch-delete of everything under a prefix. Per-object
    /// failures are counted and logged but do not abort the sweep.
    pub async fn delete_by_prefix(&self, prefix: &str) -> DeleteResult {
        let mut result = DeleteResult::default();
        let batch_size = provider_batch_limit(&self.provider);
        let mut continuation_token: Option<String> = None;

        loop {
            let page = match self.list(prefix, batch_size, continuation_token.clone()).await {
                Ok(page) => page,
                Err(err) => {
                    result.error = Some(format!(
                        "failed to list objects with prefix {}: {}",
                        prefix, err
                    ));
                    return result;
                }
            };

            if page.objects.is_empty() {
                break;
            }

            let identifiers: Result<Vec<ObjectIdentifier>, _> = page
                .objects
                .iter()
                .map(|obj| ObjectIdentifier::builder().key(&obj.key).build())
                .collect();
            let identifiers = match identifiers {
                Ok(ids) => ids,
                Err(err) => {
                    result.error = Some(format!("failed to build delete request: {}", err));
                    return result;
                }
            };
            let requested = identifiers.len() as i32;

            let delete = match Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
            {
                Ok(delete) => delete,
                Err(err) => {
                    result.error = Some(format!("failed to build delete request: {}", err));
                    return result;
                }
            };

            match self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
            {
                Ok(output) => {
                    let failed = output.errors().len() as i32;
                    result.items_deleted += requested - failed;
                    result.items_failed += failed;
                    for err in output.errors() {
                        tracing::warn!(
                            key = err.key().unwrap_or(""),
                            code = err.code().unwrap_or(""),
                            message = err.message().unwrap_or(""),
                            "Failed to delete object in batch"
                        );
                    }
                }
                Err(err) => {
                    result.error = Some(format!("failed to delete objects: {}", err));
                    return result;
                }
            }

            if !page.truncated {
                break;
            }
            continuation_token = page.next_token;
        }

        result
    }

    /// Delete all files belonging to a single submission.
    pub async fn delete_submission_files(&self, form_id: &str, submission_id: &str) -> DeleteResult {
        self.delete_by_prefix(&keys::submission_prefix(form_id, submission_id))
            .await
    }

    /// Delete all files belonging to a form.
    pub async fn delete_form_files(&self, form_id: &str) -> DeleteResult {
        self.delete_by_prefix(&keys::form_prefix(form_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_batch_limits() {
        assert_eq!(provider_batch_limit("r2"), 1000);
        assert_eq!(provider_batch_limit("s3"), 1000);
        assert_eq!(provider_batch_limit("backblaze"), 100);
        assert_eq!(provider_batch_limit("gcs"), 100);
        assert_eq!(provider_batch_limit("minio"), 100);
    }

    #[test]
    fn tenant_config_wire_shape() {
        let config: TenantStorageConfig = serde_json::from_str(
            r#"{
                "endpoint": "https://abc.r2.cloudflarestorage.com",
                "accessKeyId": "AK",
                "secretAccessKey": "SK",
                "bucket": "tenant-uploads",
                "publicUrl": "https://cdn.tenant.example",
                "region": "auto"
            }"#,
        )
        .unwrap();
        assert_eq!(config.bucket, "tenant-uploads");
        assert_eq!(config.region.as_deref(), Some("auto"));
        assert!(config.provider.is_none());
    }

    #[test]
    fn tenant_config_minimal() {
        let config: TenantStorageConfig = serde_json::from_str(
            r#"{
                "endpoint": "https://s3.us-east-1.amazonaws.com",
                "accessKeyId": "AK",
                "secretAccessKey": "SK",
                "bucket": "b"
            }"#,
        )
        .unwrap();
        assert_eq!(config.public_url, "");
        assert!(config.region.is_none());
    }
}
