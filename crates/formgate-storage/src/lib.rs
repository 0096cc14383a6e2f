//! Formgate Storage Library
//!
//! S3-compatible object storage for submission files: the upload/list/delete
//! adapter, the per-tenant client cache, and upload validation.
//!
//! # Storage key format
//!
//! Every submission file lives under
//! `submissions/{formId}/{submissionId}/{safeName}-{shortId}{ext}`. The form
//! and submission segments never contain `/`, so the orphan scanner can
//! recover them from the first two path segments.

pub mod cache;
pub mod client;
pub mod error;
pub mod keys;
pub mod validate;

pub use cache::TenantStorageCache;
pub use client::{
    DeleteResult, IncomingFile, ListObjectsPage, ListedObject, ObjectStoreClient,
    TenantStorageConfig,
};
pub use error::{StorageError, StorageResult};
pub use validate::FileValidationConfig;
