//! Application state: the composition root handed to every handler.
//!
//! All process-wide resources (platform pool, tenant caches, alert sink, job
//! queue) are constructed once in `setup::initialize_app` and passed through
//! handlers explicitly rather than living as ambient globals.

use crate::alerts::AlertSink;
use crate::captcha::CaptchaVerifier;
use formgate_core::{Config, CredentialCipher};
use formgate_db::{CatalogRepository, TenantPoolCache};
use formgate_mail::{MailProvider, MailProviderCache};
use formgate_storage::{ObjectStoreClient, TenantStorageCache};
use formgate_worker::JobQueue;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub platform_pool: PgPool,
    pub catalog: CatalogRepository,
    pub cipher: CredentialCipher,
    pub tenant_pools: TenantPoolCache,
    pub tenant_storage: TenantStorageCache,
    pub mail_providers: MailProviderCache,
    pub platform_storage: Option<ObjectStoreClient>,
    pub platform_mail: Option<Arc<dyn MailProvider>>,
    /// Shared key-value store for rate limiting and the spam IP blocklist.
    /// `None` when unreachable at startup; both consumers fail open.
    pub redis: Option<redis::aio::ConnectionManager>,
    pub captcha: CaptchaVerifier,
    pub alerts: AlertSink,
    pub job_queue: JobQueue,
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
