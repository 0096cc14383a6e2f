//! Application setup: construction of the composition root, routes, and
//! teardown.

pub mod database;
pub mod routes;
pub mod server;

use crate::alerts::AlertSink;
use crate::captcha::CaptchaVerifier;
use crate::state::AppState;
use anyhow::{Context, Result};
use formgate_core::{Config, CredentialCipher};
use formgate_db::{CatalogRepository, TenantPoolCache};
use formgate_mail::{create_provider, MailProvider, MailProviderCache};
use formgate_storage::{ObjectStoreClient, TenantStorageCache};
use formgate_worker::{start_retention_scheduler, JobQueue, JobQueueConfig, WorkerContext};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Build every process-wide resource, start the job queue and scheduler, and
/// assemble the router.
pub async fn initialize_app(
    config: Config,
) -> Result<(Arc<AppState>, axum::Router, JoinHandle<()>)> {
    let cipher = CredentialCipher::from_env().context("loading ENCRYPTION_KEY")?;

    let platform_pool = database::setup_platform_pool(&config).await?;
    let catalog = CatalogRepository::new(platform_pool.clone());

    let tenant_pools = TenantPoolCache::new();
    let tenant_storage = TenantStorageCache::new();
    let mail_providers = MailProviderCache::new();

    let platform_storage = config.platform_storage().map(|s| {
        tracing::info!(bucket = %s.bucket, provider = %s.provider, "Platform storage configured");
        ObjectStoreClient::new(
            &s.provider,
            &s.endpoint,
            &s.access_key_id,
            &s.secret_access_key,
            &s.bucket,
            &s.public_url,
            Some(&s.region),
        )
    });

    let platform_mail = build_platform_mail(&config);

    let redis = connect_redis(&config).await;

    let alerts = AlertSink::new(
        config.alert_webhook_url().map(String::from),
        config.environment().to_string(),
    );

    let worker_context = Arc::new(WorkerContext {
        pool: platform_pool.clone(),
        catalog: catalog.clone(),
        cipher: cipher.clone(),
        platform_storage: platform_storage.clone(),
        tenant_storage: tenant_storage.clone(),
    });
    let job_queue = JobQueue::start(
        platform_pool.clone(),
        worker_context,
        JobQueueConfig::default(),
    )
    .await?;

    let scheduler = start_retention_scheduler(
        job_queue.clone(),
        config.retention_hour(),
        config.retention_days(),
        config.retention_batch_size(),
    );

    let state = Arc::new(AppState {
        platform_pool,
        catalog,
        cipher,
        tenant_pools,
        tenant_storage,
        mail_providers,
        platform_storage,
        platform_mail,
        redis,
        captcha: CaptchaVerifier::new(),
        alerts,
        job_queue,
        config,
    });

    let router = routes::build_router(state.clone());

    Ok((state, router, scheduler))
}

fn build_platform_mail(config: &Config) -> Option<Arc<dyn MailProvider>> {
    let mail = config.platform_mail()?;
    let config_json = serde_json::json!({
        "fromEmail": mail.from_email,
        "fromName": mail.from_name,
        "apiKey": mail.api_key,
        "domain": mail.domain,
    })
    .to_string();

    match create_provider(&mail.provider, &config_json) {
        Ok(provider) => {
            tracing::info!(provider = %mail.provider, "Platform mail provider initialized");
            Some(provider)
        }
        Err(err) => {
            tracing::error!(error = %err, provider = %mail.provider, "Failed to build platform mail provider");
            None
        }
    }
}

async fn connect_redis(config: &Config) -> Option<redis::aio::ConnectionManager> {
    let client = match redis::Client::open(config.redis_url()) {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(error = %err, "Invalid REDIS_URL; rate limiting and blocklist disabled");
            return None;
        }
    };

    match redis::aio::ConnectionManager::new(client).await {
        Ok(manager) => {
            tracing::info!("Connected to key-value store");
            Some(manager)
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                "Key-value store unreachable; rate limiting and blocklist disabled"
            );
            None
        }
    }
}

/// Release process-wide resources after the serve loop drains.
pub async fn shutdown(state: &Arc<AppState>) {
    state.job_queue.shutdown();
    state.tenant_pools.close_all().await;
    state.tenant_storage.close_all().await;
    state.platform_pool.close().await;
    tracing::info!("Shutdown complete");
}
