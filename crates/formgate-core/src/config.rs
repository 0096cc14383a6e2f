//! Configuration module
//!
//! Environment-driven configuration for the ingestion plane. Everything comes
//! from env vars (dotenv-loaded in development); `Config::from_env` fails fast
//! on missing required values so misconfiguration surfaces at startup.

use std::env;

const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 3;
const DEFAULT_RETENTION_DAYS: i32 = 14;
const DEFAULT_RETENTION_BATCH_SIZE: i32 = 100;
const DEFAULT_RETENTION_HOUR: u32 = 3;
const DEFAULT_TRUSTED_PROXY_COUNT: usize = 1;

/// Load `.env` if present. Call once at startup, before reading config.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Platform object-storage settings (the bucket free-trial submissions land in).
#[derive(Clone, Debug)]
pub struct PlatformStorageConfig {
    pub provider: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub public_url: String,
    pub region: String,
}

/// Platform mail settings used for the free fallback path (monthly-capped).
#[derive(Clone, Debug)]
pub struct PlatformMailConfig {
    pub provider: String,
    pub api_key: String,
    pub domain: String,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    environment: String,
    server_port: u16,
    platform_database_url: String,
    db_max_connections: u32,
    db_min_connections: u32,
    redis_url: String,
    app_url: String,
    admin_api_key: Option<String>,
    alert_webhook_url: Option<String>,
    platform_storage: Option<PlatformStorageConfig>,
    platform_mail: Option<PlatformMailConfig>,
    retention_days: i32,
    retention_batch_size: i32,
    retention_hour: u32,
    trusted_proxy_count: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let platform_database_url = env_opt("PLATFORM_DATABASE_URL")
            .or_else(|| env_opt("DATABASE_URL"))
            .ok_or_else(|| {
                anyhow::anyhow!("PLATFORM_DATABASE_URL (or DATABASE_URL) is not set")
            })?;

        let platform_storage = match (
            env_opt("PLATFORM_STORAGE_ENDPOINT"),
            env_opt("PLATFORM_STORAGE_ACCESS_KEY_ID"),
            env_opt("PLATFORM_STORAGE_SECRET_ACCESS_KEY"),
            env_opt("PLATFORM_STORAGE_BUCKET"),
        ) {
            (Some(endpoint), Some(access_key_id), Some(secret_access_key), Some(bucket)) => {
                Some(PlatformStorageConfig {
                    provider: env_opt("PLATFORM_STORAGE_PROVIDER")
                        .unwrap_or_else(|| "r2".to_string()),
                    public_url: env_opt("PLATFORM_STORAGE_PUBLIC_URL").unwrap_or_default(),
                    region: env_opt("PLATFORM_STORAGE_REGION")
                        .unwrap_or_else(|| "auto".to_string()),
                    endpoint,
                    access_key_id,
                    secret_access_key,
                    bucket,
                })
            }
            _ => None,
        };

        let platform_mail = match (
            env_opt("PLATFORM_MAIL_API_KEY"),
            env_opt("PLATFORM_MAIL_DOMAIN"),
        ) {
            (Some(api_key), Some(domain)) => Some(PlatformMailConfig {
                provider: env_opt("PLATFORM_MAIL_PROVIDER")
                    .unwrap_or_else(|| "mailgun".to_string()),
                from_email: env_opt("PLATFORM_MAIL_FROM_EMAIL")
                    .unwrap_or_else(|| format!("noreply@{}", domain)),
                from_name: env_opt("PLATFORM_MAIL_FROM_NAME")
                    .unwrap_or_else(|| "Formgate".to_string()),
                api_key,
                domain,
            }),
            _ => None,
        };

        Ok(Self {
            environment: env_opt("APP_ENV").unwrap_or_else(|| "development".to_string()),
            server_port: env_parse("PORT", DEFAULT_SERVER_PORT),
            platform_database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            db_min_connections: env_parse("DB_MIN_CONNECTIONS", DEFAULT_DB_MIN_CONNECTIONS),
            redis_url: env_opt("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
            app_url: env_opt("APP_URL").unwrap_or_else(|| "https://formgate.io".to_string()),
            admin_api_key: env_opt("ADMIN_API_KEY"),
            alert_webhook_url: env_opt("ALERT_WEBHOOK_URL"),
            platform_storage,
            platform_mail,
            retention_days: env_parse("RETENTION_DAYS", DEFAULT_RETENTION_DAYS),
            retention_batch_size: env_parse("RETENTION_BATCH_SIZE", DEFAULT_RETENTION_BATCH_SIZE),
            retention_hour: env_parse("RETENTION_HOUR", DEFAULT_RETENTION_HOUR),
            trusted_proxy_count: env_parse("TRUSTED_PROXY_COUNT", DEFAULT_TRUSTED_PROXY_COUNT),
        })
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn platform_database_url(&self) -> &str {
        &self.platform_database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    pub fn db_min_connections(&self) -> u32 {
        self.db_min_connections
    }

    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }

    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    pub fn admin_api_key(&self) -> Option<&str> {
        self.admin_api_key.as_deref()
    }

    pub fn alert_webhook_url(&self) -> Option<&str> {
        self.alert_webhook_url.as_deref()
    }

    pub fn platform_storage(&self) -> Option<&PlatformStorageConfig> {
        self.platform_storage.as_ref()
    }

    pub fn platform_mail(&self) -> Option<&PlatformMailConfig> {
        self.platform_mail.as_ref()
    }

    pub fn retention_days(&self) -> i32 {
        self.retention_days
    }

    pub fn retention_batch_size(&self) -> i32 {
        self.retention_batch_size
    }

    pub fn retention_hour(&self) -> u32 {
        self.retention_hour
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.trusted_proxy_count
    }
}
