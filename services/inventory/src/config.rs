use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

pub const DEFAULT_ALLOC_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_ALLOC_BACKOFF_MS: u64 = 25;

// Inventory service configuration sourced from environment variables, with an
// optional YAML override file.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub api_token: Option<String>,
    pub allocator: AllocatorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
struct InventoryConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<String>,
    database_url: Option<String>,
    api_token: Option<String>,
    alloc_max_attempts: Option<u32>,
    alloc_backoff_ms: Option<u64>,
}

impl InventoryConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("SOLESTACK_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse SOLESTACK_BIND")?;
        let metrics_bind = std::env::var("SOLESTACK_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9090".to_string())
            .parse()
            .with_context(|| "parse SOLESTACK_METRICS_BIND")?;
        let storage = parse_storage(
            &std::env::var("SOLESTACK_STORAGE").unwrap_or_else(|_| "memory".to_string()),
        )?;
        let postgres = std::env::var("SOLESTACK_DATABASE_URL")
            .ok()
            .map(|url| -> Result<PostgresConfig> {
                Ok(PostgresConfig {
                    url,
                    max_connections: env_or("SOLESTACK_PG_MAX_CONNECTIONS", 8)?,
                    acquire_timeout_ms: env_or("SOLESTACK_PG_ACQUIRE_TIMEOUT_MS", 3_000)?,
                })
            })
            .transpose()?;
        let api_token = std::env::var("SOLESTACK_API_TOKEN").ok();
        let allocator = AllocatorConfig {
            max_attempts: env_or("SOLESTACK_ALLOC_MAX_ATTEMPTS", DEFAULT_ALLOC_MAX_ATTEMPTS)?,
            backoff_ms: env_or("SOLESTACK_ALLOC_BACKOFF_MS", DEFAULT_ALLOC_BACKOFF_MS)?,
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            api_token,
            allocator,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("SOLESTACK_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read SOLESTACK_CONFIG: {path}"))?;
            let override_cfg: InventoryConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse inventory config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.storage {
                config.storage = parse_storage(&value)?;
            }
            if let Some(url) = override_cfg.database_url {
                config.postgres = Some(PostgresConfig {
                    url,
                    max_connections: config
                        .postgres
                        .as_ref()
                        .map(|pg| pg.max_connections)
                        .unwrap_or(8),
                    acquire_timeout_ms: config
                        .postgres
                        .as_ref()
                        .map(|pg| pg.acquire_timeout_ms)
                        .unwrap_or(3_000),
                });
            }
            if let Some(value) = override_cfg.api_token {
                config.api_token = Some(value);
            }
            if let Some(value) = override_cfg.alloc_max_attempts {
                config.allocator.max_attempts = value;
            }
            if let Some(value) = override_cfg.alloc_backoff_ms {
                config.allocator.backoff_ms = value;
            }
        }
        Ok(config)
    }
}

fn parse_storage(value: &str) -> Result<StorageBackend> {
    match value {
        "memory" => Ok(StorageBackend::Memory),
        "postgres" => Ok(StorageBackend::Postgres),
        other => anyhow::bail!("unknown storage backend: {other}"),
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value.parse().with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}
