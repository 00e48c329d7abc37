use std::fs;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::transfer::WorkerConfig;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL; in-memory store when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,
    /// HS256 signing secret for session tokens
    pub jwt_secret: String,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Deferred settlement tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SettlementConfig {
    /// Delay between acceptance and settlement
    pub delay_ms: u64,
    pub workers: usize,
    pub poll_interval_ms: u64,
    pub lease_secs: u64,
    pub batch_size: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            delay_ms: 3000,
            workers: 2,
            poll_interval_ms: 250,
            lease_secs: 30,
            batch_size: 50,
        }
    }
}

impl SettlementConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn to_worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            lease: Duration::from_secs(self.lease_secs),
            batch_size: self.batch_size.max(1),
        }
    }
}

/// Per-user transaction view cache (0 disables it)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 5 }
    }
}

fn default_max_connections() -> u32 {
    10
}

impl AppConfig {
    /// Load `config/{env}.yaml`, then apply `DATABASE_URL` / `JWT_SECRET` overrides
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path))?;
        config.apply_env_overrides(
            std::env::var("DATABASE_URL").ok(),
            std::env::var("JWT_SECRET").ok(),
        );
        anyhow::ensure!(
            !config.jwt_secret.is_empty(),
            "jwt_secret is empty; set it in {} or via JWT_SECRET",
            config_path
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self, database_url: Option<String>, jwt_secret: Option<String>) {
        if let Some(url) = database_url.filter(|s| !s.is_empty()) {
            self.postgres_url = Some(url);
        }
        if let Some(secret) = jwt_secret.filter(|s| !s.is_empty()) {
            self.jwt_secret = secret;
        }
    }
}
