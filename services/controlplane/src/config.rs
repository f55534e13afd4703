//! Control-plane configuration.
//!
//! # Purpose
//! Reads listener addresses, controller tuning and store retention from
//! `TENANTRY_*` environment variables, then applies an optional YAML override
//! file named by `TENANTRY_CONFIG`.
use crate::controllers::ManagerConfig;
use crate::store::StoreConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub workers_per_kind: usize,
    pub resync_interval_secs: u64,
    pub requeue_base_delay_ms: u64,
    pub requeue_max_delay_ms: u64,
    pub change_retention: usize,
}

#[derive(Debug, Default, Deserialize)]
struct ControlPlaneConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    workers_per_kind: Option<usize>,
    resync_interval_secs: Option<u64>,
    requeue_base_delay_ms: Option<u64>,
    requeue_max_delay_ms: Option<u64>,
    change_retention: Option<usize>,
}

fn env_or<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("parse {name}"))
}

impl ControlPlaneConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            bind_addr: env_or("TENANTRY_BIND", "0.0.0.0:8443")?,
            metrics_bind: env_or("TENANTRY_METRICS_BIND", "0.0.0.0:8080")?,
            workers_per_kind: env_or("TENANTRY_WORKERS_PER_KIND", "1")?,
            resync_interval_secs: env_or("TENANTRY_RESYNC_SECS", "300")?,
            requeue_base_delay_ms: env_or("TENANTRY_REQUEUE_BASE_MS", "100")?,
            requeue_max_delay_ms: env_or("TENANTRY_REQUEUE_MAX_MS", "30000")?,
            change_retention: env_or("TENANTRY_CHANGE_RETENTION", "1024")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("TENANTRY_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read TENANTRY_CONFIG: {path}"))?;
            let override_cfg: ControlPlaneConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse control plane config yaml")?;
            config.apply(override_cfg)?;
            config.validate()?;
        }
        Ok(config)
    }

    fn apply(&mut self, override_cfg: ControlPlaneConfigOverride) -> Result<()> {
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.workers_per_kind {
            self.workers_per_kind = value;
        }
        if let Some(value) = override_cfg.resync_interval_secs {
            self.resync_interval_secs = value;
        }
        if let Some(value) = override_cfg.requeue_base_delay_ms {
            self.requeue_base_delay_ms = value;
        }
        if let Some(value) = override_cfg.requeue_max_delay_ms {
            self.requeue_max_delay_ms = value;
        }
        if let Some(value) = override_cfg.change_retention {
            self.change_retention = value;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.workers_per_kind > 0, "workers_per_kind must be at least 1");
        anyhow::ensure!(
            self.resync_interval_secs > 0,
            "resync_interval_secs must be at least 1"
        );
        anyhow::ensure!(
            self.requeue_base_delay_ms > 0 && self.requeue_base_delay_ms <= self.requeue_max_delay_ms,
            "requeue delays must satisfy 0 < base <= max"
        );
        anyhow::ensure!(self.change_retention > 0, "change_retention must be at least 1");
        Ok(())
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            workers_per_kind: self.workers_per_kind,
            resync_interval: Duration::from_secs(self.resync_interval_secs),
            requeue_base_delay: Duration::from_millis(self.requeue_base_delay_ms),
            requeue_max_delay: Duration::from_millis(self.requeue_max_delay_ms),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            change_retention: self.change_retention,
            ..StoreConfig::default()
        }
    }
}
