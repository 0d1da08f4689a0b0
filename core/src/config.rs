use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::deploy::DEFAULT_CONFIRM_TIMEOUT;

/// Runtime knobs, all environment-driven with working defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory for saved wallet configurations, deployment records, and
    /// transaction snapshots.
    pub data_dir: PathBuf,
    /// Uniform bound on waiting for any stage's confirmation.
    pub confirm_timeout: Duration,
    /// Seed for the simulated chain, so fabricated addresses are stable
    /// across runs when set.
    pub chain_seed: Option<String>,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let data_dir = env::var("MMS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".mms"));

        let confirm_timeout = env::var("MMS_CONFIRM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONFIRM_TIMEOUT);

        let chain_seed = env::var("MMS_CHAIN_SEED").ok();

        let log_level = env::var("MMS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            data_dir,
            confirm_timeout,
            chain_seed,
            log_level,
        })
    }
}
