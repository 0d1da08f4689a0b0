use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{DeploymentRecord, WalletConfig, WalletSnapshot};

/// Local JSON-file persistence for named wallet configurations, deployment
/// records, and transaction snapshots. Documents are pretty-printed so they
/// stay human-readable and diffable across sessions.
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn save_config(&self, config: &WalletConfig) -> Result<(), StoreError> {
        self.save(&config.name, "config", config)
    }

    pub fn load_config(&self, name: &str) -> Result<Option<WalletConfig>, StoreError> {
        self.load(name, "config")
    }

    pub fn save_deployment(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        self.save(&record.wallet_name, "deployment", record)
    }

    pub fn load_deployment(&self, name: &str) -> Result<Option<DeploymentRecord>, StoreError> {
        self.load(name, "deployment")
    }

    pub fn save_snapshot(&self, snapshot: &WalletSnapshot) -> Result<(), StoreError> {
        self.save(&snapshot.wallet_name, "wallet", snapshot)
    }

    pub fn load_snapshot(&self, name: &str) -> Result<Option<WalletSnapshot>, StoreError> {
        self.load(name, "wallet")
    }

    /// Names of wallets with a saved deployment record.
    pub fn list_wallets(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let file_name = entry?.file_name();
            let file_name = file_name.to_string_lossy();
            if let Some(name) = file_name.strip_suffix(".deployment.json") {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn save<T: Serialize>(&self, name: &str, kind: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path_for(name, kind)?;
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        debug!(path = %path.display(), "saved record");
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, name: &str, kind: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(name, kind)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn path_for(&self, name: &str, kind: &str) -> Result<PathBuf, StoreError> {
        let key = sanitize_key(name)?;
        Ok(self.dir.join(format!("{}.{}.json", key, kind)))
    }
}

/// Record keys are derived from wallet names: lowercased, with runs of
/// anything non-alphanumeric collapsed to a single dash.
fn sanitize_key(name: &str) -> Result<String, StoreError> {
    let mut key = String::new();
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c);
        } else if !key.ends_with('-') && !key.is_empty() {
            key.push('-');
        }
    }
    let key = key.trim_end_matches('-').to_string();
    if key.is_empty() {
        return Err(StoreError::InvalidKey(name.to_string()));
    }
    Ok(key)
}
