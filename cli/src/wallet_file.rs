use std::fs;
use std::path::Path;

use mms_core::WalletConfig;

use crate::error::CliError;

/// Load a declarative wallet description from a TOML file. The file maps
/// directly onto `WalletConfig`: top-level name/owners/threshold, a
/// `[[roles]]` table array, optional `[[members]]`, and a `[policy]` table
/// with its `[[policy.amount_rules]]`.
pub fn load_wallet_file(path: &str) -> Result<WalletConfig, CliError> {
    if !Path::new(path).exists() {
        return Err(CliError::ConfigNotFound(path.to_string()));
    }

    let contents = fs::read_to_string(path)?;
    let config: WalletConfig = toml::from_str(&contents)?;
    config
        .validate()
        .map_err(|e| CliError::InvalidConfig(e.to_string()))?;
    Ok(config)
}
