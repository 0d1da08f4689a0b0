use chrono::Utc;
use tracing::info;

use crate::error::ConfigError;
use crate::idents::IdentTable;
use crate::models::{GeneratedSystem, WalletConfig};

use super::{generate_integration_module, generate_policy_module, generate_roles_module};

/// Validate the configuration, derive the identifier table (the collision
/// guard), run the three generators, and bundle the result with metadata.
///
/// Module text depends only on the configuration; the timestamp is metadata
/// and never leaks into `source_text`.
pub fn assemble(config: &WalletConfig) -> Result<GeneratedSystem, ConfigError> {
    config.validate()?;
    let idents = IdentTable::build(config)?;

    let roles_module = generate_roles_module(config, &idents)?;
    let policy_module = generate_policy_module(config, &idents)?;
    let integration_module = generate_integration_module(config, &idents)?;

    let declared_roles: Vec<String> = config.enabled_roles().map(|r| r.id.clone()).collect();
    let declared_tiers = config.enabled_rules().map(|r| r.threshold_eth).collect();

    info!(
        wallet = %config.name,
        roles = declared_roles.len(),
        "assembled generated system"
    );

    Ok(GeneratedSystem {
        wallet_name: config.name.clone(),
        generated_at: Utc::now(),
        declared_roles,
        declared_tiers,
        roles_module,
        policy_module,
        integration_module,
    })
}
