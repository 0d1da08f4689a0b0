use crate::amount::EthAmount;
use crate::error::ConfigError;
use crate::models::WalletConfig;

/// Prefix applied when a sanitized role name would start with a digit.
const DIGIT_PREFIX: &str = "role_";

/// Canonical identifier for a free-text role name: lowercased, all
/// non-alphanumeric characters stripped, digit-leading results prefixed.
pub fn role_ident(name: &str) -> Result<String, ConfigError> {
    let sanitized: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    if sanitized.is_empty() {
        return Err(ConfigError::EmptyIdent(name.to_string()));
    }
    if sanitized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Ok(format!("{}{}", DIGIT_PREFIX, sanitized));
    }
    Ok(sanitized)
}

/// Canonical identifier fragment for an ETH amount, encoding whole and
/// fractional parts separately so `0.1` and `1` never collide:
/// `0.5` -> `0_5`, `12` -> `12_0`.
pub fn amount_ident(amount: EthAmount) -> String {
    format!("{}_{}", amount.whole(), amount.frac_digits())
}

/// The derived identifier table for one configuration. Building it is the
/// collision guard: two distinct inputs deriving the same identifier abort
/// generation instead of silently overwriting.
#[derive(Debug, Clone)]
pub struct IdentTable {
    roles: Vec<(String, String)>,
    tiers: Vec<(EthAmount, String)>,
}

impl IdentTable {
    pub fn build(config: &WalletConfig) -> Result<Self, ConfigError> {
        let mut roles: Vec<(String, String)> = Vec::new();
        for role in config.enabled_roles() {
            let ident = role_ident(&role.display_name)?;
            if let Some((prior, _)) = roles.iter().find(|(_, i)| *i == ident) {
                let prior_name = config
                    .role(prior)
                    .map(|r| r.display_name.clone())
                    .unwrap_or_else(|| prior.clone());
                return Err(ConfigError::IdentCollision {
                    ident,
                    first: prior_name,
                    second: role.display_name.clone(),
                });
            }
            roles.push((role.id.clone(), ident));
        }

        let mut tiers: Vec<(EthAmount, String)> = Vec::new();
        for rule in config.enabled_rules() {
            let ident = amount_ident(rule.threshold_eth);
            if let Some((prior, _)) = tiers.iter().find(|(_, i)| *i == ident) {
                return Err(ConfigError::IdentCollision {
                    ident,
                    first: prior.to_string(),
                    second: rule.threshold_eth.to_string(),
                });
            }
            tiers.push((rule.threshold_eth, ident));
        }

        Ok(Self { roles, tiers })
    }

    /// Identifier for a role id; role ids not in the table were disabled or
    /// unknown at build time.
    pub fn role(&self, role_id: &str) -> Option<&str> {
        self.roles
            .iter()
            .find(|(id, _)| id == role_id)
            .map(|(_, ident)| ident.as_str())
    }

    pub fn tier(&self, threshold: EthAmount) -> Option<&str> {
        self.tiers
            .iter()
            .find(|(amount, _)| *amount == threshold)
            .map(|(_, ident)| ident.as_str())
    }

    /// Membership array name for a role.
    pub fn role_members_array(&self, role_id: &str) -> Option<String> {
        self.role(role_id).map(|ident| format!("{}Members", ident))
    }

    /// Tier predicate name: true iff an amount is at or above the threshold.
    pub fn tier_predicate(&self, threshold: EthAmount) -> Option<String> {
        self.tier(threshold)
            .map(|ident| format!("amountAbove{}", ident))
    }

    /// Intent-documenting alias for the tier predicate.
    pub fn tier_alias(&self, threshold: EthAmount) -> Option<String> {
        self.tier(threshold)
            .map(|ident| format!("requires{}Approval", ident))
    }
}
