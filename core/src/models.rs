use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::EthAmount;
use crate::error::ConfigError;

/// Role id that is always present and cannot be deleted or reassigned
/// through the generic role-change path.
pub const ADMIN_ROLE_ID: &str = "admin";

// ==================== Role Models ====================

/// Fixed permission vocabulary understood by the generated modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    CreateRole,
    DeleteRole,
    AssignRole,
    RemoveRole,
    ModifyPermissions,
    ExecuteTransaction,
    ApproveTransaction,
    ViewTransactions,
    ManagePolicies,
    EmergencyPause,
    ManageMembers,
    ViewMembers,
}

impl Permission {
    pub const ALL: [Permission; 12] = [
        Permission::CreateRole,
        Permission::DeleteRole,
        Permission::AssignRole,
        Permission::RemoveRole,
        Permission::ModifyPermissions,
        Permission::ExecuteTransaction,
        Permission::ApproveTransaction,
        Permission::ViewTransactions,
        Permission::ManagePolicies,
        Permission::EmergencyPause,
        Permission::ManageMembers,
        Permission::ViewMembers,
    ];

    /// The string key the generated modules use in their permission matrix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CreateRole => "create-role",
            Permission::DeleteRole => "delete-role",
            Permission::AssignRole => "assign-role",
            Permission::RemoveRole => "remove-role",
            Permission::ModifyPermissions => "modify-permissions",
            Permission::ExecuteTransaction => "execute-transaction",
            Permission::ApproveTransaction => "approve-transaction",
            Permission::ViewTransactions => "view-transactions",
            Permission::ManagePolicies => "manage-policies",
            Permission::EmergencyPause => "emergency-pause",
            Permission::ManageMembers => "manage-members",
            Permission::ViewMembers => "view-members",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Seniority, 0-100; higher outranks lower.
    pub level: u8,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RoleDefinition {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// One account-address -> role mapping. An address holds at most one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberAssignment {
    pub address: String,
    pub role_id: String,
}

// ==================== Policy Models ====================

/// A spending threshold paired with the role required to move amounts at or
/// above it. Rules are an ordered list; declaration order is evaluation
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountRule {
    pub threshold_eth: EthAmount,
    pub required_role_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub max_tx_amount_eth: EthAmount,
    pub daily_limit_eth: EthAmount,
    #[serde(default)]
    pub require_approval: bool,
    #[serde(default = "default_threshold")]
    pub approval_threshold: u32,
    #[serde(default)]
    pub time_lock_seconds: u64,
    #[serde(default)]
    pub amount_rules: Vec<AmountRule>,
    #[serde(default)]
    pub allowed_tokens: Vec<String>,
    #[serde(default)]
    pub blacklisted_addresses: Vec<String>,
}

// ==================== Wallet Configuration ====================

/// The full declarative description of one managed wallet: base multisig
/// owners and threshold, the role set, member assignments, and the spending
/// policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub name: String,
    pub owners: Vec<String>,
    pub threshold: u32,
    pub roles: Vec<RoleDefinition>,
    #[serde(default)]
    pub members: Vec<MemberAssignment>,
    pub policy: PolicyConfig,
}

impl WalletConfig {
    pub fn enabled_roles(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.roles.iter().filter(|r| r.enabled)
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &AmountRule> {
        self.policy.amount_rules.iter().filter(|r| r.enabled)
    }

    pub fn role(&self, id: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.id == id)
    }

    /// Structural validation shared by every generator: unique role ids,
    /// known role references, sane thresholds, well-formed addresses, and
    /// one role per member.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_ids: Vec<&str> = Vec::new();
        for role in &self.roles {
            if seen_ids.contains(&role.id.as_str()) {
                return Err(ConfigError::DuplicateRoleId(role.id.clone()));
            }
            seen_ids.push(&role.id);
        }

        if self.threshold < 1 {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.threshold as usize > self.owners.len() {
            return Err(ConfigError::ThresholdExceedsMembers {
                threshold: self.threshold,
                members: self.owners.len(),
            });
        }
        if self.policy.approval_threshold < 1 {
            return Err(ConfigError::InvalidThreshold(self.policy.approval_threshold));
        }
        if self.policy.approval_threshold as usize > self.owners.len() {
            return Err(ConfigError::ThresholdExceedsMembers {
                threshold: self.policy.approval_threshold,
                members: self.owners.len(),
            });
        }

        for addr in self
            .owners
            .iter()
            .chain(self.members.iter().map(|m| &m.address))
            .chain(self.policy.blacklisted_addresses.iter())
            .chain(self.policy.allowed_tokens.iter())
        {
            validate_address(addr)?;
        }

        let mut seen_members: Vec<String> = Vec::new();
        for member in &self.members {
            if self.role(&member.role_id).is_none() {
                return Err(ConfigError::UnknownRole(member.role_id.clone()));
            }
            let addr = member.address.to_lowercase();
            if seen_members.contains(&addr) {
                return Err(ConfigError::DuplicateMember {
                    address: member.address.clone(),
                });
            }
            seen_members.push(addr);
        }

        for rule in &self.policy.amount_rules {
            if self.role(&rule.required_role_id).is_none() {
                return Err(ConfigError::UnknownRole(rule.required_role_id.clone()));
            }
        }

        Ok(())
    }
}

// ==================== Generated Artifacts ====================

/// One generated program unit. Immutable once produced; identical input
/// configuration yields byte-identical `source_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedModule {
    pub logical_name: String,
    pub description: String,
    pub source_text: String,
}

/// The assembled artifact: the three generated modules plus metadata. The
/// timestamp lives only here, never inside module text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSystem {
    pub wallet_name: String,
    pub generated_at: DateTime<Utc>,
    pub declared_roles: Vec<String>,
    pub declared_tiers: Vec<EthAmount>,
    pub roles_module: GeneratedModule,
    pub policy_module: GeneratedModule,
    pub integration_module: GeneratedModule,
}

impl GeneratedSystem {
    pub fn modules(&self) -> [&GeneratedModule; 3] {
        [
            &self.roles_module,
            &self.policy_module,
            &self.integration_module,
        ]
    }
}

// ==================== Deployment Models ====================

/// Deployment stage machine, in dependency order. Each stage is completed
/// exactly once; `Linked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployStage {
    NotStarted,
    BaseDeployed,
    ManagerDeployed,
    PolicyDeployed,
    RolesDeployed,
    Linked,
}

impl DeployStage {
    /// The stage that follows this one, `None` from `Linked`.
    pub fn next(&self) -> Option<DeployStage> {
        match self {
            DeployStage::NotStarted => Some(DeployStage::BaseDeployed),
            DeployStage::BaseDeployed => Some(DeployStage::ManagerDeployed),
            DeployStage::ManagerDeployed => Some(DeployStage::PolicyDeployed),
            DeployStage::PolicyDeployed => Some(DeployStage::RolesDeployed),
            DeployStage::RolesDeployed => Some(DeployStage::Linked),
            DeployStage::Linked => None,
        }
    }
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeployStage::NotStarted => "not-started",
            DeployStage::BaseDeployed => "base-deployed",
            DeployStage::ManagerDeployed => "manager-deployed",
            DeployStage::PolicyDeployed => "policy-deployed",
            DeployStage::RolesDeployed => "roles-deployed",
            DeployStage::Linked => "linked",
        };
        write!(f, "{}", s)
    }
}

/// Transaction hash recorded for one completed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReceipt {
    pub stage: DeployStage,
    pub tx_hash: String,
}

/// A stage whose creation transaction was submitted but not yet confirmed.
/// Kept on the record so resuming waits for this hash instead of
/// re-submitting the creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingStage {
    pub stage: DeployStage,
    pub tx_hash: String,
}

/// Filled stage-by-stage as deployment progresses. A record with absent
/// addresses after an error is a resumable partial deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub wallet_name: String,
    pub stage: DeployStage,
    pub multisig_address: Option<String>,
    pub manager_address: Option<String>,
    pub policy_address: Option<String>,
    pub roles_address: Option<String>,
    pub receipts: Vec<StageReceipt>,
    pub pending: Option<PendingStage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn new(wallet_name: &str) -> Self {
        let now = Utc::now();
        Self {
            wallet_name: wallet_name.to_string(),
            stage: DeployStage::NotStarted,
            multisig_address: None,
            manager_address: None,
            policy_address: None,
            roles_address: None,
            receipts: Vec::new(),
            pending: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.stage == DeployStage::Linked
    }

    pub(crate) fn complete_stage(&mut self, stage: DeployStage, address: Option<String>, tx_hash: String) {
        match stage {
            DeployStage::BaseDeployed => self.multisig_address = address,
            DeployStage::ManagerDeployed => self.manager_address = address,
            DeployStage::PolicyDeployed => self.policy_address = address,
            DeployStage::RolesDeployed => self.roles_address = address,
            DeployStage::NotStarted | DeployStage::Linked => {}
        }
        self.receipts.push(StageReceipt { stage, tx_hash });
        self.stage = stage;
        self.pending = None;
        self.updated_at = Utc::now();
    }
}

// ==================== Pending Transactions ====================

/// What a pending multisig transaction does once executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransactionKind {
    Transfer { to: String, amount_eth: EthAmount },
    AddOwner { owner: String },
    RemoveOwner { owner: String },
    ChangeThreshold { threshold: u32 },
}

impl TransactionKind {
    pub fn is_governance(&self) -> bool {
        !matches!(self, TransactionKind::Transfer { .. })
    }
}

/// Locally cached view of one proposed transaction and its confirmations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: u64,
    #[serde(flatten)]
    pub kind: TransactionKind,
    pub confirmed_by: Vec<String>,
    pub required_confirmations: u32,
    pub executed: bool,
}

impl PendingTransaction {
    pub fn new(id: u64, kind: TransactionKind, required_confirmations: u32) -> Self {
        Self {
            id,
            kind,
            confirmed_by: Vec::new(),
            required_confirmations,
            executed: false,
        }
    }
}

/// Snapshot of a deployed wallet's transaction list, persisted locally and
/// refreshed from the chain by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub wallet_name: String,
    pub transactions: Vec<PendingTransaction>,
    pub updated_at: DateTime<Utc>,
}

// ==================== Validation Helpers ====================

/// Validate a 0x-prefixed 20-byte hex address.
pub fn validate_address(addr: &str) -> Result<(), ConfigError> {
    let hex_part = addr
        .strip_prefix("0x")
        .ok_or_else(|| ConfigError::InvalidAddress(addr.to_string()))?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidAddress(addr.to_string()));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> u32 {
    1
}
