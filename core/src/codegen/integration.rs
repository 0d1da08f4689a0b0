use crate::amount::EthAmount;
use crate::error::ConfigError;
use crate::idents::IdentTable;
use crate::models::{GeneratedModule, Permission, WalletConfig};

use super::{capitalize, sol_str, SOLIDITY_HEADER};

pub const REASON_NO_EXECUTE_PERMISSION: &str = "member lacks execute-transaction permission";

/// The rejection reason emitted for an unmet amount tier. Names the required
/// role and the threshold so callers can tell tiers apart.
pub fn tier_rejection_reason(role_id: &str, threshold: EthAmount) -> String {
    format!(
        "requires {} role for amounts of {} ETH or more",
        role_id, threshold
    )
}

/// Emit the composition module: a single `validateTransactionWithRole`
/// pipeline over the roles and policy modules, plus pass-through queries so
/// callers never address the underlying modules directly.
pub fn generate_integration_module(
    config: &WalletConfig,
    idents: &IdentTable,
) -> Result<GeneratedModule, ConfigError> {
    let roles: Vec<_> = config.enabled_roles().collect();
    let rules: Vec<_> = config.enabled_rules().collect();

    let mut src = String::new();
    src.push_str(SOLIDITY_HEADER);

    // Narrow interfaces over the two generated modules.
    src.push_str("\ninterface IWalletRoles {\n");
    src.push_str("    function hasPermission(string memory roleId, string memory permission) external view returns (bool);\n");
    src.push_str("    function getMemberRole(address member) external view returns (string memory);\n");
    src.push_str("    function isMember(address member) external view returns (bool);\n");
    src.push_str("    function holdsRole(address member, string memory roleId) external view returns (bool);\n");
    src.push_str("    function holdsOrOutranks(address member, string memory roleId) external view returns (bool);\n");
    src.push_str("}\n");

    src.push_str("\ninterface ISpendingPolicy {\n");
    src.push_str("    function validateTransaction(address from, address to, uint256 amount, address token) external returns (bool approved, string memory reason);\n");
    for rule in &rules {
        let predicate = idents
            .tier_predicate(rule.threshold_eth)
            .ok_or_else(|| ConfigError::UnknownRole(rule.required_role_id.clone()))?;
        src.push_str(&format!(
            "    function {}(uint256 amount) external pure returns (bool);\n",
            predicate
        ));
    }
    src.push_str("}\n");

    src.push_str("\ncontract WalletIntegration {\n");
    src.push_str("    IWalletRoles public rolesModule;\n");
    src.push_str("    ISpendingPolicy public policyModule;\n");

    src.push_str("\n    constructor(address rolesAddress, address policyAddress) {\n");
    src.push_str("        rolesModule = IWalletRoles(rolesAddress);\n");
    src.push_str("        policyModule = ISpendingPolicy(policyAddress);\n");
    src.push_str("    }\n");

    // The ordered validation pipeline: generic execute permission first,
    // then each amount tier in declared order (first unmet tier rejects),
    // then the policy module's own checks, returned verbatim.
    src.push_str("\n    function validateTransactionWithRole(address member, address to, uint256 amount, address token) public returns (bool approved, string memory reason) {\n");
    src.push_str(&format!(
        "        if (!rolesModule.hasPermission(rolesModule.getMemberRole(member), \"{}\")) {{\n",
        Permission::ExecuteTransaction.as_str()
    ));
    src.push_str(&format!(
        "            return (false, \"{}\");\n        }}\n",
        REASON_NO_EXECUTE_PERMISSION
    ));
    for rule in &rules {
        let predicate = idents
            .tier_predicate(rule.threshold_eth)
            .ok_or_else(|| ConfigError::UnknownRole(rule.required_role_id.clone()))?;
        let reason = tier_rejection_reason(&rule.required_role_id, rule.threshold_eth);
        src.push_str(&format!(
            "        if (policyModule.{}(amount) && !rolesModule.holdsOrOutranks(member, \"{}\")) {{\n",
            predicate,
            sol_str(&rule.required_role_id)
        ));
        src.push_str(&format!(
            "            return (false, \"{}\");\n        }}\n",
            sol_str(&reason)
        ));
    }
    src.push_str("        return policyModule.validateTransaction(member, to, amount, token);\n");
    src.push_str("    }\n");

    // Pass-through membership queries, one per enabled role.
    for role in &roles {
        let ident = idents
            .role(&role.id)
            .ok_or_else(|| ConfigError::UnknownRole(role.id.clone()))?;
        src.push_str(&format!(
            "\n    function is{}(address member) public view returns (bool) {{\n",
            capitalize(ident)
        ));
        src.push_str(&format!(
            "        return rolesModule.holdsRole(member, \"{}\");\n",
            sol_str(&role.id)
        ));
        src.push_str("    }\n");
    }

    // Pass-through tier queries, one per enabled rule.
    for rule in &rules {
        let predicate = idents
            .tier_predicate(rule.threshold_eth)
            .ok_or_else(|| ConfigError::UnknownRole(rule.required_role_id.clone()))?;
        let alias = idents
            .tier_alias(rule.threshold_eth)
            .ok_or_else(|| ConfigError::UnknownRole(rule.required_role_id.clone()))?;
        src.push_str(&format!(
            "\n    function {}(uint256 amount) public view returns (bool) {{\n",
            predicate
        ));
        src.push_str(&format!(
            "        return policyModule.{}(amount);\n",
            predicate
        ));
        src.push_str("    }\n");
        src.push_str(&format!(
            "\n    function {}(uint256 amount) public view returns (bool) {{\n",
            alias
        ));
        src.push_str(&format!(
            "        return policyModule.{}(amount);\n",
            predicate
        ));
        src.push_str("    }\n");
    }

    src.push_str("}\n");

    Ok(GeneratedModule {
        logical_name: "WalletIntegration".to_string(),
        description: format!(
            "Validation pipeline composing roles and policy for {}",
            config.name
        ),
        source_text: src,
    })
}
