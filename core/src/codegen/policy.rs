use crate::error::ConfigError;
use crate::idents::IdentTable;
use crate::models::{GeneratedModule, WalletConfig};

use super::{sol_addr, SOLIDITY_HEADER};

// Reason strings returned by validateTransaction. One distinct, stable
// string per check; callers and tests match on them verbatim.
pub const REASON_PAUSED: &str = "policy is paused";
pub const REASON_DAILY_LIMIT: &str = "daily spending limit exceeded";
pub const REASON_MAX_TX: &str = "amount exceeds per-transaction maximum";
pub const REASON_SENDER_BLACKLISTED: &str = "sender address is blacklisted";
pub const REASON_RECIPIENT_BLACKLISTED: &str = "recipient address is blacklisted";
pub const REASON_TOKEN_NOT_ALLOWED: &str = "token is not on the allow list";
pub const REASON_APPROVED: &str = "approved";

/// Emit the spending-policy module: limits, day-bucketed daily spend, tier
/// predicates, allow/deny lists, and the ordered `validateTransaction`
/// pipeline.
pub fn generate_policy_module(
    config: &WalletConfig,
    idents: &IdentTable,
) -> Result<GeneratedModule, ConfigError> {
    let policy = &config.policy;
    let rules: Vec<_> = config.enabled_rules().collect();

    let mut src = String::new();
    src.push_str(SOLIDITY_HEADER);
    src.push_str("\ncontract SpendingPolicy {\n");
    src.push_str("    address public owner;\n");
    src.push_str("    bool public active;\n\n");
    src.push_str("    uint256 public maxTxAmount;\n");
    src.push_str("    uint256 public dailyLimit;\n");
    src.push_str("    uint256 public dailySpent;\n");
    src.push_str("    uint256 public lastResetDay;\n\n");
    src.push_str("    bool public requireApproval;\n");
    src.push_str("    uint256 public approvalThreshold;\n");
    src.push_str("    uint256 public timeLock;\n\n");
    src.push_str("    mapping(address => bool) public blacklisted;\n");
    src.push_str("    mapping(address => bool) public allowedToken;\n");
    src.push_str("    bool public tokenAllowListEnabled;\n");

    src.push_str("\n    event LimitsUpdated(uint256 maxTxAmount, uint256 dailyLimit);\n");
    src.push_str("    event ApprovalSettingsUpdated(bool requireApproval, uint256 approvalThreshold);\n");
    src.push_str("    event PolicyPaused();\n");
    src.push_str("    event PolicyActivated();\n");
    src.push_str("    event DailySpentReset(uint256 day);\n");
    src.push_str("    event TransactionValidated(address indexed from, address indexed to, uint256 amount, bool approved);\n");

    src.push_str("\n    constructor() {\n");
    src.push_str("        owner = msg.sender;\n");
    src.push_str("        active = true;\n");
    src.push_str(&format!(
        "        maxTxAmount = {};\n",
        policy.max_tx_amount_eth.wei()
    ));
    src.push_str(&format!(
        "        dailyLimit = {};\n",
        policy.daily_limit_eth.wei()
    ));
    src.push_str(&format!(
        "        requireApproval = {};\n",
        policy.require_approval
    ));
    src.push_str(&format!(
        "        approvalThreshold = {};\n",
        policy.approval_threshold
    ));
    src.push_str(&format!("        timeLock = {};\n", policy.time_lock_seconds));
    src.push_str("        lastResetDay = block.timestamp / 1 days;\n");
    for addr in &policy.blacklisted_addresses {
        src.push_str(&format!("        blacklisted[{}] = true;\n", sol_addr(addr)));
    }
    if !policy.allowed_tokens.is_empty() {
        src.push_str("        tokenAllowListEnabled = true;\n");
        for token in &policy.allowed_tokens {
            src.push_str(&format!("        allowedToken[{}] = true;\n", sol_addr(token)));
        }
    }
    src.push_str("    }\n");

    src.push_str("\n    modifier onlyOwner() {\n");
    src.push_str("        require(msg.sender == owner, \"caller is not the owner\");\n");
    src.push_str("        _;\n    }\n");

    // One independent predicate per enabled tier, true iff the amount is at
    // or above the threshold, plus an intent-documenting alias.
    for rule in &rules {
        let predicate = idents
            .tier_predicate(rule.threshold_eth)
            .ok_or_else(|| ConfigError::UnknownRole(rule.required_role_id.clone()))?;
        let alias = idents
            .tier_alias(rule.threshold_eth)
            .ok_or_else(|| ConfigError::UnknownRole(rule.required_role_id.clone()))?;
        let wei = rule.threshold_eth.wei();
        src.push_str(&format!(
            "\n    function {}(uint256 amount) public pure returns (bool) {{\n",
            predicate
        ));
        src.push_str(&format!("        return amount >= {};\n", wei));
        src.push_str("    }\n");
        src.push_str(&format!(
            "\n    function {}(uint256 amount) public pure returns (bool) {{\n",
            alias
        ));
        src.push_str(&format!("        return amount >= {};\n", wei));
        src.push_str("    }\n");
    }

    // The validation pipeline. Check order is fixed: daily limit, per-tx
    // maximum, blacklist (sender then recipient), token allow list. The
    // first failing check returns; each check has its own reason string.
    src.push_str("\n    function validateTransaction(address from, address to, uint256 amount, address token) public returns (bool approved, string memory reason) {\n");
    src.push_str(&format!(
        "        if (!active) {{\n            return (false, \"{}\");\n        }}\n",
        REASON_PAUSED
    ));
    src.push_str("        uint256 today = block.timestamp / 1 days;\n");
    src.push_str("        if (today != lastResetDay) {\n");
    src.push_str("            dailySpent = 0;\n");
    src.push_str("            lastResetDay = today;\n");
    src.push_str("            emit DailySpentReset(today);\n");
    src.push_str("        }\n");
    src.push_str(&format!(
        "        if (dailySpent + amount > dailyLimit) {{\n            emit TransactionValidated(from, to, amount, false);\n            return (false, \"{}\");\n        }}\n",
        REASON_DAILY_LIMIT
    ));
    src.push_str(&format!(
        "        if (amount > maxTxAmount) {{\n            emit TransactionValidated(from, to, amount, false);\n            return (false, \"{}\");\n        }}\n",
        REASON_MAX_TX
    ));
    src.push_str(&format!(
        "        if (blacklisted[from]) {{\n            emit TransactionValidated(from, to, amount, false);\n            return (false, \"{}\");\n        }}\n",
        REASON_SENDER_BLACKLISTED
    ));
    src.push_str(&format!(
        "        if (blacklisted[to]) {{\n            emit TransactionValidated(from, to, amount, false);\n            return (false, \"{}\");\n        }}\n",
        REASON_RECIPIENT_BLACKLISTED
    ));
    src.push_str(&format!(
        "        if (token != address(0) && tokenAllowListEnabled && !allowedToken[token]) {{\n            emit TransactionValidated(from, to, amount, false);\n            return (false, \"{}\");\n        }}\n",
        REASON_TOKEN_NOT_ALLOWED
    ));
    src.push_str("        dailySpent += amount;\n");
    src.push_str("        emit TransactionValidated(from, to, amount, true);\n");
    src.push_str(&format!(
        "        return (true, \"{}\");\n",
        REASON_APPROVED
    ));
    src.push_str("    }\n");

    // Owner-gated mutators.
    src.push_str("\n    function setMaxTxAmount(uint256 amount) public onlyOwner {\n");
    src.push_str("        maxTxAmount = amount;\n");
    src.push_str("        emit LimitsUpdated(maxTxAmount, dailyLimit);\n");
    src.push_str("    }\n");

    src.push_str("\n    function setDailyLimit(uint256 amount) public onlyOwner {\n");
    src.push_str("        dailyLimit = amount;\n");
    src.push_str("        emit LimitsUpdated(maxTxAmount, dailyLimit);\n");
    src.push_str("    }\n");

    src.push_str("\n    function setApprovalSettings(bool required, uint256 threshold) public onlyOwner {\n");
    src.push_str("        require(threshold >= 1, \"threshold below 1\");\n");
    src.push_str("        requireApproval = required;\n");
    src.push_str("        approvalThreshold = threshold;\n");
    src.push_str("        emit ApprovalSettingsUpdated(required, threshold);\n");
    src.push_str("    }\n");

    src.push_str("\n    function setTimeLock(uint256 seconds_) public onlyOwner {\n");
    src.push_str("        timeLock = seconds_;\n");
    src.push_str("    }\n");

    src.push_str("\n    function addToBlacklist(address account) public onlyOwner {\n");
    src.push_str("        blacklisted[account] = true;\n");
    src.push_str("    }\n");

    src.push_str("\n    function removeFromBlacklist(address account) public onlyOwner {\n");
    src.push_str("        blacklisted[account] = false;\n");
    src.push_str("    }\n");

    src.push_str("\n    function allowToken(address token) public onlyOwner {\n");
    src.push_str("        tokenAllowListEnabled = true;\n");
    src.push_str("        allowedToken[token] = true;\n");
    src.push_str("    }\n");

    src.push_str("\n    function disallowToken(address token) public onlyOwner {\n");
    src.push_str("        allowedToken[token] = false;\n");
    src.push_str("    }\n");

    // Emergency override; validateTransaction already rolls the bucket over
    // on its own when the day changes.
    src.push_str("\n    function resetDailySpent() public onlyOwner {\n");
    src.push_str("        dailySpent = 0;\n");
    src.push_str("        lastResetDay = block.timestamp / 1 days;\n");
    src.push_str("        emit DailySpentReset(lastResetDay);\n");
    src.push_str("    }\n");

    src.push_str("\n    function pause() public onlyOwner {\n");
    src.push_str("        active = false;\n");
    src.push_str("        emit PolicyPaused();\n");
    src.push_str("    }\n");

    src.push_str("\n    function activate() public onlyOwner {\n");
    src.push_str("        active = true;\n");
    src.push_str("        emit PolicyActivated();\n");
    src.push_str("    }\n");

    src.push_str("}\n");

    Ok(GeneratedModule {
        logical_name: "SpendingPolicy".to_string(),
        description: format!(
            "Spending policy module for {}: {}",
            config.name, policy.name
        ),
        source_text: src,
    })
}
