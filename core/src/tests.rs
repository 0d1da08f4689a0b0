//! Core library tests, organized by module:
//! - Identifier derivation and collision guarding
//! - ETH amount parsing and canonical formatting
//! - Configuration validation
//! - Module generation (determinism, ordering, content)
//! - Quorum arithmetic
//! - Deployment orchestration (simulated chain, resumability, timeouts)
//! - Store round-trips

use crate::amount::EthAmount;
use crate::models::{
    AmountRule, MemberAssignment, Permission, PolicyConfig, RoleDefinition, WalletConfig,
};

const ADDR_A: &str = "0x00000000000000000000000000000000000000a1";
const ADDR_B: &str = "0x00000000000000000000000000000000000000b2";
const ADDR_C: &str = "0x00000000000000000000000000000000000000c3";
const ADDR_D: &str = "0x00000000000000000000000000000000000000d4";
const TOKEN: &str = "0x00000000000000000000000000000000000000e5";

fn eth(s: &str) -> EthAmount {
    s.parse().expect("valid amount")
}

fn role(id: &str, name: &str, level: u8, permissions: Vec<Permission>) -> RoleDefinition {
    RoleDefinition {
        id: id.to_string(),
        display_name: name.to_string(),
        description: String::new(),
        level,
        permissions,
        enabled: true,
    }
}

/// A configuration exercising every generator feature: three roles, two
/// amount tiers, a blacklist entry, and a token allow list.
fn sample_config() -> WalletConfig {
    WalletConfig {
        name: "treasury".to_string(),
        owners: vec![ADDR_A.to_string(), ADDR_B.to_string(), ADDR_C.to_string()],
        threshold: 2,
        roles: vec![
            role("admin", "Admin", 100, Permission::ALL.to_vec()),
            role(
                "manager",
                "Manager",
                80,
                vec![
                    Permission::ExecuteTransaction,
                    Permission::ApproveTransaction,
                    Permission::ViewTransactions,
                    Permission::ManageMembers,
                ],
            ),
            role(
                "member",
                "Member",
                40,
                vec![Permission::ExecuteTransaction, Permission::ViewTransactions],
            ),
        ],
        members: vec![
            MemberAssignment {
                address: ADDR_A.to_string(),
                role_id: "admin".to_string(),
            },
            MemberAssignment {
                address: ADDR_B.to_string(),
                role_id: "member".to_string(),
            },
        ],
        policy: PolicyConfig {
            name: "default".to_string(),
            description: String::new(),
            max_tx_amount_eth: eth("1.5"),
            daily_limit_eth: eth("2"),
            require_approval: true,
            approval_threshold: 2,
            time_lock_seconds: 0,
            amount_rules: vec![
                AmountRule {
                    threshold_eth: eth("0.5"),
                    required_role_id: "manager".to_string(),
                    enabled: true,
                },
                AmountRule {
                    threshold_eth: eth("1"),
                    required_role_id: "admin".to_string(),
                    enabled: true,
                },
            ],
            allowed_tokens: vec![TOKEN.to_string()],
            blacklisted_addresses: vec![ADDR_D.to_string()],
        },
    }
}

// ============================================================================
// Identifier Tests
// ============================================================================

mod ident_tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::idents::{amount_ident, role_ident, IdentTable};

    #[test]
    fn test_role_ident_sanitizes() {
        assert_eq!(role_ident("Manager").unwrap(), "manager");
        assert_eq!(role_ident("Senior Trader!").unwrap(), "seniortrader");
        assert_eq!(role_ident("Ops-Team 2").unwrap(), "opsteam2");
    }

    #[test]
    fn test_role_ident_prefixes_leading_digit() {
        assert_eq!(role_ident("2nd Approver").unwrap(), "role_2ndapprover");
    }

    #[test]
    fn test_role_ident_rejects_empty_result() {
        assert!(matches!(
            role_ident("!!!"),
            Err(ConfigError::EmptyIdent(_))
        ));
    }

    #[test]
    fn test_amount_ident_encodes_parts_separately() {
        assert_eq!(amount_ident(eth("0.1")), "0_1");
        assert_eq!(amount_ident(eth("1")), "1_0");
        assert_eq!(amount_ident(eth("0.5")), "0_5");
        assert_eq!(amount_ident(eth("12")), "12_0");
        assert_eq!(amount_ident(eth("12.05")), "12_05");
        // The pair the encoding exists for: these must never collide.
        assert_ne!(amount_ident(eth("0.1")), amount_ident(eth("1")));
    }

    #[test]
    fn test_collision_guard_fails_generation() {
        let mut config = sample_config();
        // "Manager" and "manager!" sanitize to the same identifier.
        config.roles.push(role(
            "manager2",
            "manager!",
            50,
            vec![Permission::ViewTransactions],
        ));
        let err = IdentTable::build(&config).unwrap_err();
        match err {
            ConfigError::IdentCollision { ident, first, second } => {
                assert_eq!(ident, "manager");
                assert_eq!(first, "Manager");
                assert_eq!(second, "manager!");
            }
            other => panic!("expected IdentCollision, got {:?}", other),
        }
    }

    #[test]
    fn test_disabled_roles_do_not_collide() {
        let mut config = sample_config();
        let mut shadow = role("manager2", "manager!", 50, vec![]);
        shadow.enabled = false;
        config.roles.push(shadow);
        assert!(IdentTable::build(&config).is_ok());
    }

    #[test]
    fn test_table_lookups() {
        let config = sample_config();
        let table = IdentTable::build(&config).unwrap();
        assert_eq!(table.role("manager"), Some("manager"));
        assert_eq!(table.role_members_array("admin").unwrap(), "adminMembers");
        assert_eq!(table.tier_predicate(eth("0.5")).unwrap(), "amountAbove0_5");
        assert_eq!(table.tier_alias(eth("1")).unwrap(), "requires1_0Approval");
        assert_eq!(table.role("ghost"), None);
    }
}

// ============================================================================
// Amount Tests
// ============================================================================

mod amount_tests {
    use super::*;
    use crate::amount::WEI_PER_ETH;

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(eth("1").wei(), WEI_PER_ETH);
        assert_eq!(eth("0.5").wei(), WEI_PER_ETH / 2);
        assert_eq!(eth("0.05").wei(), WEI_PER_ETH / 20);
        assert_eq!(eth("2.25").wei(), WEI_PER_ETH * 9 / 4);
        assert_eq!(eth(".5").wei(), WEI_PER_ETH / 2);
        assert_eq!(eth("3.").wei(), WEI_PER_ETH * 3);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<EthAmount>().is_err());
        assert!("-1".parse::<EthAmount>().is_err());
        assert!("1.2.3".parse::<EthAmount>().is_err());
        assert!("abc".parse::<EthAmount>().is_err());
        assert!(".".parse::<EthAmount>().is_err());
        // 19 fractional digits exceeds wei resolution.
        assert!("0.0000000000000000001".parse::<EthAmount>().is_err());
    }

    #[test]
    fn test_canonical_display() {
        assert_eq!(eth("1").to_string(), "1");
        assert_eq!(eth("0.50").to_string(), "0.5");
        assert_eq!(eth("12.050").to_string(), "12.05");
        assert_eq!(eth("0").to_string(), "0");
    }

    #[test]
    fn test_frac_digits() {
        assert_eq!(eth("1").frac_digits(), "0");
        assert_eq!(eth("0.5").frac_digits(), "5");
        assert_eq!(eth("0.05").frac_digits(), "05");
    }

    #[test]
    fn test_serde_round_trip() {
        let amount = eth("2.25");
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"2.25\"");
        let back: EthAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}

// ============================================================================
// Configuration Validation Tests
// ============================================================================

mod config_tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_sample_config_is_valid() {
        sample_config().validate().unwrap();
    }

    #[test]
    fn test_duplicate_role_id_rejected() {
        let mut config = sample_config();
        config.roles.push(role("admin", "Second Admin", 90, vec![]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateRoleId(id)) if id == "admin"
        ));
    }

    #[test]
    fn test_unknown_role_in_member_rejected() {
        let mut config = sample_config();
        config.members.push(MemberAssignment {
            address: ADDR_C.to_string(),
            role_id: "ghost".to_string(),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownRole(id)) if id == "ghost"
        ));
    }

    #[test]
    fn test_unknown_role_in_rule_rejected() {
        let mut config = sample_config();
        config.policy.amount_rules.push(AmountRule {
            threshold_eth: eth("10"),
            required_role_id: "ghost".to_string(),
            enabled: true,
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = sample_config();
        config.threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold(0))
        ));

        let mut config = sample_config();
        config.threshold = 4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdExceedsMembers { threshold: 4, members: 3 })
        ));
    }

    #[test]
    fn test_approval_threshold_bounds() {
        let mut config = sample_config();
        config.policy.approval_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold(0))
        ));

        // More approvals required than there are owners to give them.
        let mut config = sample_config();
        config.policy.approval_threshold = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdExceedsMembers { threshold: 10, members: 3 })
        ));
    }

    #[test]
    fn test_malformed_address_rejected() {
        let mut config = sample_config();
        config.owners.push("0x1234".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_member_in_two_roles_rejected() {
        let mut config = sample_config();
        config.members.push(MemberAssignment {
            // Same address as an existing member, different hex casing.
            address: ADDR_A.to_uppercase().replace("0X", "0x"),
            role_id: "member".to_string(),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateMember { .. })
        ));
    }
}

// ============================================================================
// Code Generation Tests
// ============================================================================

mod codegen_tests {
    use super::*;
    use crate::codegen::{
        assemble, generate_integration_module, generate_policy_module, generate_roles_module,
    };
    use crate::codegen::{integration, policy};
    use crate::idents::IdentTable;
    use pretty_assertions::assert_eq;

    fn positions_in_order(haystack: &str, needles: &[&str]) {
        let mut last = 0;
        for needle in needles {
            let at = haystack[last..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing or out of order: {:?}", needle));
            last += at;
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let config = sample_config();
        let first = assemble(&config).unwrap();
        let second = assemble(&config).unwrap();
        assert_eq!(
            first.roles_module.source_text,
            second.roles_module.source_text
        );
        assert_eq!(
            first.policy_module.source_text,
            second.policy_module.source_text
        );
        assert_eq!(
            first.integration_module.source_text,
            second.integration_module.source_text
        );
    }

    #[test]
    fn test_roles_module_structure() {
        let config = sample_config();
        let table = IdentTable::build(&config).unwrap();
        let module = generate_roles_module(&config, &table).unwrap();
        let src = &module.source_text;

        assert!(src.contains("address[] public adminMembers;"));
        assert!(src.contains("address[] public managerMembers;"));
        assert!(src.contains("address[] public memberMembers;"));
        // Exclusive assignment: the old role's array is vacated first.
        positions_in_order(
            src,
            &[
                "function assignRole",
                "cannot assign reserved admin role",
                "_removeFromRole(member);",
                "_addToRole(member, roleId);",
            ],
        );
        assert!(src.contains("function _swapPop(address[] storage arr, address member)"));
        assert!(src.contains("cannot remove admin role holder"));
        assert!(src.contains("onlyWithPermission(\"modify-permissions\")"));
        // Seeded state from the configuration.
        assert!(src.contains("rolePermissions[\"member\"][\"execute-transaction\"] = true;"));
        assert!(src.contains("roleLevel[\"manager\"] = 80;"));
        // Seed addresses are wrapped through uint160 so the emitted literal
        // never trips solc's EIP-55 checksum validation.
        assert!(src.contains(&format!("_seed(address(uint160({})), \"admin\");", ADDR_A)));
        // Per-role accessors.
        assert!(src.contains("function getManagerMembers()"));
        assert!(src.contains("function getMemberMemberCount()"));
    }

    #[test]
    fn test_roles_module_excludes_disabled_roles() {
        let mut config = sample_config();
        config.roles[2].enabled = false;
        let table = IdentTable::build(&config).unwrap();
        let module = generate_roles_module(&config, &table).unwrap();
        assert!(!module.source_text.contains("memberMembers"));
    }

    #[test]
    fn test_policy_module_check_order_and_reasons() {
        let config = sample_config();
        let table = IdentTable::build(&config).unwrap();
        let module = generate_policy_module(&config, &table).unwrap();
        let src = &module.source_text;

        // The validation pipeline keeps its fixed order: pause, day rollover,
        // daily limit, per-tx max, blacklist (from then to), token allow list.
        let body_start = src.find("function validateTransaction").unwrap();
        positions_in_order(
            &src[body_start..],
            &[
                policy::REASON_PAUSED,
                "dailySpent = 0;",
                policy::REASON_DAILY_LIMIT,
                policy::REASON_MAX_TX,
                policy::REASON_SENDER_BLACKLISTED,
                policy::REASON_RECIPIENT_BLACKLISTED,
                policy::REASON_TOKEN_NOT_ALLOWED,
                policy::REASON_APPROVED,
            ],
        );

        // Limits are embedded as wei literals.
        assert!(src.contains("maxTxAmount = 1500000000000000000;"));
        assert!(src.contains("dailyLimit = 2000000000000000000;"));

        // Tier predicates and their aliases share semantics.
        assert!(src.contains("function amountAbove0_5(uint256 amount)"));
        assert!(src.contains("function requires0_5Approval(uint256 amount)"));
        assert!(src.contains("return amount >= 500000000000000000;"));

        // Deny and allow lists are seeded, with addresses wrapped through
        // uint160 to sidestep solc's EIP-55 checksum on hex literals.
        assert!(src.contains(&format!("blacklisted[address(uint160({}))] = true;", ADDR_D)));
        assert!(src.contains(&format!("allowedToken[address(uint160({}))] = true;", TOKEN)));
        // Native asset bypasses the allow list.
        assert!(src.contains("token != address(0)"));
    }

    #[test]
    fn test_policy_module_without_allow_list() {
        let mut config = sample_config();
        config.policy.allowed_tokens.clear();
        let table = IdentTable::build(&config).unwrap();
        let module = generate_policy_module(&config, &table).unwrap();
        // The allowToken mutator can still flip the flag later; only the
        // constructor must leave the allow list disabled.
        let src = &module.source_text;
        let constructor = &src[..src.find("modifier onlyOwner").unwrap()];
        assert!(!constructor.contains("tokenAllowListEnabled = true;"));
        assert!(!constructor.contains("allowedToken["));
    }

    #[test]
    fn test_integration_tier_order_short_circuits() {
        let config = sample_config();
        let table = IdentTable::build(&config).unwrap();
        let module = generate_integration_module(&config, &table).unwrap();
        let src = &module.source_text;

        // Permission gate first, then tiers in declared order, then the
        // delegate call. Each tier returns on failure, so the first unmet
        // tier's reason is the one emitted.
        positions_in_order(
            src,
            &[
                "function validateTransactionWithRole",
                integration::REASON_NO_EXECUTE_PERMISSION,
                "amountAbove0_5",
                &integration::tier_rejection_reason("manager", eth("0.5")),
                "amountAbove1_0",
                &integration::tier_rejection_reason("admin", eth("1")),
                "return policyModule.validateTransaction(member, to, amount, token);",
            ],
        );

        // Tier rejections name the required role and threshold.
        assert!(src.contains("requires admin role for amounts of 1 ETH or more"));

        // Pass-through queries for roles and tiers.
        assert!(src.contains("function isManager(address member)"));
        assert!(src.contains("function isAdmin(address member)"));
        assert!(src.contains("function requires1_0Approval(uint256 amount)"));
    }

    #[test]
    fn test_assemble_metadata() {
        let config = sample_config();
        let system = assemble(&config).unwrap();
        assert_eq!(system.wallet_name, "treasury");
        assert_eq!(system.declared_roles, vec!["admin", "manager", "member"]);
        assert_eq!(system.declared_tiers, vec![eth("0.5"), eth("1")]);
        // Timestamps never leak into module text.
        let year_fragment = system.generated_at.format("%Y").to_string() + "-";
        for module in system.modules() {
            assert!(!module.source_text.contains(&year_fragment));
        }
    }

    #[test]
    fn test_assemble_rejects_collision_before_generating() {
        let mut config = sample_config();
        config.roles.push(role("manager2", "manager!", 50, vec![]));
        assert!(assemble(&config).is_err());
    }
}

// ============================================================================
// Quorum Tests
// ============================================================================

mod quorum_tests {
    use super::*;
    use crate::error::QuorumError;
    use crate::models::TransactionKind;
    use crate::quorum::{can_execute, is_confirmed_by, QuorumTracker};

    fn transfer() -> TransactionKind {
        TransactionKind::Transfer {
            to: ADDR_D.to_string(),
            amount_eth: eth("0.3"),
        }
    }

    #[test]
    fn test_two_confirmations_reach_quorum() {
        let mut tracker = QuorumTracker::new();
        let id = tracker.propose(transfer(), 2);

        tracker.confirm(id, ADDR_A).unwrap();
        assert!(!can_execute(tracker.get(id).unwrap()));

        tracker.confirm(id, ADDR_B).unwrap();
        let tx = tracker.get(id).unwrap();
        assert!(is_confirmed_by(tx, ADDR_A));
        assert!(is_confirmed_by(tx, ADDR_B));
        assert!(can_execute(tx));

        tracker.execute(id).unwrap();
        assert!(tracker.get(id).unwrap().executed);
    }

    #[test]
    fn test_duplicate_confirmation_does_not_grow_count() {
        let mut tracker = QuorumTracker::new();
        let id = tracker.propose(transfer(), 2);
        tracker.confirm(id, ADDR_A).unwrap();
        tracker.confirm(id, ADDR_A).unwrap();
        // Case-insensitive duplicate.
        tracker
            .confirm(id, &ADDR_A.to_uppercase().replace("0X", "0x"))
            .unwrap();
        assert_eq!(tracker.get(id).unwrap().confirmed_by.len(), 1);
        assert!(!can_execute(tracker.get(id).unwrap()));
    }

    #[test]
    fn test_revoke_by_non_confirmer_rejected() {
        let mut tracker = QuorumTracker::new();
        let id = tracker.propose(transfer(), 2);
        tracker.confirm(id, ADDR_A).unwrap();
        let err = tracker.revoke(id, ADDR_B).unwrap_err();
        assert_eq!(
            err,
            QuorumError::NotConfirmed {
                id,
                address: ADDR_B.to_string()
            }
        );
        // The failed revoke mutated nothing.
        assert_eq!(tracker.get(id).unwrap().confirmed_by.len(), 1);
    }

    #[test]
    fn test_execute_below_threshold_rejected() {
        let mut tracker = QuorumTracker::new();
        let id = tracker.propose(transfer(), 2);
        tracker.confirm(id, ADDR_A).unwrap();
        let err = tracker.execute(id).unwrap_err();
        assert_eq!(
            err,
            QuorumError::BelowThreshold {
                id,
                confirmed: 1,
                required: 2
            }
        );
        assert!(!tracker.get(id).unwrap().executed);
    }

    #[test]
    fn test_executed_transaction_is_frozen() {
        let mut tracker = QuorumTracker::new();
        let id = tracker.propose(transfer(), 2);
        tracker.confirm(id, ADDR_A).unwrap();
        tracker.confirm(id, ADDR_B).unwrap();
        tracker.execute(id).unwrap();

        assert_eq!(
            tracker.confirm(id, ADDR_C).unwrap_err(),
            QuorumError::AlreadyExecuted(id)
        );
        assert_eq!(
            tracker.revoke(id, ADDR_A).unwrap_err(),
            QuorumError::AlreadyExecuted(id)
        );
        assert_eq!(
            tracker.execute(id).unwrap_err(),
            QuorumError::AlreadyExecuted(id)
        );
        // Still exactly the two original confirmations.
        assert_eq!(tracker.get(id).unwrap().confirmed_by.len(), 2);
    }

    #[test]
    fn test_unknown_transaction() {
        let mut tracker = QuorumTracker::new();
        assert_eq!(
            tracker.confirm(99, ADDR_A).unwrap_err(),
            QuorumError::UnknownTransaction(99)
        );
    }

    #[test]
    fn test_governance_kinds_track_like_transfers() {
        let mut tracker = QuorumTracker::new();
        let id = tracker.propose(
            TransactionKind::ChangeThreshold { threshold: 3 },
            2,
        );
        assert!(tracker.get(id).unwrap().kind.is_governance());
        tracker.confirm(id, ADDR_A).unwrap();
        tracker.confirm(id, ADDR_B).unwrap();
        tracker.execute(id).unwrap();
    }

    #[test]
    fn test_snapshot_round_trip_preserves_ids() {
        let mut tracker = QuorumTracker::new();
        let id = tracker.propose(transfer(), 2);
        tracker.confirm(id, ADDR_A).unwrap();

        let snapshot = tracker.to_snapshot("treasury");
        let mut restored = QuorumTracker::from_snapshot(&snapshot);
        assert!(is_confirmed_by(restored.get(id).unwrap(), ADDR_A));
        // New proposals continue after the highest existing id.
        let next = restored.propose(transfer(), 2);
        assert_eq!(next, id + 1);
    }
}

// ============================================================================
// Deployment Tests
// ============================================================================

mod deploy_tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::chain::{ChainClient, SimulatedChain};
    use crate::codegen::assemble;
    use crate::deploy::{DeployOutcome, DeploymentOrchestrator};
    use crate::error::DeployError;
    use crate::models::DeployStage;

    fn orchestrator(chain: &SimulatedChain) -> DeploymentOrchestrator {
        DeploymentOrchestrator::new(Arc::new(chain.clone()), Arc::new(chain.clone()))
            .with_confirm_timeout(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_full_deployment_reaches_linked() {
        let chain = SimulatedChain::new("test");
        let config = sample_config();
        let system = assemble(&config).unwrap();

        let outcome = orchestrator(&chain).deploy(&config, &system).await.unwrap();
        assert!(outcome.is_complete());

        let record = outcome.into_record();
        assert_eq!(record.stage, DeployStage::Linked);
        assert!(record.multisig_address.is_some());
        assert!(record.manager_address.is_some());
        assert!(record.policy_address.is_some());
        assert!(record.roles_address.is_some());
        assert!(record.pending.is_none());
        // Four creations plus two link calls.
        assert_eq!(record.receipts.len(), 6);

        // The manager ends up pointing at the deployed modules.
        let links = chain
            .read_manager_links(record.manager_address.as_ref().unwrap())
            .await
            .unwrap();
        assert_eq!(links.policy, record.policy_address);
        assert_eq!(links.roles, record.roles_address);

        // Base constructor args made it on chain.
        let owners = chain
            .read_owners(record.multisig_address.as_ref().unwrap())
            .await
            .unwrap();
        assert_eq!(owners, config.owners);
        let threshold = chain
            .read_threshold(record.multisig_address.as_ref().unwrap())
            .await
            .unwrap();
        assert_eq!(threshold, 2);
    }

    #[tokio::test]
    async fn test_stage_failure_preserves_partial_record() {
        let chain = SimulatedChain::new("test");
        let config = sample_config();
        let system = assemble(&config).unwrap();

        chain.fail_next("call:setPolicyModule").await;
        let err = orchestrator(&chain)
            .deploy(&config, &system)
            .await
            .unwrap_err();

        let record = match err {
            DeployError::Stage { stage, record, .. } => {
                assert_eq!(stage, DeployStage::Linked);
                *record
            }
            other => panic!("expected stage error, got {:?}", other),
        };

        // Everything before the link survived.
        assert_eq!(record.stage, DeployStage::RolesDeployed);
        assert!(record.policy_address.is_some());
        assert!(record.roles_address.is_some());
        assert_eq!(record.receipts.len(), 4);

        // Retrying the link alone completes the deployment without
        // redeploying policy or roles.
        let outcome = orchestrator(&chain)
            .resume(&config, &system, record)
            .await
            .unwrap();
        assert!(outcome.is_complete());
        let record = outcome.into_record();
        assert_eq!(record.receipts.len(), 6);
    }

    #[tokio::test]
    async fn test_confirmation_timeout_yields_pending_record() {
        let chain = SimulatedChain::new("test");
        let config = sample_config();
        let system = assemble(&config).unwrap();

        chain.stall("deploy:MultisigWallet").await;
        let outcome = orchestrator(&chain).deploy(&config, &system).await.unwrap();

        let record = match outcome {
            DeployOutcome::Pending(record) => record,
            DeployOutcome::Complete(_) => panic!("expected pending outcome"),
        };
        assert_eq!(record.stage, DeployStage::NotStarted);
        let pending = record.pending.clone().expect("pending submission recorded");
        assert_eq!(pending.stage, DeployStage::BaseDeployed);

        // Once the transaction confirms, resuming waits on the recorded hash
        // instead of re-submitting, then drives the rest of the stages.
        chain.release(&pending.tx_hash).await;
        let outcome = orchestrator(&chain)
            .resume(&config, &system, record)
            .await
            .unwrap();
        assert!(outcome.is_complete());
        let record = outcome.into_record();
        assert_eq!(record.receipts.len(), 6);
        assert_eq!(
            record.receipts[0].tx_hash, pending.tx_hash,
            "base stage used the original submission"
        );
    }

    #[tokio::test]
    async fn test_partially_applied_link_is_not_resent() {
        let chain = SimulatedChain::new("test");
        let config = sample_config();
        let system = assemble(&config).unwrap();

        chain.stall("call:setRolesModule").await;
        let outcome = orchestrator(&chain).deploy(&config, &system).await.unwrap();
        let record = match outcome {
            DeployOutcome::Pending(record) => record,
            DeployOutcome::Complete(_) => panic!("expected pending outcome"),
        };
        let pending = record.pending.clone().expect("stalled link on record");
        assert_eq!(pending.stage, DeployStage::Linked);
        // The policy half already confirmed.
        assert_eq!(record.receipts.len(), 5);

        chain.release(&pending.tx_hash).await;
        let outcome = orchestrator(&chain)
            .resume(&config, &system, record)
            .await
            .unwrap();
        assert!(outcome.is_complete());
        // No additional submissions were needed: the confirmed half was
        // read back from the manager, not re-sent.
        assert_eq!(outcome.record().receipts.len(), 6);
    }

    #[tokio::test]
    async fn test_chain_error_mid_stage_surfaces_last_completed_stage() {
        use crate::chain::{MockChainClient, MockWalletSigner, TxReceipt};

        let mut signer = MockWalletSigner::new();
        signer
            .expect_sign_and_submit()
            .returning(|_| Ok("0xfeed".to_string()));

        // Base confirms, then the chain goes away while waiting on the
        // manager creation.
        let mut chain = MockChainClient::new();
        let mut confirmations = 0u32;
        chain.expect_wait_for_confirmation().returning(move |hash, _| {
            confirmations += 1;
            if confirmations == 1 {
                Ok(Some(TxReceipt {
                    hash: hash.to_string(),
                    contract_address: Some(ADDR_A.to_string()),
                    confirmed: true,
                }))
            } else {
                Err(anyhow::anyhow!("rpc connection lost"))
            }
        });

        let config = sample_config();
        let system = assemble(&config).unwrap();
        let orchestrator = DeploymentOrchestrator::new(Arc::new(signer), Arc::new(chain))
            .with_confirm_timeout(Duration::from_secs(1));

        let err = orchestrator.deploy(&config, &system).await.unwrap_err();
        match err {
            DeployError::Stage { stage, reason, record } => {
                assert_eq!(stage, DeployStage::ManagerDeployed);
                assert!(reason.contains("rpc connection lost"));
                assert_eq!(record.stage, DeployStage::BaseDeployed);
                assert_eq!(record.multisig_address.as_deref(), Some(ADDR_A));
            }
            other => panic!("expected stage error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resume_of_linked_record_rejected() {
        let chain = SimulatedChain::new("test");
        let config = sample_config();
        let system = assemble(&config).unwrap();

        let record = orchestrator(&chain)
            .deploy(&config, &system)
            .await
            .unwrap()
            .into_record();
        let err = orchestrator(&chain)
            .resume(&config, &system, record)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::AlreadyLinked));
    }

    #[tokio::test]
    async fn test_fabricated_addresses_are_stable_per_seed() {
        let config = sample_config();
        let system = assemble(&config).unwrap();

        let first = orchestrator(&SimulatedChain::new("alpha"));
        let second = orchestrator(&SimulatedChain::new("alpha"));
        let a = first.deploy(&config, &system).await.unwrap();
        let b = second.deploy(&config, &system).await.unwrap();
        assert_eq!(a.record().multisig_address, b.record().multisig_address);
    }
}

// ============================================================================
// Store Tests
// ============================================================================

mod store_tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{DeployStage, DeploymentRecord};
    use crate::quorum::QuorumTracker;
    use crate::store::Store;

    #[test]
    fn test_deployment_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let mut record = DeploymentRecord::new("My Treasury");
        record.complete_stage(
            DeployStage::BaseDeployed,
            Some(ADDR_A.to_string()),
            "0xabc".to_string(),
        );
        store.save_deployment(&record).unwrap();

        let loaded = store.load_deployment("My Treasury").unwrap().unwrap();
        assert_eq!(loaded.stage, DeployStage::BaseDeployed);
        assert_eq!(loaded.multisig_address.as_deref(), Some(ADDR_A));
        assert_eq!(loaded.receipts.len(), 1);
    }

    #[test]
    fn test_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert!(store.load_deployment("nothing-here").unwrap().is_none());
    }

    #[test]
    fn test_config_and_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let config = sample_config();
        store.save_config(&config).unwrap();
        let loaded = store.load_config("treasury").unwrap().unwrap();
        assert_eq!(loaded.roles.len(), 3);
        assert_eq!(loaded.policy.daily_limit_eth, eth("2"));

        let mut tracker = QuorumTracker::new();
        tracker.propose(
            crate::models::TransactionKind::AddOwner {
                owner: ADDR_D.to_string(),
            },
            2,
        );
        store.save_snapshot(&tracker.to_snapshot("treasury")).unwrap();
        let snapshot = store.load_snapshot("treasury").unwrap().unwrap();
        assert_eq!(snapshot.transactions.len(), 1);
    }

    #[test]
    fn test_list_wallets() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store
            .save_deployment(&DeploymentRecord::new("beta wallet"))
            .unwrap();
        store
            .save_deployment(&DeploymentRecord::new("Alpha"))
            .unwrap();
        assert_eq!(store.list_wallets().unwrap(), vec!["alpha", "beta-wallet"]);
    }

    #[test]
    fn test_unusable_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let err = store
            .save_deployment(&DeploymentRecord::new("???"))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
