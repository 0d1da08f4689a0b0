use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::chain::{source_digest, ChainClient, TxIntent, WalletSigner};
use crate::error::DeployError;
use crate::models::{
    DeployStage, DeploymentRecord, GeneratedSystem, PendingStage, StageReceipt, WalletConfig,
};
use crate::store::Store;

/// Default bound on waiting for a creation transaction to confirm. Applied
/// uniformly to every stage.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(120);

/// The result of driving a deployment: either fully linked, or parked on an
/// unconfirmed submission that the caller can poll or resume later.
#[derive(Debug)]
pub enum DeployOutcome {
    Complete(DeploymentRecord),
    Pending(DeploymentRecord),
}

impl DeployOutcome {
    pub fn record(&self) -> &DeploymentRecord {
        match self {
            DeployOutcome::Complete(record) | DeployOutcome::Pending(record) => record,
        }
    }

    pub fn into_record(self) -> DeploymentRecord {
        match self {
            DeployOutcome::Complete(record) | DeployOutcome::Pending(record) => record,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, DeployOutcome::Complete(_))
    }
}

/// A stage-level failure before the record is attached. Converted to
/// `DeployError::Stage` at the orchestrator boundary.
struct StageFailure {
    stage: DeployStage,
    reason: String,
}

impl StageFailure {
    fn new(stage: DeployStage, reason: impl ToString) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Sequences on-chain creation of the base multisig, the manager contract,
/// and the generated policy and roles modules, then links them. Each
/// stage's address and hash are recorded (and persisted when a store is
/// attached) before the next stage starts, so a mid-sequence failure leaves
/// a resumable record.
pub struct DeploymentOrchestrator {
    signer: Arc<dyn WalletSigner>,
    chain: Arc<dyn ChainClient>,
    store: Option<Arc<Store>>,
    confirm_timeout: Duration,
}

impl DeploymentOrchestrator {
    pub fn new(signer: Arc<dyn WalletSigner>, chain: Arc<dyn ChainClient>) -> Self {
        Self {
            signer,
            chain,
            store: None,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    /// Persist the record through this store after every stage transition.
    pub fn with_store(mut self, store: Arc<Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Run a fresh deployment for an assembled system.
    pub async fn deploy(
        &self,
        config: &WalletConfig,
        system: &GeneratedSystem,
    ) -> Result<DeployOutcome, DeployError> {
        let record = DeploymentRecord::new(&config.name);
        self.run(config, system, record).await
    }

    /// Continue a partial deployment from its first incomplete stage. An
    /// unconfirmed submission on the record is waited on, never re-sent.
    pub async fn resume(
        &self,
        config: &WalletConfig,
        system: &GeneratedSystem,
        record: DeploymentRecord,
    ) -> Result<DeployOutcome, DeployError> {
        if record.is_linked() {
            return Err(DeployError::AlreadyLinked);
        }
        self.run(config, system, record).await
    }

    async fn run(
        &self,
        config: &WalletConfig,
        system: &GeneratedSystem,
        mut record: DeploymentRecord,
    ) -> Result<DeployOutcome, DeployError> {
        match self.drive(config, system, &mut record).await {
            Ok(true) => Ok(DeployOutcome::Complete(record)),
            Ok(false) => Ok(DeployOutcome::Pending(record)),
            Err(failure) => {
                self.persist(&record);
                Err(DeployError::Stage {
                    stage: failure.stage,
                    reason: failure.reason,
                    record: Box::new(record),
                })
            }
        }
    }

    /// Drive the stage machine to `Linked`. `Ok(false)` means a submission
    /// is awaiting confirmation and the record is parked on it.
    async fn drive(
        &self,
        config: &WalletConfig,
        system: &GeneratedSystem,
        record: &mut DeploymentRecord,
    ) -> Result<bool, StageFailure> {
        if let Some(pending) = record.pending.clone() {
            info!(
                wallet = %record.wallet_name,
                stage = %pending.stage,
                hash = %pending.tx_hash,
                "waiting on previously submitted transaction"
            );
            match self.await_confirmation(pending.stage, &pending.tx_hash).await? {
                Some(address) => {
                    if pending.stage == DeployStage::Linked {
                        // One half of the link confirmed; the link step below
                        // re-reads the manager and sets only what is unset.
                        record.receipts.push(StageReceipt {
                            stage: pending.stage,
                            tx_hash: pending.tx_hash,
                        });
                        record.pending = None;
                        record.updated_at = Utc::now();
                    } else {
                        record.complete_stage(pending.stage, address, pending.tx_hash);
                    }
                    self.persist(record);
                }
                None => return Ok(false),
            }
        }

        while let Some(stage) = record.stage.next() {
            let confirmed = match stage {
                DeployStage::BaseDeployed => self.deploy_base(config, record).await?,
                DeployStage::ManagerDeployed => self.deploy_manager(record).await?,
                DeployStage::PolicyDeployed => {
                    self.deploy_module(stage, &system.policy_module.logical_name,
                        &system.policy_module.source_text, record)
                        .await?
                }
                DeployStage::RolesDeployed => {
                    self.deploy_module(stage, &system.roles_module.logical_name,
                        &system.roles_module.source_text, record)
                        .await?
                }
                DeployStage::Linked => self.link(record).await?,
                DeployStage::NotStarted => unreachable!("next() never yields NotStarted"),
            };
            self.persist(record);
            if !confirmed {
                return Ok(false);
            }
            info!(wallet = %record.wallet_name, stage = %record.stage, "stage complete");
        }

        Ok(true)
    }

    async fn deploy_base(
        &self,
        config: &WalletConfig,
        record: &mut DeploymentRecord,
    ) -> Result<bool, StageFailure> {
        let mut args = config.owners.clone();
        args.push(config.threshold.to_string());
        let intent = TxIntent::Deploy {
            contract_name: "MultisigWallet".to_string(),
            source_digest: source_digest("MultisigWallet"),
            args,
        };
        self.submit_stage(DeployStage::BaseDeployed, intent, record)
            .await
    }

    async fn deploy_manager(&self, record: &mut DeploymentRecord) -> Result<bool, StageFailure> {
        let stage = DeployStage::ManagerDeployed;
        let multisig = record
            .multisig_address
            .clone()
            .ok_or_else(|| StageFailure::new(stage, "base multisig address missing"))?;
        let intent = TxIntent::Deploy {
            contract_name: "WalletManager".to_string(),
            source_digest: source_digest("WalletManager"),
            args: vec![multisig],
        };
        self.submit_stage(stage, intent, record).await
    }

    async fn deploy_module(
        &self,
        stage: DeployStage,
        logical_name: &str,
        source_text: &str,
        record: &mut DeploymentRecord,
    ) -> Result<bool, StageFailure> {
        let intent = TxIntent::Deploy {
            contract_name: logical_name.to_string(),
            source_digest: source_digest(source_text),
            args: Vec::new(),
        };
        self.submit_stage(stage, intent, record).await
    }

    /// Submit one creation and wait for it. Returns `Ok(false)` when the
    /// confirmation bound elapses; the submission stays on the record.
    async fn submit_stage(
        &self,
        stage: DeployStage,
        intent: TxIntent,
        record: &mut DeploymentRecord,
    ) -> Result<bool, StageFailure> {
        let label = intent.label();
        let hash = self
            .signer
            .sign_and_submit(intent)
            .await
            .map_err(|e| StageFailure::new(stage, e))?;
        info!(wallet = %record.wallet_name, stage = %stage, %label, %hash, "submitted");

        record.pending = Some(PendingStage {
            stage,
            tx_hash: hash.clone(),
        });
        self.persist(record);

        match self.await_confirmation(stage, &hash).await? {
            Some(address) => {
                record.complete_stage(stage, address, hash);
                Ok(true)
            }
            None => {
                warn!(
                    wallet = %record.wallet_name,
                    stage = %stage,
                    %hash,
                    "confirmation timed out, record left pending"
                );
                Ok(false)
            }
        }
    }

    /// Register the policy and roles addresses into the manager. Idempotent:
    /// the manager's current links are read first and only unset halves are
    /// submitted, so retrying a partially applied link never re-sends the
    /// completed half.
    async fn link(&self, record: &mut DeploymentRecord) -> Result<bool, StageFailure> {
        let stage = DeployStage::Linked;

        let manager = record
            .manager_address
            .clone()
            .ok_or_else(|| StageFailure::new(stage, "manager address missing"))?;
        let policy = record
            .policy_address
            .clone()
            .ok_or_else(|| StageFailure::new(stage, "policy address missing"))?;
        let roles = record
            .roles_address
            .clone()
            .ok_or_else(|| StageFailure::new(stage, "roles address missing"))?;

        let links = self
            .chain
            .read_manager_links(&manager)
            .await
            .map_err(|e| StageFailure::new(stage, e))?;

        let mut calls = Vec::new();
        if links.policy.is_none() {
            calls.push(("setPolicyModule", policy));
        }
        if links.roles.is_none() {
            calls.push(("setRolesModule", roles));
        }

        for (method, address) in calls {
            let intent = TxIntent::Call {
                to: manager.clone(),
                method: method.to_string(),
                args: vec![address],
            };
            let hash = self
                .signer
                .sign_and_submit(intent)
                .await
                .map_err(|e| StageFailure::new(stage, e))?;
            record.pending = Some(PendingStage {
                stage,
                tx_hash: hash.clone(),
            });
            self.persist(record);

            if self.await_confirmation(stage, &hash).await?.is_none() {
                warn!(wallet = %record.wallet_name, method, %hash, "link confirmation timed out");
                return Ok(false);
            }
            record.receipts.push(StageReceipt { stage, tx_hash: hash });
            record.pending = None;
        }

        // Receipts for each link call were pushed above; if both halves were
        // already linked nothing was submitted and the stage just closes out.
        record.stage = stage;
        record.pending = None;
        record.updated_at = Utc::now();
        Ok(true)
    }

    /// Wait for one confirmation. `Ok(None)` means the bound elapsed.
    async fn await_confirmation(
        &self,
        stage: DeployStage,
        hash: &str,
    ) -> Result<Option<Option<String>>, StageFailure> {
        let receipt = self
            .chain
            .wait_for_confirmation(hash, self.confirm_timeout)
            .await
            .map_err(|e| StageFailure::new(stage, e))?;
        Ok(receipt.map(|r| r.contract_address))
    }

    fn persist(&self, record: &DeploymentRecord) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_deployment(record) {
                warn!(wallet = %record.wallet_name, error = %e, "failed to persist deployment record");
            }
        }
    }
}
