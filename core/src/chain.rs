use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::amount::EthAmount;

/// What the signer is asked to authorize: either a contract creation or a
/// call against an already-deployed address. Creation carries a digest of
/// the source in place of compiled bytecode (compilation is stubbed at this
/// boundary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TxIntent {
    Deploy {
        contract_name: String,
        source_digest: String,
        args: Vec<String>,
    },
    Call {
        to: String,
        method: String,
        args: Vec<String>,
    },
}

impl TxIntent {
    /// Short label for logs and failure injection.
    pub fn label(&self) -> String {
        match self {
            TxIntent::Deploy { contract_name, .. } => format!("deploy:{}", contract_name),
            TxIntent::Call { method, .. } => format!("call:{}", method),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: String,
    pub contract_address: Option<String>,
    pub confirmed: bool,
}

/// The manager contract's registered module addresses, absent until linked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerLinks {
    pub policy: Option<String>,
    pub roles: Option<String>,
}

/// Holds the key material and authorizes submissions. The orchestrator and
/// quorum mutations depend on this; custody itself is out of scope.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> String;
    async fn sign_and_submit(&self, intent: TxIntent) -> Result<String>;
}

/// Read-side collaborator over the chain. `wait_for_confirmation` returns
/// `Ok(None)` when the bound elapses without a confirmation; that is a
/// pending outcome, not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_balance(&self, address: &str) -> Result<EthAmount>;
    async fn get_code(&self, address: &str) -> Result<String>;
    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<TxReceipt>>;
    async fn wait_for_confirmation(
        &self,
        hash: &str,
        timeout: Duration,
    ) -> Result<Option<TxReceipt>>;
    async fn read_manager_links(&self, manager: &str) -> Result<ManagerLinks>;
    async fn read_owners(&self, multisig: &str) -> Result<Vec<String>>;
    async fn read_threshold(&self, multisig: &str) -> Result<u32>;
    async fn read_confirmation_count(&self, multisig: &str, tx_id: u64) -> Result<u32>;
}

// ==================== Simulated Chain ====================

#[derive(Debug, Default)]
struct SimState {
    nonce: u64,
    receipts: HashMap<String, TxReceipt>,
    code: HashMap<String, String>,
    managers: HashMap<String, ManagerLinks>,
    multisigs: HashMap<String, (Vec<String>, u32)>,
    balances: HashMap<String, EthAmount>,
    fail_labels: HashSet<String>,
    stall_labels: HashSet<String>,
}

/// In-memory chain double. Fabricates deterministic-shape addresses and
/// hashes, interprets deploy and link intents, and supports injected
/// submission failures and stalled confirmations so the orchestrator's
/// stage machine can be exercised without a real chain.
#[derive(Clone)]
pub struct SimulatedChain {
    seed: String,
    signer_address: String,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedChain {
    pub fn new(seed: &str) -> Self {
        let signer_address = derive_address(seed, 0);
        info!(seed = %seed, signer = %signer_address, "simulated chain initialized");
        Self {
            seed: seed.to_string(),
            signer_address,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// A chain with a random seed, for throwaway sessions where address
    /// stability across runs does not matter.
    pub fn with_random_seed() -> Self {
        use rand::Rng;
        let seed: u64 = rand::thread_rng().gen();
        Self::new(&format!("session-{:016x}", seed))
    }

    /// Make the next submission matching this label fail at submission time.
    pub async fn fail_next(&self, label: &str) {
        self.state
            .lock()
            .await
            .fail_labels
            .insert(label.to_string());
    }

    /// Make submissions matching this label submit but never confirm.
    pub async fn stall(&self, label: &str) {
        self.state
            .lock()
            .await
            .stall_labels
            .insert(label.to_string());
    }

    /// Confirm a previously stalled transaction.
    pub async fn release(&self, hash: &str) {
        let mut state = self.state.lock().await;
        if let Some(receipt) = state.receipts.get_mut(hash) {
            receipt.confirmed = true;
        }
    }

    pub async fn set_balance(&self, address: &str, amount: EthAmount) {
        self.state
            .lock()
            .await
            .balances
            .insert(address.to_string(), amount);
    }
}

#[async_trait]
impl WalletSigner for SimulatedChain {
    fn address(&self) -> String {
        self.signer_address.clone()
    }

    async fn sign_and_submit(&self, intent: TxIntent) -> Result<String> {
        let label = intent.label();
        let mut state = self.state.lock().await;

        if state.fail_labels.remove(&label) {
            return Err(anyhow!("submission rejected: {}", label));
        }

        state.nonce += 1;
        let nonce = state.nonce;
        let hash = derive_hash(&self.seed, nonce);
        let stalled = state.stall_labels.contains(&label);

        let contract_address = match &intent {
            TxIntent::Deploy {
                contract_name,
                source_digest,
                args,
            } => {
                let address = derive_address(&self.seed, nonce);
                state.code.insert(address.clone(), source_digest.clone());
                match contract_name.as_str() {
                    "MultisigWallet" => {
                        // Constructor args: owners..., threshold last.
                        let threshold = args
                            .last()
                            .and_then(|t| t.parse().ok())
                            .unwrap_or(1);
                        let owners = args[..args.len().saturating_sub(1)].to_vec();
                        state.multisigs.insert(address.clone(), (owners, threshold));
                    }
                    "WalletManager" => {
                        state.managers.insert(address.clone(), ManagerLinks::default());
                    }
                    _ => {}
                }
                Some(address)
            }
            TxIntent::Call { to, method, args } => {
                if let Some(links) = state.managers.get_mut(to) {
                    match method.as_str() {
                        "setPolicyModule" => links.policy = args.first().cloned(),
                        "setRolesModule" => links.roles = args.first().cloned(),
                        _ => {}
                    }
                }
                None
            }
        };

        state.receipts.insert(
            hash.clone(),
            TxReceipt {
                hash: hash.clone(),
                contract_address,
                confirmed: !stalled,
            },
        );
        debug!(label = %label, hash = %hash, stalled, "submitted");
        Ok(hash)
    }
}

#[async_trait]
impl ChainClient for SimulatedChain {
    async fn get_balance(&self, address: &str) -> Result<EthAmount> {
        let state = self.state.lock().await;
        Ok(state.balances.get(address).copied().unwrap_or(EthAmount::ZERO))
    }

    async fn get_code(&self, address: &str) -> Result<String> {
        let state = self.state.lock().await;
        Ok(state.code.get(address).cloned().unwrap_or_default())
    }

    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<TxReceipt>> {
        let state = self.state.lock().await;
        Ok(state.receipts.get(hash).cloned())
    }

    async fn wait_for_confirmation(
        &self,
        hash: &str,
        _timeout: Duration,
    ) -> Result<Option<TxReceipt>> {
        let state = self.state.lock().await;
        match state.receipts.get(hash) {
            Some(receipt) if receipt.confirmed => Ok(Some(receipt.clone())),
            Some(_) => Ok(None),
            None => Err(anyhow!("unknown transaction: {}", hash)),
        }
    }

    async fn read_manager_links(&self, manager: &str) -> Result<ManagerLinks> {
        let state = self.state.lock().await;
        state
            .managers
            .get(manager)
            .cloned()
            .ok_or_else(|| anyhow!("no manager at {}", manager))
    }

    async fn read_owners(&self, multisig: &str) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        state
            .multisigs
            .get(multisig)
            .map(|(owners, _)| owners.clone())
            .ok_or_else(|| anyhow!("no multisig at {}", multisig))
    }

    async fn read_threshold(&self, multisig: &str) -> Result<u32> {
        let state = self.state.lock().await;
        state
            .multisigs
            .get(multisig)
            .map(|(_, threshold)| *threshold)
            .ok_or_else(|| anyhow!("no multisig at {}", multisig))
    }

    async fn read_confirmation_count(&self, _multisig: &str, _tx_id: u64) -> Result<u32> {
        Ok(0)
    }
}

/// Digest of module source text, the stand-in for compiled bytecode.
pub fn source_digest(source_text: &str) -> String {
    let digest = Sha256::digest(source_text.as_bytes());
    format!("0x{}", hex::encode(digest))
}

fn derive_address(seed: &str, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.update(b"address");
    let digest = hasher.finalize();
    format!("0x{}", hex::encode(&digest[..20]))
}

fn derive_hash(seed: &str, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.update(b"tx");
    let digest = hasher.finalize();
    format!("0x{}", hex::encode(digest))
}
