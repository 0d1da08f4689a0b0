use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mms_core::chain::SimulatedChain;
use mms_core::config::AppConfig;
use mms_core::quorum::{can_execute, QuorumTracker};
use mms_core::{
    assemble, DeployOutcome, DeploymentOrchestrator, Store, TransactionKind, WalletConfig,
};

mod error;
mod wallet_file;

use error::CliError;
use wallet_file::load_wallet_file;

#[derive(Parser)]
#[command(name = "mms")]
#[command(about = "Modular Multisig Studio CLI")]
struct Cli {
    /// Directory for saved wallets, deployment records, and snapshots
    /// (overrides MMS_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the three wallet modules from a declarative TOML description
    Generate {
        /// Path to the wallet description file
        #[arg(long, default_value = "wallet.toml")]
        config: String,
        /// Directory to write the generated .sol files and metadata into
        #[arg(long, default_value = "generated")]
        out: String,
    },
    /// Generate and deploy a wallet system end to end (simulated chain)
    Deploy {
        /// Path to the wallet description file
        #[arg(long, default_value = "wallet.toml")]
        config: String,
    },
    /// Continue a partial deployment from its first incomplete stage
    Resume {
        /// Name of the saved wallet
        name: String,
    },
    /// Show the deployment record for a saved wallet
    Status {
        /// Name of the saved wallet
        name: String,
    },
    /// List all saved wallets
    Wallets,
    /// Inspect and update a wallet's pending-transaction snapshot
    Tx {
        /// Name of the saved wallet
        name: String,
        #[command(subcommand)]
        command: TxCommands,
    },
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// List pending transactions and their confirmation state
    List,
    /// Propose a monetary transfer
    Transfer {
        /// Recipient address
        to: String,
        /// Amount in ETH (e.g. "0.5")
        amount: String,
    },
    /// Propose adding an owner to the base multisig
    AddOwner {
        /// Address of the new owner
        owner: String,
    },
    /// Propose removing an owner from the base multisig
    RemoveOwner {
        /// Address of the owner to remove
        owner: String,
    },
    /// Propose changing the confirmation threshold
    ChangeThreshold {
        /// The new threshold
        threshold: u32,
    },
    /// Confirm a pending transaction
    Confirm {
        /// Transaction id
        id: u64,
        /// Confirming owner address
        #[arg(long)]
        by: String,
    },
    /// Withdraw a previously given confirmation
    Revoke {
        /// Transaction id
        id: u64,
        /// Revoking owner address
        #[arg(long)]
        by: String,
    },
    /// Execute a transaction that has reached its quorum
    Execute {
        /// Transaction id
        id: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("mms={}", app_config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(|| app_config.data_dir.clone());
    let store = Arc::new(Store::open(&data_dir).context("opening data directory")?);

    match cli.command {
        Commands::Generate { config, out } => generate(&config, &out, &store),
        Commands::Deploy { config } => deploy(&config, &store, &app_config).await,
        Commands::Resume { name } => resume(&name, &store, &app_config).await,
        Commands::Status { name } => status(&name, &store),
        Commands::Wallets => wallets(&store),
        Commands::Tx { name, command } => tx(&name, command, &store),
    }
}

fn generate(config_path: &str, out: &str, store: &Store) -> anyhow::Result<()> {
    let config = load_wallet_file(config_path)?;
    let system = assemble(&config)?;

    fs::create_dir_all(out)?;
    for module in system.modules() {
        let path = PathBuf::from(out).join(format!("{}.sol", module.logical_name));
        fs::write(&path, &module.source_text)?;
        println!("wrote {}", path.display());
    }
    let metadata_path = PathBuf::from(out).join("system.json");
    fs::write(&metadata_path, serde_json::to_string_pretty(&system)?)?;
    println!("wrote {}", metadata_path.display());

    store.save_config(&config)?;
    println!(
        "Generated {} role(s), {} tier(s) for wallet {:?}",
        system.declared_roles.len(),
        system.declared_tiers.len(),
        system.wallet_name
    );
    Ok(())
}

async fn deploy(config_path: &str, store: &Arc<Store>, app: &AppConfig) -> anyhow::Result<()> {
    let config = load_wallet_file(config_path)?;
    let system = assemble(&config)?;
    store.save_config(&config)?;

    let chain = simulated_chain(app);
    let orchestrator = DeploymentOrchestrator::new(Arc::new(chain.clone()), Arc::new(chain))
        .with_store(store.clone())
        .with_confirm_timeout(app.confirm_timeout);

    let outcome = orchestrator.deploy(&config, &system).await?;
    report_outcome(&outcome);
    Ok(())
}

async fn resume(name: &str, store: &Arc<Store>, app: &AppConfig) -> anyhow::Result<()> {
    let config = store
        .load_config(name)?
        .ok_or_else(|| CliError::WalletNotFound(name.to_string()))?;
    let record = store
        .load_deployment(name)?
        .ok_or_else(|| CliError::WalletNotFound(name.to_string()))?;
    // Generation is deterministic, so the modules deployed on resume are the
    // ones the original run produced.
    let system = assemble(&config)?;

    let chain = simulated_chain(app);
    let orchestrator = DeploymentOrchestrator::new(Arc::new(chain.clone()), Arc::new(chain))
        .with_store(store.clone())
        .with_confirm_timeout(app.confirm_timeout);

    let outcome = orchestrator.resume(&config, &system, record).await?;
    report_outcome(&outcome);
    Ok(())
}

fn status(name: &str, store: &Store) -> anyhow::Result<()> {
    let record = store
        .load_deployment(name)?
        .ok_or_else(|| CliError::WalletNotFound(name.to_string()))?;
    println!("Wallet:   {}", record.wallet_name);
    println!("Stage:    {}", record.stage);
    println!("Multisig: {}", record.multisig_address.as_deref().unwrap_or("-"));
    println!("Manager:  {}", record.manager_address.as_deref().unwrap_or("-"));
    println!("Policy:   {}", record.policy_address.as_deref().unwrap_or("-"));
    println!("Roles:    {}", record.roles_address.as_deref().unwrap_or("-"));
    if let Some(pending) = &record.pending {
        println!("Pending:  {} ({})", pending.tx_hash, pending.stage);
    }
    for receipt in &record.receipts {
        println!("  {} {}", receipt.stage, receipt.tx_hash);
    }
    Ok(())
}

fn wallets(store: &Store) -> anyhow::Result<()> {
    let names = store.list_wallets()?;
    if names.is_empty() {
        println!("No saved wallets");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn tx(name: &str, command: TxCommands, store: &Store) -> anyhow::Result<()> {
    let config: WalletConfig = store
        .load_config(name)?
        .ok_or_else(|| CliError::WalletNotFound(name.to_string()))?;
    let mut tracker = match store.load_snapshot(name)? {
        Some(snapshot) => QuorumTracker::from_snapshot(&snapshot),
        None => QuorumTracker::new(),
    };

    match command {
        TxCommands::List => {
            for tx in tracker.transactions() {
                println!(
                    "#{} {:?} confirmations {}/{} executed={} executable={}",
                    tx.id,
                    tx.kind,
                    tx.confirmed_by.len(),
                    tx.required_confirmations,
                    tx.executed,
                    can_execute(tx)
                );
            }
            return Ok(());
        }
        TxCommands::Transfer { to, amount } => {
            let amount_eth = amount
                .parse()
                .map_err(|e| CliError::InvalidArg(format!("{}", e)))?;
            let id = tracker.propose(
                TransactionKind::Transfer { to, amount_eth },
                config.threshold,
            );
            println!("Proposed transfer as #{}", id);
        }
        TxCommands::AddOwner { owner } => {
            let id = tracker.propose(TransactionKind::AddOwner { owner }, config.threshold);
            println!("Proposed add-owner as #{}", id);
        }
        TxCommands::RemoveOwner { owner } => {
            let id = tracker.propose(TransactionKind::RemoveOwner { owner }, config.threshold);
            println!("Proposed remove-owner as #{}", id);
        }
        TxCommands::ChangeThreshold { threshold } => {
            let id = tracker.propose(
                TransactionKind::ChangeThreshold { threshold },
                config.threshold,
            );
            println!("Proposed change-threshold as #{}", id);
        }
        TxCommands::Confirm { id, by } => {
            tracker.confirm(id, &by)?;
            println!(
                "Confirmed #{} ({} of {} confirmations)",
                id,
                tracker.get(id)?.confirmed_by.len(),
                tracker.get(id)?.required_confirmations
            );
        }
        TxCommands::Revoke { id, by } => {
            tracker.revoke(id, &by)?;
            println!("Revoked confirmation of #{} by {}", id, by);
        }
        TxCommands::Execute { id } => {
            tracker.execute(id)?;
            println!("Executed #{}", id);
        }
    }

    store.save_snapshot(&tracker.to_snapshot(name))?;
    Ok(())
}

fn simulated_chain(app: &AppConfig) -> SimulatedChain {
    match &app.chain_seed {
        Some(seed) => SimulatedChain::new(seed),
        None => SimulatedChain::with_random_seed(),
    }
}

fn report_outcome(outcome: &DeployOutcome) {
    let record = outcome.record();
    if outcome.is_complete() {
        println!("Deployment linked for wallet {:?}", record.wallet_name);
    } else if let Some(pending) = &record.pending {
        println!(
            "Deployment pending: stage {} awaiting confirmation of {}",
            pending.stage, pending.tx_hash
        );
        println!("Run `mms resume {}` once confirmed", record.wallet_name);
    }
    println!("Multisig: {}", record.multisig_address.as_deref().unwrap_or("-"));
    println!("Manager:  {}", record.manager_address.as_deref().unwrap_or("-"));
    println!("Policy:   {}", record.policy_address.as_deref().unwrap_or("-"));
    println!("Roles:    {}", record.roles_address.as_deref().unwrap_or("-"));
}
