//! Core library for Modular Multisig Studio: turns a declarative role and
//! spending-policy description into three deployable Solidity modules,
//! orchestrates their (simulated) deployment in dependency order, and tracks
//! confirmation quorums client-side.

pub mod amount;
pub mod chain;
pub mod codegen;
pub mod config;
pub mod deploy;
pub mod error;
pub mod idents;
pub mod models;
pub mod quorum;
pub mod store;

#[cfg(test)]
mod tests;

pub use amount::EthAmount;
pub use codegen::assemble;
pub use deploy::{DeployOutcome, DeploymentOrchestrator};
pub use error::{ConfigError, DeployError, QuorumError, StoreError};
pub use models::{
    DeployStage, DeploymentRecord, GeneratedModule, GeneratedSystem, PendingTransaction,
    Permission, PolicyConfig, RoleDefinition, TransactionKind, WalletConfig, WalletSnapshot,
};
pub use quorum::QuorumTracker;
pub use store::Store;
