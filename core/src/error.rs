use thiserror::Error;

use crate::models::{DeployStage, DeploymentRecord};

/// Errors raised while validating a wallet configuration, before any module
/// text is produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Duplicate role id: {0}")]
    DuplicateRoleId(String),

    #[error("Identifier collision: {first:?} and {second:?} both derive `{ident}`")]
    IdentCollision {
        ident: String,
        first: String,
        second: String,
    },

    #[error("Cannot derive an identifier from {0:?}")]
    EmptyIdent(String),

    #[error("Unknown role id: {0}")]
    UnknownRole(String),

    #[error("Role id `{0}` is reserved")]
    ReservedRole(String),

    #[error("Approval threshold must be at least 1, got {0}")]
    InvalidThreshold(u32),

    #[error("Approval threshold {threshold} exceeds member count {members}")]
    ThresholdExceedsMembers { threshold: u32, members: usize },

    #[error("Invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("Invalid address {0:?}")]
    InvalidAddress(String),

    #[error("Member {address} assigned to more than one role")]
    DuplicateMember { address: String },
}

/// Errors raised by the deployment orchestrator. A stage failure carries
/// the record as it stood, so the caller can see the last completed stage
/// and resume. Confirmation timeouts are not errors: they surface as a
/// pending `DeployOutcome` so the caller can poll or resume without
/// re-submitting the creation.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Deployment stage {stage} failed: {reason}")]
    Stage {
        stage: DeployStage,
        reason: String,
        record: Box<DeploymentRecord>,
    },

    #[error("Deployment record is already linked")]
    AlreadyLinked,
}

/// Violations of the confirmation-quorum rules. None of these mutate state.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuorumError {
    #[error("Transaction {0} not found")]
    UnknownTransaction(u64),

    #[error("Transaction {0} already executed")]
    AlreadyExecuted(u64),

    #[error("{address} has not confirmed transaction {id}")]
    NotConfirmed { id: u64, address: String },

    #[error("Transaction {id} has {confirmed} of {required} required confirmations")]
    BelowThreshold {
        id: u64,
        confirmed: usize,
        required: u32,
    },
}

/// Errors from the local record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid record key: {0:?}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
