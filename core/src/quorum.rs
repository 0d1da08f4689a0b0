use chrono::Utc;

use crate::error::QuorumError;
use crate::models::{PendingTransaction, TransactionKind, WalletSnapshot};

/// Whether this address has confirmed the transaction. Addresses compare
/// case-insensitively (hex casing is display-only).
pub fn is_confirmed_by(tx: &PendingTransaction, address: &str) -> bool {
    tx.confirmed_by
        .iter()
        .any(|a| a.eq_ignore_ascii_case(address))
}

/// Executable exactly when unexecuted and at or above the confirmation
/// threshold.
pub fn can_execute(tx: &PendingTransaction) -> bool {
    !tx.executed && tx.confirmed_by.len() >= tx.required_confirmations as usize
}

/// Client-side bookkeeping over a locally cached snapshot of pending
/// transactions. Mutations validate the quorum rules and reject violations
/// without touching state; callers re-fetch from the chain after any
/// successful mutation.
#[derive(Debug, Clone, Default)]
pub struct QuorumTracker {
    transactions: Vec<PendingTransaction>,
    next_id: u64,
}

impl QuorumTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &WalletSnapshot) -> Self {
        let next_id = snapshot
            .transactions
            .iter()
            .map(|tx| tx.id + 1)
            .max()
            .unwrap_or(0);
        Self {
            transactions: snapshot.transactions.clone(),
            next_id,
        }
    }

    pub fn to_snapshot(&self, wallet_name: &str) -> WalletSnapshot {
        WalletSnapshot {
            wallet_name: wallet_name.to_string(),
            transactions: self.transactions.clone(),
            updated_at: Utc::now(),
        }
    }

    pub fn transactions(&self) -> &[PendingTransaction] {
        &self.transactions
    }

    pub fn get(&self, id: u64) -> Result<&PendingTransaction, QuorumError> {
        self.transactions
            .iter()
            .find(|tx| tx.id == id)
            .ok_or(QuorumError::UnknownTransaction(id))
    }

    /// Record a new proposed transaction and return its id.
    pub fn propose(&mut self, kind: TransactionKind, required_confirmations: u32) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.transactions
            .push(PendingTransaction::new(id, kind, required_confirmations));
        id
    }

    /// Confirm a transaction. A duplicate confirmation is a no-op and never
    /// grows the confirmation set; confirming an executed transaction is
    /// rejected.
    pub fn confirm(&mut self, id: u64, address: &str) -> Result<(), QuorumError> {
        let tx = self.get_mut(id)?;
        if tx.executed {
            return Err(QuorumError::AlreadyExecuted(id));
        }
        if !is_confirmed_by(tx, address) {
            tx.confirmed_by.push(address.to_string());
        }
        Ok(())
    }

    /// Withdraw a confirmation. Only a current confirmer may revoke, and
    /// never after execution.
    pub fn revoke(&mut self, id: u64, address: &str) -> Result<(), QuorumError> {
        let tx = self.get_mut(id)?;
        if tx.executed {
            return Err(QuorumError::AlreadyExecuted(id));
        }
        let position = tx
            .confirmed_by
            .iter()
            .position(|a| a.eq_ignore_ascii_case(address))
            .ok_or_else(|| QuorumError::NotConfirmed {
                id,
                address: address.to_string(),
            })?;
        tx.confirmed_by.remove(position);
        Ok(())
    }

    /// Mark a transaction executed. Rejected below the threshold or if
    /// already executed; once flipped, `executed` never reverts.
    pub fn execute(&mut self, id: u64) -> Result<(), QuorumError> {
        let tx = self.get_mut(id)?;
        if tx.executed {
            return Err(QuorumError::AlreadyExecuted(id));
        }
        if tx.confirmed_by.len() < tx.required_confirmations as usize {
            return Err(QuorumError::BelowThreshold {
                id,
                confirmed: tx.confirmed_by.len(),
                required: tx.required_confirmations,
            });
        }
        tx.executed = true;
        Ok(())
    }

    fn get_mut(&mut self, id: u64) -> Result<&mut PendingTransaction, QuorumError> {
        self.transactions
            .iter_mut()
            .find(|tx| tx.id == id)
            .ok_or(QuorumError::UnknownTransaction(id))
    }
}
