//! Wallet signer abstraction: the funds-movement collaborator.
//!
//! The core never signs anything itself. Entry fees are paid through this
//! seam before any record is written ("pay first, record second"); a failed
//! transfer aborts the operation with no ledger mutation. The core never
//! retries a transfer.

use crate::domain::Decimal;
use async_trait::async_trait;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// A transfer intent handed to the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub amount: Decimal,
    pub from: String,
    pub to: String,
    /// Free-form label for reconciliation (e.g. "entry-fee:<quest-id>").
    pub memo: String,
}

/// Successful transfer outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_id: String,
}

/// Error type for transfer operations.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    #[error("Transfer rejected: {0}")]
    Rejected(String),
    #[error("Signer unavailable: {0}")]
    Unavailable(String),
}

/// Wallet signer trait.
#[async_trait]
pub trait WalletSigner: Send + Sync + fmt::Debug {
    /// Execute a transfer, returning a transaction id on success.
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError>;
}

/// Mock signer: accepts every transfer with a fresh uuid tx id, or rejects
/// everything when told to. Records requests for assertions.
#[derive(Debug, Default)]
pub struct MockSigner {
    reject_with: Option<String>,
    transfers: Mutex<Vec<TransferRequest>>,
}

impl MockSigner {
    /// Create an accepting mock signer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signer that rejects every transfer with the given reason.
    pub fn rejecting(reason: &str) -> Self {
        MockSigner {
            reject_with: Some(reason.to_string()),
            transfers: Mutex::new(Vec::new()),
        }
    }

    /// Transfers executed so far.
    pub fn recorded(&self) -> Vec<TransferRequest> {
        self.transfers.lock().expect("signer lock").clone()
    }
}

#[async_trait]
impl WalletSigner for MockSigner {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        if let Some(reason) = &self.reject_with {
            return Err(TransferError::Rejected(reason.clone()));
        }

        self.transfers
            .lock()
            .expect("signer lock")
            .push(request.clone());

        Ok(TransferReceipt {
            tx_id: Uuid::new_v4().to_string(),
        })
    }
}
