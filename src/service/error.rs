use crate::storage::StorageError;

use super::{generation::ProviderError, ledger::LedgerError, purchase::PurchaseError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Purchase error: {0}")]
    Purchase(#[from] PurchaseError),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
