use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Invalid credit amount: {0}")]
    InvalidAmount(u64),
    #[error("User id out of range: {0}")]
    InvalidUserId(u64),
}

impl From<libsql::Error> for LedgerError {
    fn from(e: libsql::Error) -> Self {
        LedgerError::Storage(StorageError::Turso(e))
    }
}
