use thiserror::Error as ThisError;

/// Failures surfaced by the persistence store.
///
/// A missing record is never an error: single-record reads return `None`.
#[derive(Debug, ThisError)]
pub enum StoreError {
    /// The local engine could not be opened or its schema upgraded.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage read error: {0}")]
    StorageRead(#[source] sqlx::Error),

    #[error("Storage write error: {0}")]
    StorageWrite(#[source] sqlx::Error),

    /// The store actor stopped or dropped the reply.
    #[error("Ractor error: {0}")]
    RactorError(String),
}
