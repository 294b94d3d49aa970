/// Errors surfaced by the control plane and data plane clients.
///
/// Only `ResourceNotFound` is ever inspected by callers; everything else is
/// treated as fatal for the operation in progress.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Requested resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource in use: {0}")]
    ResourceInUse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store service error: {0}")]
    Service(String),

    #[error("{count} write request(s) against {table} were left unprocessed")]
    Unprocessed { table: String, count: usize },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::ResourceNotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
