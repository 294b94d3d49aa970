use store::StoreError;

/// A table whose deletion failed during a cleanup hook.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupFailure {
    pub table: String,
    pub error: StoreError,
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// The emulator was not reachable and could not be launched. Aborts the run.
    #[error("Failed to launch the local store on port {port}: {reason}")]
    Bootstrap { port: u16, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to delete {count} fixture table(s): {summary}")]
    Cleanup {
        count: usize,
        summary: String,
        failures: Vec<CleanupFailure>,
    },

    #[error("Invalid fixture configuration: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl FixtureError {
    pub(crate) fn cleanup(failures: Vec<CleanupFailure>) -> Self {
        let summary = failures
            .iter()
            .map(|failure| format!("{} ({})", failure.table, failure.error))
            .collect::<Vec<_>>()
            .join(", ");
        FixtureError::Cleanup {
            count: failures.len(),
            summary,
            failures,
        }
    }
}

pub type Result<T, E = FixtureError> = std::result::Result<T, E>;
