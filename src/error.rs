//! Fatal error taxonomy
//!
//! Only configuration-level failures live here. Per-test failures (crash,
//! timeout, missing artifact) are encoded in `RunStatus` and never raised.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GradeError {
    /// Scene catalog root does not exist
    #[error("scene catalog root not found: {}", root.display())]
    CatalogNotFound { root: PathBuf },

    /// A candidate or oracle binary could not be launched at all
    #[error("failed to launch {program}")]
    ExecutionError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Oracle binary path does not resolve to an existing file
    #[error("oracle binary not found: {}", path.display())]
    OracleUnavailable { path: PathBuf },

    /// Assignment store could not be read or parsed
    #[error("assignment store error: {0}")]
    AssignmentStore(String),

    /// Grade could not be handed to the grading service
    #[error("grade delivery failed: {0}")]
    Delivery(String),

    /// Staging of temporary artifacts or directory walk failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

