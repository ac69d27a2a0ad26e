//! Oracle adapter
//!
//! Runs the trusted reference evaluator against an artifact produced by a
//! candidate and turns its printed verdict into a `Verdict`.

use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::verdict::{MarkerVocabulary, Verdict};
use crate::error::GradeError;
use crate::runner::{CommandSpec, RunStatus, Runner};

/// Result of running the oracle
#[derive(Debug)]
pub struct OracleResult {
    pub verdict: Verdict,
    /// Oracle output kept for anything other than a pass
    pub message: Option<String>,
}

/// Fail fast unless `oracle_path` names an existing file
pub async fn ensure_oracle_available(oracle_path: &Path) -> Result<(), GradeError> {
    match tokio::fs::metadata(oracle_path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(GradeError::OracleUnavailable {
            path: oracle_path.to_path_buf(),
        }),
    }
}

/// Judge `artifact` for `scene` with the oracle binary.
///
/// Arguments to oracle: -s <scene> -d 0 -i <artifact>
pub async fn judge(
    runner: &dyn Runner,
    oracle_path: &Path,
    scene: &Path,
    artifact: &Path,
    deadline: Duration,
) -> Result<OracleResult, GradeError> {
    ensure_oracle_available(oracle_path).await?;

    info!(
        "Running oracle: {:?} with scene={:?}, artifact={:?}",
        oracle_path, scene, artifact
    );

    let cmd = CommandSpec::oracle(oracle_path, scene, artifact);
    let result = runner.supervise(&cmd, deadline, None).await?;

    debug!(
        "Oracle result: status={:?}, elapsed={:.3}s, stdout={}",
        result.status,
        result.elapsed_seconds,
        result.stdout.chars().take(200).collect::<String>()
    );

    let verdict = match result.status {
        RunStatus::Completed => MarkerVocabulary::V1.parse(&result.stdout),
        _ => Verdict::Indeterminate,
    };

    let message = match verdict {
        Verdict::Passed => None,
        _ if result.status == RunStatus::TimedOut => Some(format!(
            "Oracle took longer than {} seconds to check result.",
            deadline.as_secs_f64()
        )),
        _ => {
            let output = result.combined_output();
            let trimmed = output.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    };

    Ok(OracleResult { verdict, message })
}
