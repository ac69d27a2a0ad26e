//! Test runner
//!
//! Runs every scene of a batch through the candidate binary and, unless the
//! candidate judges itself, through the oracle. Strictly sequential: one
//! candidate/oracle pair at a time, outcomes in catalog order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::catalog::TestCase;
use crate::components::oracle;
use crate::config::GraderConfig;
use crate::core::verdict::{MarkerVocabulary, Verdict};
use crate::error::GradeError;
use crate::runner::{CommandSpec, RunStatus, Runner, SuperviseResult};

/// How a batch is evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunMode {
    /// Longer deadline, time-weighted scoring
    pub is_contest: bool,
    /// Candidate prints its own verdict, no oracle pass
    pub is_robot: bool,
    /// Run extra credit scenes instead of failing them outright
    pub run_extra_credit: bool,
}

/// Result of one scene
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub test_case: TestCase,
    pub verdict: Verdict,
    /// Classification of the candidate run
    pub status: RunStatus,
    /// Candidate wall-clock seconds; the deadline on timeout, 0 when skipped
    pub elapsed_seconds: f64,
    pub timestamp: DateTime<Utc>,
    /// Diagnostic for anything other than a pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RunOutcome {
    fn new(test_case: &TestCase, verdict: Verdict, status: RunStatus, elapsed_seconds: f64) -> Self {
        Self {
            test_case: test_case.clone(),
            verdict,
            status,
            elapsed_seconds,
            timestamp: Utc::now(),
            message: None,
        }
    }

    fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }
}

/// A batch stopped by a fatal error, with the outcomes collected before it
#[derive(Debug, Error)]
#[error("batch aborted after {} outcome(s): {source}", outcomes.len())]
pub struct BatchAborted {
    pub outcomes: Vec<RunOutcome>,
    #[source]
    pub source: GradeError,
}

/// Sequential test runner
pub struct TestRunner<R: Runner> {
    runner: R,
    config: GraderConfig,
}

impl<R: Runner> TestRunner<R> {
    pub fn new(runner: R, config: GraderConfig) -> Self {
        Self { runner, config }
    }

    /// Run every test case in order.
    ///
    /// A fatal error stops the batch; outcomes gathered so far travel with it.
    pub async fn run_all(
        &self,
        tests: &[TestCase],
        candidate: &Path,
        oracle_path: &Path,
        mode: RunMode,
    ) -> Result<Vec<RunOutcome>, BatchAborted> {
        let mut outcomes = Vec::with_capacity(tests.len());

        let needs_oracle = !mode.is_robot
            && tests
                .iter()
                .any(|t| !t.extra_credit || mode.run_extra_credit);
        if needs_oracle {
            if let Err(source) = oracle::ensure_oracle_available(oracle_path).await {
                error!("Aborting batch before first run: {}", source);
                return Err(BatchAborted { outcomes, source });
            }
        }

        let deadline = self.config.candidate_deadline(mode.is_contest);
        info!(
            "Running {} scene(s) (contest={}, robot={}, extra_credit={}, deadline={:.1}s)",
            tests.len(),
            mode.is_contest,
            mode.is_robot,
            mode.run_extra_credit,
            deadline.as_secs_f64()
        );

        for tc in tests {
            if tc.extra_credit && !mode.run_extra_credit {
                outcomes.push(RunOutcome::new(tc, Verdict::Failed, RunStatus::Skipped, 0.0));
                continue;
            }

            match self.run_one(tc, candidate, oracle_path, mode).await {
                Ok(outcome) => {
                    info!(
                        "Scene {}: {} ({:?}, {:.3}s)",
                        tc.short_name(),
                        outcome.verdict,
                        outcome.status,
                        outcome.elapsed_seconds
                    );
                    outcomes.push(outcome);
                }
                Err(source) => {
                    error!(
                        "Aborting batch at scene {} after {} outcome(s): {}",
                        tc.short_name(),
                        outcomes.len(),
                        source
                    );
                    return Err(BatchAborted { outcomes, source });
                }
            }
        }

        Ok(outcomes)
    }

    async fn run_one(
        &self,
        tc: &TestCase,
        candidate: &Path,
        oracle_path: &Path,
        mode: RunMode,
    ) -> Result<RunOutcome, GradeError> {
        let deadline = self.config.candidate_deadline(mode.is_contest);

        if mode.is_robot {
            let cmd = CommandSpec::robot(candidate, &tc.path);
            let run = self.runner.supervise(&cmd, deadline, None).await?;
            let verdict = match run.status {
                RunStatus::Completed => MarkerVocabulary::V1.parse(&run.combined_output()),
                _ => Verdict::Indeterminate,
            };
            let message = match verdict {
                Verdict::Passed => None,
                Verdict::Failed => Some(run.combined_output()),
                Verdict::Indeterminate => candidate_failure_message(&run, deadline, None),
            };
            return Ok(
                RunOutcome::new(tc, verdict, run.status, run.elapsed_seconds).with_message(message)
            );
        }

        // Fresh directory per run; the artifact itself is only created by the candidate
        let artifact_dir = tempfile::tempdir()?;
        let artifact = artifact_dir.path().join("output.bin");

        let cmd = CommandSpec::candidate(candidate, &tc.path, &artifact);
        let run = self.runner.supervise(&cmd, deadline, Some(&artifact)).await?;

        if !run.is_success() {
            let message = candidate_failure_message(&run, deadline, Some(&artifact));
            return Ok(
                RunOutcome::new(tc, Verdict::Indeterminate, run.status, run.elapsed_seconds)
                    .with_message(message),
            );
        }

        let judged = oracle::judge(
            &self.runner,
            oracle_path,
            &tc.path,
            &artifact,
            self.config.oracle_deadline,
        )
        .await?;

        if judged.verdict == Verdict::Indeterminate {
            warn!("Oracle gave no verdict for {}", tc.short_name());
        }

        Ok(
            RunOutcome::new(tc, judged.verdict, run.status, run.elapsed_seconds)
                .with_message(judged.message),
        )
    }
}

fn candidate_failure_message(
    run: &SuperviseResult,
    deadline: std::time::Duration,
    artifact: Option<&Path>,
) -> Option<String> {
    match run.status {
        RunStatus::TimedOut => Some(format!(
            "Candidate took longer than {} seconds to execute.",
            deadline.as_secs_f64()
        )),
        RunStatus::Crashed(code) => Some(format!(
            "Candidate crashed (exit code {}). {}",
            code,
            run.combined_output().trim()
        )),
        RunStatus::MissingArtifact => Some(format!(
            "Failed to generate output file '{}'.",
            artifact.map(|p| p.display().to_string()).unwrap_or_default()
        )),
        _ => {
            let output = run.combined_output();
            let trimmed = output.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
    }
}
