//! Process supervisor implementation
//!
//! Runs untrusted candidate binaries and trusted oracles directly, racing the
//! child's completion against a wall-clock deadline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CommandSpec, RunStatus, Runner, SuperviseResult};
use crate::config::GraderConfig;
use crate::error::GradeError;

/// Supervisor that launches programs as direct children
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    /// Kill the child when its deadline elapses; otherwise leave it orphaned
    kill_on_timeout: bool,
    /// Exported as LD_PRELOAD to every child
    preload_library: Option<PathBuf>,
}

impl ProcessSupervisor {
    pub fn new(kill_on_timeout: bool) -> Self {
        Self {
            kill_on_timeout,
            preload_library: None,
        }
    }

    pub fn from_config(config: &GraderConfig) -> Self {
        Self {
            kill_on_timeout: config.kill_on_timeout,
            preload_library: config.preload_library.clone(),
        }
    }

    pub fn with_preload_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.preload_library = Some(library.into());
        self
    }

    /// Run a program and classify the result
    pub async fn execute(
        &self,
        spec: &CommandSpec,
        deadline: Duration,
        artifact: Option<&Path>,
    ) -> Result<SuperviseResult, GradeError> {
        debug!(
            "Supervising {:?} with args {:?} (deadline {:?})",
            spec.program, spec.args, deadline
        );

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(self.kill_on_timeout);

        if let Some(lib) = &self.preload_library {
            cmd.env("LD_PRELOAD", lib);
        }

        let child = cmd.spawn().map_err(|source| GradeError::ExecutionError {
            program: spec.program.clone(),
            source,
        })?;

        let started_at = Instant::now();

        // Dropping the wait future on timeout drops the child handle: with
        // kill_on_drop it is killed, otherwise it keeps running unobserved.
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Err(_) => {
                warn!(
                    "{} exceeded its {:.1}s deadline ({})",
                    spec.program,
                    deadline.as_secs_f64(),
                    if self.kill_on_timeout {
                        "killed"
                    } else {
                        "abandoned"
                    }
                );
                return Ok(SuperviseResult {
                    exit_code: None,
                    elapsed_seconds: deadline.as_secs_f64(),
                    stdout: String::new(),
                    stderr: String::new(),
                    status: RunStatus::TimedOut,
                });
            }
            Ok(Err(e)) => {
                warn!("Lost contact with {} while waiting: {}", spec.program, e);
                return Ok(SuperviseResult {
                    exit_code: None,
                    elapsed_seconds: started_at.elapsed().as_secs_f64(),
                    stdout: String::new(),
                    stderr: e.to_string(),
                    status: RunStatus::Crashed(-1),
                });
            }
            Ok(Ok(output)) => output,
        };

        let elapsed_seconds = started_at.elapsed().as_secs_f64();
        let exit_code = output.status.code();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        let status = if !output.status.success() {
            RunStatus::Crashed(exit_code.unwrap_or(-1))
        } else if let Some(path) = artifact {
            if artifact_exists(path).await {
                RunStatus::Completed
            } else {
                RunStatus::MissingArtifact
            }
        } else {
            RunStatus::Completed
        };

        match status {
            RunStatus::Crashed(code) => info!(
                "{} crashed (exit code {}): {}",
                spec.program,
                code,
                stderr.chars().take(200).collect::<String>()
            ),
            RunStatus::MissingArtifact => info!(
                "{} did not produce {:?}",
                spec.program,
                artifact.unwrap_or(Path::new(""))
            ),
            _ => debug!(
                "{} finished in {:.3}s, stdout={}",
                spec.program,
                elapsed_seconds,
                stdout.chars().take(200).collect::<String>()
            ),
        }

        Ok(SuperviseResult {
            exit_code,
            elapsed_seconds,
            stdout,
            stderr,
            status,
        })
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Runner for ProcessSupervisor {
    async fn supervise(
        &self,
        cmd: &CommandSpec,
        deadline: Duration,
        artifact: Option<&Path>,
    ) -> Result<SuperviseResult, GradeError> {
        self.execute(cmd, deadline, artifact).await
    }
}

async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tokio_test::assert_err;

    /// Write an executable `/bin/sh` script into `dir`
    pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "ok.sh", "echo hello; echo oops 1>&2");

        let result = ProcessSupervisor::default()
            .execute(
                &CommandSpec::new(script.to_string_lossy()),
                Duration::from_secs(5),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.stderr, "oops\n");
        assert!(result.elapsed_seconds < 5.0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_crashed_even_with_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("out.bin");
        let script = write_script(dir.path(), "crash.sh", "echo data > \"$1\"; exit 3");

        let result = ProcessSupervisor::default()
            .execute(
                &CommandSpec::new(script.to_string_lossy())
                    .with_args([artifact.to_string_lossy().into_owned()]),
                Duration::from_secs(5),
                Some(&artifact),
            )
            .await
            .unwrap();

        assert!(artifact.exists());
        assert_eq!(result.status, RunStatus::Crashed(3));
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("never-written.bin");
        let script = write_script(dir.path(), "lazy.sh", "exit 0");

        let result = ProcessSupervisor::default()
            .execute(
                &CommandSpec::new(script.to_string_lossy()),
                Duration::from_secs(5),
                Some(&artifact),
            )
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::MissingArtifact);
    }

    #[tokio::test]
    async fn test_deadline_reports_exact_elapsed() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "slow.sh", "sleep 10");
        let deadline = Duration::from_millis(300);

        let result = ProcessSupervisor::default()
            .execute(&CommandSpec::new(script.to_string_lossy()), deadline, None)
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::TimedOut);
        assert_eq!(result.elapsed_seconds, deadline.as_secs_f64());
        assert_eq!(result.exit_code, None);
    }

    #[tokio::test]
    async fn test_abandon_on_timeout_still_returns() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "hang.sh", "sleep 2");

        let started = std::time::Instant::now();
        let result = ProcessSupervisor::new(false)
            .execute(
                &CommandSpec::new(script.to_string_lossy()),
                Duration::from_millis(200),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unlaunchable_binary_is_execution_error() {
        let result = ProcessSupervisor::default()
            .execute(
                &CommandSpec::new("/nonexistent/scene-grader-candidate"),
                Duration::from_secs(1),
                None,
            )
            .await;

        let err = assert_err!(result);
        assert!(matches!(err, GradeError::ExecutionError { .. }));
    }

    #[tokio::test]
    async fn test_preload_library_is_exported() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "env.sh", "echo \"preload=$LD_PRELOAD\"");

        let result = ProcessSupervisor::default()
            .with_preload_library("/nonexistent/libpreload.so")
            .execute(
                &CommandSpec::new(script.to_string_lossy()),
                Duration::from_secs(5),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.stdout, "preload=/nonexistent/libpreload.so\n");
    }
}
