//! Runner module - Process supervision layer
//!
//! This module provides a unified interface for running external programs
//! under a wall-clock deadline:
//! - `ProcessSupervisor`: launches candidate and oracle binaries directly
//!
//! The runner module does NOT:
//! - Parse verdict markers
//! - Know about scenes, assignments or grades

pub mod supervisor;

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::error::GradeError;

/// Command specification for execution
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program path or name
    pub program: String,
    /// Arguments to the program
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    /// Candidate invocation writing its simulation to `artifact`:
    /// `candidate -s <scene> -d 0 -o <artifact>`
    pub fn candidate(binary: &Path, scene: &Path, artifact: &Path) -> Self {
        Self::new(binary.to_string_lossy()).with_args([
            "-s".to_string(),
            scene.to_string_lossy().into_owned(),
            "-d".to_string(),
            "0".to_string(),
            "-o".to_string(),
            artifact.to_string_lossy().into_owned(),
        ])
    }

    /// Self-judging candidate invocation, verdict printed on stdout:
    /// `candidate -s <scene> -d 0`
    pub fn robot(binary: &Path, scene: &Path) -> Self {
        Self::new(binary.to_string_lossy()).with_args([
            "-s".to_string(),
            scene.to_string_lossy().into_owned(),
            "-d".to_string(),
            "0".to_string(),
        ])
    }

    /// Oracle invocation checking `artifact`:
    /// `oracle -s <scene> -d 0 -i <artifact>`
    pub fn oracle(binary: &Path, scene: &Path, artifact: &Path) -> Self {
        Self::new(binary.to_string_lossy()).with_args([
            "-s".to_string(),
            scene.to_string_lossy().into_owned(),
            "-d".to_string(),
            "0".to_string(),
            "-i".to_string(),
            artifact.to_string_lossy().into_owned(),
        ])
    }

    /// Convert to a vector of strings (program + args)
    pub fn to_vec(&self) -> Vec<String> {
        let mut v = vec![self.program.clone()];
        v.extend(self.args.clone());
        v
    }
}

/// Classification of a supervised run (raw, no verdict interpretation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "exit_code", rename_all = "snake_case")]
pub enum RunStatus {
    /// Exited with code 0 and produced the expected artifact, if any
    Completed,
    /// Exited with a non-zero code (-1 when killed by a signal)
    Crashed(i32),
    /// Deadline elapsed before the program exited
    TimedOut,
    /// Exited with code 0 but the expected artifact is absent
    MissingArtifact,
    /// Never launched (extra credit scenes not opted in)
    Skipped,
}

impl RunStatus {
    /// Check if execution was successful
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

/// Result of supervising one program
#[derive(Debug, Clone)]
pub struct SuperviseResult {
    /// Exit code, `None` on timeout or signal
    pub exit_code: Option<i32>,
    /// Wall-clock seconds; exactly the deadline on timeout
    pub elapsed_seconds: f64,
    /// Stdout content
    pub stdout: String,
    /// Stderr content
    pub stderr: String,
    /// Execution status
    pub status: RunStatus,
}

impl SuperviseResult {
    /// Check if execution was successful
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Captured stdout followed by captured stderr
    pub fn combined_output(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len());
        combined.push_str(&self.stdout);
        combined.push_str(&self.stderr);
        combined
    }
}

/// Runner trait for supervising programs
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run a command under `deadline`, checking for `artifact` after exit.
    ///
    /// Errors only when the program cannot be started at all.
    async fn supervise(
        &self,
        cmd: &CommandSpec,
        deadline: Duration,
        artifact: Option<&Path>,
    ) -> Result<SuperviseResult, GradeError>;
}

// Re-exports
pub use supervisor::ProcessSupervisor;
