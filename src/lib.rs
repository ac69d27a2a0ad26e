//! Scene grader
//!
//! Runs a candidate simulator over a catalog of scene files, judges each
//! result with a trusted oracle, and turns the outcomes into a grade.

pub mod assignment;
pub mod catalog;
pub mod components;
pub mod config;
pub mod core;
pub mod delivery;
pub mod error;
pub mod harness;
pub mod report;
pub mod runner;
pub mod scoring;

pub use assignment::{AssetDirectory, Assignment, AssignmentStore, TomlAssignmentStore};
pub use catalog::{CatalogFilter, SceneCatalog, TestCase};
pub use config::GraderConfig;
pub use crate::core::verdict::{MarkerVocabulary, Verdict};
pub use delivery::{GradeSink, HttpGradeSink, LogGradeSink};
pub use error::GradeError;
pub use harness::{BatchAborted, RunMode, RunOutcome, TestRunner};
pub use report::Report;
pub use runner::{CommandSpec, ProcessSupervisor, RunStatus, Runner, SuperviseResult};
pub use scoring::{ScoreResult, ScoringPolicy};
