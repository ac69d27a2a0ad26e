//! Assignment records
//!
//! Read-only description of a gradable unit, loaded from a TOML store:
//!
//! ```toml
//! [[assignment]]
//! theme = 1
//! milestone = 2
//! oracle_path = "/opt/oracle/FOSSSimOracleT1M2"
//! due_date = "2024-02-09T23:59:00"
//!
//! [[assignment.directory]]
//! path = "assets/t1m2"
//!
//! [[assignment.directory]]
//! path = "assets/t1m2_extracredit"
//! extra_credit = true
//! ```

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::GradeError;
use crate::harness::RunMode;

/// A directory of scene files sharing grading attributes
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetDirectory {
    pub path: PathBuf,
    #[serde(default)]
    pub extra_credit: bool,
    #[serde(default = "default_true")]
    pub graded: bool,
    #[serde(default)]
    pub hidden: bool,
}

fn default_true() -> bool {
    true
}

impl fmt::Display for AssetDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<AssetDirectory '{}'{}{}>",
            self.path.display(),
            if self.graded { " Graded" } else { " Ungraded" },
            if self.hidden { " Hidden" } else { "" }
        )
    }
}

/// A gradable unit
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Assignment {
    pub theme: u32,
    pub milestone: u32,
    #[serde(default = "default_deliverable")]
    pub deliverable: u32,
    pub oracle_path: PathBuf,
    /// Local time, see `GraderConfig::due_date_utc_offset`
    pub due_date: NaiveDateTime,
    /// Time-weighted contest scoring
    #[serde(default)]
    pub contest: bool,
    /// Candidate judges itself, no oracle pass
    #[serde(default)]
    pub robot: bool,
    #[serde(default, rename = "directory")]
    pub directories: Vec<AssetDirectory>,
}

fn default_deliverable() -> u32 {
    1
}

impl Assignment {
    pub fn name(&self) -> String {
        format!("t{}m{}", self.theme, self.milestone)
    }

    pub fn is_contest(&self) -> bool {
        self.contest
    }

    pub fn is_robot(&self) -> bool {
        self.robot
    }

    /// Submissions are accepted until `late_window` after the due date, inclusive
    pub fn is_eligible(&self, now: NaiveDateTime, late_window: chrono::Duration) -> bool {
        self.due_date >= now - late_window
    }

    pub fn mode(&self, run_extra_credit: bool) -> RunMode {
        RunMode {
            is_contest: self.contest,
            is_robot: self.robot,
            run_extra_credit,
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Assignment {} due on {}>", self.name(), self.due_date)?;
        for dir in &self.directories {
            write!(f, "\n\t{}", dir)?;
        }
        Ok(())
    }
}

/// Source of assignment records
pub trait AssignmentStore {
    /// Assignments for theme/milestone still accepting submissions at `now`
    fn assignments(
        &self,
        theme: u32,
        milestone: u32,
        now: NaiveDateTime,
    ) -> Result<Vec<Assignment>, GradeError>;
}

#[derive(Debug, Deserialize)]
struct RawStore {
    #[serde(default, rename = "assignment")]
    assignments: Vec<Assignment>,
}

/// Assignment store backed by a TOML file
#[derive(Debug, Clone)]
pub struct TomlAssignmentStore {
    assignments: Vec<Assignment>,
    late_window: chrono::Duration,
}

impl TomlAssignmentStore {
    pub fn parse(content: &str, late_window: chrono::Duration) -> Result<Self, GradeError> {
        let raw: RawStore =
            toml::from_str(content).map_err(|e| GradeError::AssignmentStore(e.to_string()))?;

        Ok(Self {
            assignments: raw.assignments,
            late_window,
        })
    }

    pub fn from_file(path: &Path, late_window: chrono::Duration) -> Result<Self, GradeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GradeError::AssignmentStore(format!("failed to read {}: {}", path.display(), e))
        })?;
        let store = Self::parse(&content, late_window)?;
        info!(
            "Loaded {} assignment(s) from {}",
            store.assignments.len(),
            path.display()
        );
        Ok(store)
    }
}

impl AssignmentStore for TomlAssignmentStore {
    fn assignments(
        &self,
        theme: u32,
        milestone: u32,
        now: NaiveDateTime,
    ) -> Result<Vec<Assignment>, GradeError> {
        Ok(self
            .assignments
            .iter()
            .filter(|a| a.theme == theme && a.milestone == milestone)
            .filter(|a| a.is_eligible(now, self.late_window))
            .cloned()
            .collect())
    }
}
