//! Grade report
//!
//! Per-scene result lines and the summary sentence, logged through `tracing`
//! and serializable to JSON for the delivery collaborator.

use serde::Serialize;
use tracing::info;

use crate::core::verdict::Verdict;
use crate::harness::RunOutcome;
use crate::runner::RunStatus;
use crate::scoring::ScoreResult;

const NAME_WIDTH: usize = 60;

/// One reported scene
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// Short scene path, or a redacted label for hidden scenes
    pub name: String,
    pub verdict: Verdict,
    #[serde(flatten)]
    pub status: RunStatus,
    pub elapsed_seconds: f64,
    pub extra_credit: bool,
    pub graded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReportEntry {
    fn from_outcome(index: usize, outcome: &RunOutcome) -> Self {
        let tc = &outcome.test_case;
        let (name, message) = if tc.hidden {
            (format!("hidden scene #{}", index + 1), None)
        } else {
            (tc.short_name(), outcome.message.clone())
        };

        Self {
            name,
            verdict: outcome.verdict,
            status: outcome.status,
            elapsed_seconds: outcome.elapsed_seconds,
            extra_credit: tc.extra_credit,
            graded: tc.graded,
            message,
        }
    }
}

/// Outcomes plus the grade computed from them
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub assignment: String,
    pub contest: bool,
    pub entries: Vec<ReportEntry>,
    pub score: ScoreResult,
}

impl Report {
    pub fn new(
        assignment: impl Into<String>,
        contest: bool,
        outcomes: &[RunOutcome],
        score: ScoreResult,
    ) -> Self {
        Self {
            assignment: assignment.into(),
            contest,
            entries: outcomes
                .iter()
                .enumerate()
                .map(|(i, o)| ReportEntry::from_outcome(i, o))
                .collect(),
            score,
        }
    }

    /// Result line for one entry, e.g. `    t1m1/SpringTests/a.xml ... [ OK ]`
    pub fn line(&self, entry: &ReportEntry) -> String {
        let tag = match entry.verdict {
            Verdict::Passed if self.contest => {
                format!("[ OK ] - {:.3} secs", entry.elapsed_seconds)
            }
            Verdict::Passed => "[ OK ]".to_string(),
            Verdict::Failed => "[FAIL]".to_string(),
            Verdict::Indeterminate => "[N/A ]".to_string(),
        };
        format!("    {:<width$} {}", entry.name, tag, width = NAME_WIDTH)
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|e| self.line(e)).collect()
    }

    pub fn summary(&self) -> String {
        let s = &self.score;
        format!(
            "Passed {} / {} required tests and {} extra credit tests for a grade of {:.3}% (lateness penalty {:.3}% included).",
            s.passed_required,
            s.total_required,
            s.passed_extra_credit,
            s.final_percent,
            s.lateness_penalty_percent
        )
    }

    /// Emit every line and the summary at info level
    pub fn log(&self) {
        info!("Results for {}:", self.assignment);
        for entry in &self.entries {
            info!("{}", self.line(entry));
            if let Some(message) = &entry.message {
                info!("        {}", message);
            }
        }
        info!("{}", self.summary());
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
