//! Grader configuration
//!
//! Deadlines, penalty rates and grading constants. Loaded once from the
//! environment by the binary and passed explicitly to every component.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Grader configuration
#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// Candidate deadline for standard assignments (default: 8s)
    pub standard_deadline: Duration,
    /// Candidate deadline for contest assignments (default: 60s)
    pub contest_deadline: Duration,
    /// Deadline for a single oracle invocation (default: 8s)
    pub oracle_deadline: Duration,
    /// Oracle's own runtime on contest scenes, full credit at or below it
    pub oracle_runtime_contest: f64,
    /// Contest runtime at which speed credit reaches zero
    pub max_runtime_contest: f64,
    /// Lateness penalty in percentage points per minute late
    pub points_lost_per_minute: f64,
    /// Bonus points awarded for passing every extra credit scene
    pub extra_credit_points: f64,
    /// Offset added to stored due dates to bring them to UTC
    pub due_date_utc_offset: chrono::Duration,
    /// Grace period after the due date during which submissions are accepted
    pub late_window: chrono::Duration,
    /// Scene descriptor file extension (without the dot)
    pub scene_extension: String,
    /// Kill children that overrun their deadline instead of abandoning them
    pub kill_on_timeout: bool,
    /// Library exported as LD_PRELOAD to every supervised child
    pub preload_library: Option<PathBuf>,
    /// Grade endpoint; the grade is sent as a `grade` query parameter
    pub autograde_url: Option<String>,
    /// Attempts per grade delivery (default: 3)
    pub delivery_attempts: u32,
    /// Timeout of a single delivery request (default: 10s)
    pub delivery_timeout: Duration,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            standard_deadline: Duration::from_secs(8),
            contest_deadline: Duration::from_secs(60),
            oracle_deadline: Duration::from_secs(8),
            oracle_runtime_contest: 1.0,
            max_runtime_contest: 60.0,
            points_lost_per_minute: 1.0 / 6.0,
            extra_credit_points: 15.0,
            due_date_utc_offset: chrono::Duration::hours(5),
            late_window: chrono::Duration::hours(10),
            scene_extension: "xml".to_string(),
            kill_on_timeout: true,
            preload_library: None,
            autograde_url: None,
            delivery_attempts: 3,
            delivery_timeout: Duration::from_secs(10),
        }
    }
}

impl GraderConfig {
    /// Build configuration from `GRADER_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            standard_deadline: env_secs("GRADER_STANDARD_DEADLINE_SECS")
                .unwrap_or(defaults.standard_deadline),
            contest_deadline: env_secs("GRADER_CONTEST_DEADLINE_SECS")
                .unwrap_or(defaults.contest_deadline),
            oracle_deadline: env_secs("GRADER_ORACLE_DEADLINE_SECS")
                .unwrap_or(defaults.oracle_deadline),
            oracle_runtime_contest: env_parse("GRADER_ORACLE_RUNTIME_CONTEST")
                .unwrap_or(defaults.oracle_runtime_contest),
            max_runtime_contest: env_parse("GRADER_MAX_RUNTIME_CONTEST")
                .unwrap_or(defaults.max_runtime_contest),
            points_lost_per_minute: env_parse("GRADER_POINTS_LOST_PER_MINUTE")
                .unwrap_or(defaults.points_lost_per_minute),
            extra_credit_points: env_parse("GRADER_EXTRA_CREDIT_POINTS")
                .unwrap_or(defaults.extra_credit_points),
            due_date_utc_offset: env_parse("GRADER_DUE_DATE_UTC_OFFSET_HOURS")
                .map(chrono::Duration::hours)
                .unwrap_or(defaults.due_date_utc_offset),
            late_window: env_parse("GRADER_LATE_WINDOW_HOURS")
                .map(chrono::Duration::hours)
                .unwrap_or(defaults.late_window),
            scene_extension: std::env::var("GRADER_SCENE_EXTENSION")
                .map(|ext| ext.trim_start_matches('.').to_string())
                .unwrap_or(defaults.scene_extension),
            kill_on_timeout: std::env::var("GRADER_KILL_ON_TIMEOUT")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.kill_on_timeout),
            preload_library: std::env::var("GRADER_PRELOAD_LIBRARY")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            autograde_url: std::env::var("GRADER_AUTOGRADE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            delivery_attempts: env_parse::<u32>("GRADER_DELIVERY_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.delivery_attempts),
            delivery_timeout: env_secs("GRADER_DELIVERY_TIMEOUT_SECS")
                .unwrap_or(defaults.delivery_timeout),
        }
    }

    /// Candidate deadline for the given assignment kind
    pub fn candidate_deadline(&self, is_contest: bool) -> Duration {
        if is_contest {
            self.contest_deadline
        } else {
            self.standard_deadline
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}, using default", key, raw);
            None
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<f64>(key)
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
}
