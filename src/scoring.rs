//! Scoring engine
//!
//! Turns run outcomes into a percentage grade. Two policies share one
//! lateness step:
//! - standard: pass ratio of required scenes plus an additive extra credit bonus
//! - contest: per-scene speed credit on a cube-root curve between the oracle's
//!   runtime and the maximum runtime
//!
//! Only graded outcomes are scored, and only `Passed` counts as a pass.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::GraderConfig;
use crate::harness::RunOutcome;

/// Grade with its audit trail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    /// Grade after the lateness penalty, never negative
    pub final_percent: f64,
    /// Grade before the lateness penalty
    pub base_percent: f64,
    /// `100 * round(passed / total, 3)` over required scenes (standard policy)
    pub required_percent: f64,
    pub extra_credit_bonus: f64,
    pub minutes_late: f64,
    pub lateness_penalty_percent: f64,
    pub passed_required: usize,
    pub total_required: usize,
    pub passed_extra_credit: usize,
    pub total_extra_credit: usize,
}

/// Counts over graded outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    passed_required: usize,
    total_required: usize,
    passed_extra_credit: usize,
    total_extra_credit: usize,
}

impl Tally {
    fn of(outcomes: &[RunOutcome]) -> Self {
        let mut tally = Tally::default();
        for outcome in outcomes.iter().filter(|o| o.test_case.graded) {
            let passed = outcome.verdict.is_passed() as usize;
            if outcome.test_case.extra_credit {
                tally.total_extra_credit += 1;
                tally.passed_extra_credit += passed;
            } else {
                tally.total_required += 1;
                tally.passed_required += passed;
            }
        }
        tally
    }
}

/// Grading constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pub points_lost_per_minute: f64,
    pub extra_credit_points: f64,
    pub due_date_utc_offset: chrono::Duration,
    pub oracle_runtime: f64,
    pub max_runtime: f64,
}

impl ScoringPolicy {
    pub fn from_config(config: &GraderConfig) -> Self {
        Self {
            points_lost_per_minute: config.points_lost_per_minute,
            extra_credit_points: config.extra_credit_points,
            due_date_utc_offset: config.due_date_utc_offset,
            oracle_runtime: config.oracle_runtime_contest,
            max_runtime: config.max_runtime_contest,
        }
    }

    /// Score with the policy matching the assignment kind
    pub fn score_for(
        &self,
        is_contest: bool,
        outcomes: &[RunOutcome],
        due_date: NaiveDateTime,
        now: DateTime<Utc>,
    ) -> ScoreResult {
        if is_contest {
            self.score_contest(outcomes, due_date, now, self.oracle_runtime, self.max_runtime)
        } else {
            self.score(outcomes, due_date, now)
        }
    }

    /// Standard policy
    pub fn score(
        &self,
        outcomes: &[RunOutcome],
        due_date: NaiveDateTime,
        now: DateTime<Utc>,
    ) -> ScoreResult {
        let tally = Tally::of(outcomes);

        let required_percent = if tally.total_required == 0 {
            100.0
        } else {
            100.0 * round3(tally.passed_required as f64 / tally.total_required as f64)
        };

        let extra_credit_bonus = if tally.total_extra_credit > 0 {
            round3(
                self.extra_credit_points * tally.passed_extra_credit as f64
                    / tally.total_extra_credit as f64,
            )
        } else {
            0.0
        };

        self.finish(tally, required_percent, extra_credit_bonus, due_date, now)
    }

    /// Contest policy: passed scenes earn a share scaled by how close their
    /// runtime is to the oracle's.
    pub fn score_contest(
        &self,
        outcomes: &[RunOutcome],
        due_date: NaiveDateTime,
        now: DateTime<Utc>,
        oracle_runtime: f64,
        max_runtime: f64,
    ) -> ScoreResult {
        let tally = Tally::of(outcomes);
        let total = tally.total_required + tally.total_extra_credit;

        let accumulated = if total == 0 {
            0.0
        } else {
            let share = 100.0 / total as f64;
            outcomes
                .iter()
                .filter(|o| o.test_case.graded && o.verdict.is_passed())
                .map(|o| share * speed_factor(o.elapsed_seconds, oracle_runtime, max_runtime))
                .sum()
        };

        let mut result = self.finish(tally, accumulated, 0.0, due_date, now);
        result.required_percent = 0.0;
        result
    }

    fn finish(
        &self,
        tally: Tally,
        required_percent: f64,
        extra_credit_bonus: f64,
        due_date: NaiveDateTime,
        now: DateTime<Utc>,
    ) -> ScoreResult {
        let base_percent = required_percent + extra_credit_bonus;
        let minutes_late = minutes_late(due_date, now, self.due_date_utc_offset);
        let lateness_penalty_percent = minutes_late * self.points_lost_per_minute;
        let final_percent = apply_lateness(base_percent, lateness_penalty_percent);

        debug!(
            "Score: base={:.3}, minutes_late={:.1}, penalty={:.3}, final={:.3}",
            base_percent, minutes_late, lateness_penalty_percent, final_percent
        );

        ScoreResult {
            final_percent,
            base_percent,
            required_percent,
            extra_credit_bonus,
            minutes_late,
            lateness_penalty_percent,
            passed_required: tally.passed_required,
            total_required: tally.total_required,
            passed_extra_credit: tally.passed_extra_credit,
            total_extra_credit: tally.total_extra_credit,
        }
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::from_config(&GraderConfig::default())
    }
}

/// Minutes elapsed since the due date (local time shifted by `utc_offset`), never negative
pub fn minutes_late(
    due_date: NaiveDateTime,
    now: DateTime<Utc>,
    utc_offset: chrono::Duration,
) -> f64 {
    let due = Utc.from_utc_datetime(&(due_date + utc_offset));
    let late = now.signed_duration_since(due);
    (late.num_milliseconds() as f64 / 60_000.0).max(0.0)
}

/// Multiplicative penalty against the earned base, floored at zero
pub fn apply_lateness(base_percent: f64, penalty_percent: f64) -> f64 {
    (base_percent * (100.0 - penalty_percent) / 100.0).max(0.0)
}

/// 1 at the oracle's runtime, above 1 when faster, 0 at or beyond `max_runtime`
fn speed_factor(elapsed: f64, oracle_runtime: f64, max_runtime: f64) -> f64 {
    let span = max_runtime - oracle_runtime;
    if span <= 0.0 {
        return if elapsed <= max_runtime { 1.0 } else { 0.0 };
    }
    ((max_runtime - elapsed) / span).max(0.0).powf(1.0 / 3.0)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TestCase;
    use crate::core::verdict::Verdict;
    use crate::runner::RunStatus;

    fn due() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-02-09T23:59:00", "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    /// `now` exactly at the due date (after the UTC shift)
    fn on_time(policy: &ScoringPolicy) -> DateTime<Utc> {
        Utc.from_utc_datetime(&(due() + policy.due_date_utc_offset))
    }

    fn outcome(extra_credit: bool, verdict: Verdict, elapsed: f64) -> RunOutcome {
        RunOutcome {
            test_case: TestCase::new("scene.xml").extra_credit(extra_credit),
            verdict,
            status: RunStatus::Completed,
            elapsed_seconds: elapsed,
            timestamp: Utc::now(),
            message: None,
        }
    }

    fn batch(required: (usize, usize), extra: (usize, usize)) -> Vec<RunOutcome> {
        let mut outcomes = Vec::new();
        for i in 0..required.1 {
            let verdict = if i < required.0 { Verdict::Passed } else { Verdict::Failed };
            outcomes.push(outcome(false, verdict, 1.0));
        }
        for i in 0..extra.1 {
            let verdict = if i < extra.0 { Verdict::Passed } else { Verdict::Indeterminate };
            outcomes.push(outcome(true, verdict, 1.0));
        }
        outcomes
    }

    #[test]
    fn test_standard_ratio() {
        let policy = ScoringPolicy::default();
        let result = policy.score(&batch((7, 10), (0, 0)), due(), on_time(&policy));

        assert_eq!(result.final_percent, 70.0);
        assert_eq!(result.lateness_penalty_percent, 0.0);
        assert_eq!(result.passed_required, 7);
        assert_eq!(result.total_required, 10);
    }

    #[test]
    fn test_standard_extra_credit_exceeds_hundred() {
        let policy = ScoringPolicy::default();
        let result = policy.score(&batch((10, 10), (2, 4)), due(), on_time(&policy));

        assert_eq!(result.extra_credit_bonus, 7.5);
        assert_eq!(result.base_percent, 107.5);
        assert_eq!(result.final_percent, 107.5);
    }

    #[test]
    fn test_one_hour_late() {
        let policy = ScoringPolicy::default();
        let now = on_time(&policy) + chrono::Duration::minutes(60);
        let result = policy.score(&batch((4, 4), (0, 0)), due(), now);

        assert_eq!(result.minutes_late, 60.0);
        assert!((result.lateness_penalty_percent - 10.0).abs() < 1e-9);
        assert!((result.final_percent - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_early_submission_has_no_penalty() {
        let policy = ScoringPolicy::default();
        let now = on_time(&policy) - chrono::Duration::days(2);
        let result = policy.score(&batch((1, 2), (0, 0)), due(), now);

        assert_eq!(result.minutes_late, 0.0);
        assert_eq!(result.final_percent, 50.0);
    }

    #[test]
    fn test_very_late_floors_at_zero() {
        let policy = ScoringPolicy::default();
        let now = on_time(&policy) + chrono::Duration::hours(20);
        let result = policy.score(&batch((3, 3), (0, 0)), due(), now);

        assert!(result.lateness_penalty_percent > 100.0);
        assert_eq!(result.final_percent, 0.0);
    }

    #[test]
    fn test_zero_required_is_full_base() {
        let policy = ScoringPolicy::default();
        let result = policy.score(&[], due(), on_time(&policy));
        assert_eq!(result.base_percent, 100.0);

        let only_extra = batch((0, 0), (0, 2));
        let result = policy.score(&only_extra, due(), on_time(&policy));
        assert_eq!(result.required_percent, 100.0);
        assert_eq!(result.extra_credit_bonus, 0.0);
    }

    #[test]
    fn test_indeterminate_is_not_passed() {
        let policy = ScoringPolicy::default();
        let outcomes = vec![
            outcome(false, Verdict::Passed, 1.0),
            outcome(false, Verdict::Indeterminate, 1.0),
        ];
        let result = policy.score(&outcomes, due(), on_time(&policy));
        assert_eq!(result.final_percent, 50.0);
    }

    #[test]
    fn test_ungraded_outcomes_are_ignored() {
        let policy = ScoringPolicy::default();
        let mut outcomes = batch((1, 1), (0, 0));
        let mut ungraded = outcome(false, Verdict::Failed, 1.0);
        ungraded.test_case = ungraded.test_case.graded(false);
        outcomes.push(ungraded);

        let result = policy.score(&outcomes, due(), on_time(&policy));
        assert_eq!(result.total_required, 1);
        assert_eq!(result.final_percent, 100.0);
    }

    #[test]
    fn test_scoring_is_pure() {
        let policy = ScoringPolicy::default();
        let outcomes = batch((5, 9), (1, 3));
        let now = on_time(&policy) + chrono::Duration::minutes(17);

        assert_eq!(
            policy.score(&outcomes, due(), now),
            policy.score(&outcomes, due(), now)
        );
        assert_eq!(
            policy.score_contest(&outcomes, due(), now, 1.0, 60.0),
            policy.score_contest(&outcomes, due(), now, 1.0, 60.0)
        );
    }

    #[test]
    fn test_contest_curve_endpoints() {
        let policy = ScoringPolicy::default();
        let now = on_time(&policy);

        let at_oracle = vec![outcome(false, Verdict::Passed, 1.0), outcome(false, Verdict::Failed, 1.0)];
        let result = policy.score_contest(&at_oracle, due(), now, 1.0, 60.0);
        assert!((result.final_percent - 50.0).abs() < 1e-9);

        let too_slow = vec![outcome(false, Verdict::Passed, 60.0), outcome(false, Verdict::Passed, 75.0)];
        let result = policy.score_contest(&too_slow, due(), now, 1.0, 60.0);
        assert_eq!(result.final_percent, 0.0);
    }

    #[test]
    fn test_contest_cube_root_curve() {
        let policy = ScoringPolicy::default();
        // (60 - 52.625) / (60 - 1) = 0.125, cube root 0.5
        let outcomes = vec![outcome(false, Verdict::Passed, 52.625)];
        let result = policy.score_contest(&outcomes, due(), on_time(&policy), 1.0, 60.0);
        assert!((result.final_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_contest_failed_and_indeterminate_earn_nothing() {
        let policy = ScoringPolicy::default();
        let outcomes = vec![
            outcome(false, Verdict::Failed, 0.5),
            outcome(true, Verdict::Indeterminate, 0.5),
        ];
        let result = policy.score_contest(&outcomes, due(), on_time(&policy), 1.0, 60.0);
        assert_eq!(result.final_percent, 0.0);
    }

    #[test]
    fn test_contest_faster_than_oracle_earns_bonus() {
        let policy = ScoringPolicy::default();
        let outcomes = vec![outcome(false, Verdict::Passed, 0.1)];
        let result = policy.score_contest(&outcomes, due(), on_time(&policy), 1.0, 60.0);

        let expected = 100.0 * (59.9f64 / 59.0).powf(1.0 / 3.0);
        assert!((result.final_percent - expected).abs() < 1e-9);
        assert!((result.final_percent - 100.50591080267802).abs() < 1e-9);
        assert!(result.final_percent > 100.0);
    }

    #[test]
    fn test_contest_lateness() {
        let policy = ScoringPolicy::default();
        let now = on_time(&policy) + chrono::Duration::minutes(30);
        let outcomes = vec![outcome(false, Verdict::Passed, 1.0)];
        let result = policy.score_for(true, &outcomes, due(), now);
        assert!((result.final_percent - 95.0).abs() < 1e-9);
    }
}
