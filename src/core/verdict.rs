use serde::Serialize;
use std::fmt;

/// Verdict on a single scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    Indeterminate,
}

impl Verdict {
    /// Only `Passed` counts towards a grade
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Passed => "passed",
            Verdict::Failed => "failed",
            Verdict::Indeterminate => "indeterminate",
        };
        write!(f, "{}", s)
    }
}

/// Fixed pair of verdict markers printed by oracles and self-judging candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerVocabulary {
    pub version: u32,
    pub passed: &'static str,
    pub failed: &'static str,
}

impl MarkerVocabulary {
    pub const V1: MarkerVocabulary = MarkerVocabulary {
        version: 1,
        passed: "Overall success: Passed",
        failed: "Overall success: Failed",
    };

    /// Parse captured output into a verdict.
    ///
    /// Exactly one marker must be present. No marker, or both markers, is
    /// `Indeterminate`.
    pub fn parse(&self, output: &str) -> Verdict {
        match (output.contains(self.passed), output.contains(self.failed)) {
            (true, false) => Verdict::Passed,
            (false, true) => Verdict::Failed,
            _ => Verdict::Indeterminate,
        }
    }
}

impl Default for MarkerVocabulary {
    fn default() -> Self {
        Self::V1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_verdict(output: &str) -> Verdict {
        MarkerVocabulary::default().parse(output)
    }

    #[test]
    fn test_parse_markers() {
        assert_eq!(
            parse_verdict("step 1\nOverall success: Passed.\n"),
            Verdict::Passed
        );
        assert_eq!(
            parse_verdict("Overall success: Failed.\nposition mismatch"),
            Verdict::Failed
        );
    }

    #[test]
    fn test_parse_unrecognized_is_indeterminate() {
        assert_eq!(parse_verdict(""), Verdict::Indeterminate);
        assert_eq!(parse_verdict("Segmentation fault"), Verdict::Indeterminate);
        assert_eq!(
            parse_verdict("overall success: passed"),
            Verdict::Indeterminate
        );
    }

    #[test]
    fn test_parse_both_markers_is_indeterminate() {
        let out = "Overall success: Passed\nOverall success: Failed\n";
        assert_eq!(parse_verdict(out), Verdict::Indeterminate);
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Passed.to_string(), "passed");
        assert_eq!(Verdict::Indeterminate.to_string(), "indeterminate");
        assert!(!Verdict::Indeterminate.is_passed());
    }
}
