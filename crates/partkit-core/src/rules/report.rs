//! Violations and validation results.

use crate::process::report::duration_ms;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// A rule that did not hold for one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Rule that produced the violation.
    pub rule_id: String,

    /// Part the rule was evaluated against.
    #[serde(rename = "where")]
    pub target: String,

    /// Human-readable explanation.
    pub message: String,

    /// Selector of the rule.
    pub xpath: String,

    /// Expected value as displayed.
    pub expected: String,

    /// Selected value, `None` when nothing matched or evaluation failed.
    pub actual: Option<String>,

    /// Value before any fix.
    pub before: Option<String>,

    /// Value re-read after a fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,

    /// Whether the part was rewritten.
    pub auto_fixed: bool,

    /// Weight of the rule.
    pub weight: f64,

    /// Category of the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// When the violation was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Profile name of the rule set.
    pub profile: String,

    /// Weighted compliance score, 0 to 100.
    pub score: u8,

    /// Number of enabled rules.
    pub total_rules: usize,

    /// Collected violations in rule order.
    pub violations: Vec<Violation>,

    /// Number of violations that were auto-fixed.
    pub auto_fixed: usize,

    /// Time spent, in milliseconds on the wire.
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl ValidationResult {
    /// Returns `true` if no violations were collected.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Collects violations and computes the score.
#[derive(Debug, Default)]
pub struct ViolationReporter {
    max: Option<usize>,
    violations: Vec<Violation>,
    total_rules: usize,
    total_weight: f64,
    violated: HashSet<String>,
    violated_weight: f64,
    auto_fixed: usize,
}

impl ViolationReporter {
    /// Creates a reporter that keeps at most `max` violations.
    #[must_use]
    pub fn new(max: Option<usize>) -> Self {
        Self {
            max,
            ..Self::default()
        }
    }

    /// Counts an enabled rule toward the score.
    pub fn register_rule(&mut self, weight: f64) {
        self.total_rules += 1;
        self.total_weight += weight;
    }

    /// Records a violation.
    ///
    /// Returns `false` if the cap has been reached and the violation was
    /// dropped.
    pub fn record(&mut self, violation: Violation) -> bool {
        if self.is_full() {
            return false;
        }
        if self.violated.insert(violation.rule_id.clone()) {
            self.violated_weight += violation.weight;
        }
        if violation.auto_fixed {
            self.auto_fixed += 1;
        }
        self.violations.push(violation);
        true
    }

    /// Returns `true` once the cap is reached.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.max.is_some_and(|max| self.violations.len() >= max)
    }

    /// Returns the number of recorded violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Computes `round(100 * (total - violated) / total)`.
    ///
    /// Each violated rule's weight counts once. The score is 100 when the
    /// total weight is zero or nothing was violated.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn score(&self) -> u8 {
        if self.total_weight <= 0.0 || self.violated.is_empty() {
            return 100;
        }
        let ratio = (self.total_weight - self.violated_weight) / self.total_weight;
        (100.0 * ratio).round().clamp(0.0, 100.0) as u8
    }

    /// Finishes into a result.
    #[must_use]
    pub fn finish(self, profile: &str, duration: Duration) -> ValidationResult {
        let score = self.score();
        ValidationResult {
            profile: profile.to_string(),
            score,
            total_rules: self.total_rules,
            violations: self.violations,
            auto_fixed: self.auto_fixed,
            duration,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn violation(rule_id: &str, weight: f64) -> Violation {
        Violation {
            rule_id: rule_id.to_string(),
            target: "ppt/theme/theme1.xml".to_string(),
            message: "mismatch".to_string(),
            xpath: "//a:accent1/a:srgbClr/@val".to_string(),
            expected: "#005BBB".to_string(),
            actual: Some("#2277CC".to_string()),
            before: Some("#2277CC".to_string()),
            after: None,
            auto_fixed: false,
            weight,
            category: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_score_counts_rule_weight_once() {
        let mut reporter = ViolationReporter::new(None);
        reporter.register_rule(1.0);
        reporter.register_rule(3.0);
        assert!(reporter.record(violation("a", 1.0)));
        assert!(reporter.record(violation("a", 1.0)));
        assert_eq!(reporter.score(), 75);
        assert!(reporter.record(violation("b", 3.0)));
        assert_eq!(reporter.score(), 0);
    }

    #[test]
    fn test_score_edge_cases() {
        let reporter = ViolationReporter::new(None);
        assert_eq!(reporter.score(), 100);

        let mut zero = ViolationReporter::new(None);
        zero.register_rule(0.0);
        zero.record(violation("a", 0.0));
        assert_eq!(zero.score(), 100);

        let mut thirds = ViolationReporter::new(None);
        for _ in 0..3 {
            thirds.register_rule(1.0);
        }
        thirds.record(violation("a", 1.0));
        assert_eq!(thirds.score(), 67);
    }

    #[test]
    fn test_cap() {
        let mut reporter = ViolationReporter::new(Some(2));
        reporter.register_rule(1.0);
        assert!(reporter.record(violation("a", 1.0)));
        assert!(!reporter.is_full());
        assert!(reporter.record(violation("a", 1.0)));
        assert!(reporter.is_full());
        assert!(!reporter.record(violation("a", 1.0)));
        assert_eq!(reporter.len(), 2);
    }

    #[test]
    fn test_finish_serializes_wire_names() {
        let mut reporter = ViolationReporter::new(None);
        reporter.register_rule(1.0);
        let mut fixed = violation("accent1", 1.0);
        fixed.auto_fixed = true;
        fixed.after = Some("#005BBB".to_string());
        reporter.record(fixed);

        let result = reporter.finish("brand", Duration::from_millis(12));
        assert_eq!(result.auto_fixed, 1);
        assert_eq!(result.total_rules, 1);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["profile"], "brand");
        assert_eq!(json["totalRules"], 1);
        assert_eq!(json["duration"], 12);
        let v = &json["violations"][0];
        assert_eq!(v["ruleId"], "accent1");
        assert_eq!(v["where"], "ppt/theme/theme1.xml");
        assert_eq!(v["autoFixed"], true);
        assert_eq!(v["after"], "#005BBB");
        assert!(v.get("category").is_none());
    }
}
