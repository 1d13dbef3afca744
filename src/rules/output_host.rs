use serde::{Deserialize, Serialize};

use super::{Finding, Points};

/// Per-host accumulator written by detectors.
///
/// The score only ever grows: the single mutator takes [`Points`], which
/// cannot be negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputHost {
    score: u64,
    findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    failures: Vec<RuleFailure>,
}

/// A detector that aborted on one host, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule: String,
    pub message: String,
}

impl OutputHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn increase_score(&mut self, points: Points) {
        self.score = self.score.saturating_add(u64::from(points.get()));
    }

    /// Add a finding together with its score contribution.
    pub fn record(&mut self, finding: Finding, points: Points) {
        self.add_finding(finding);
        self.increase_score(points);
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn failures(&self) -> &[RuleFailure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub(crate) fn record_failure(&mut self, rule: &str, message: String) {
        self.failures.push(RuleFailure {
            rule: rule.to_string(),
            message,
        });
    }

    /// Move another accumulator's findings and score into this one.
    pub(crate) fn absorb(&mut self, other: OutputHost) {
        self.score = self.score.saturating_add(other.score);
        self.findings.extend(other.findings);
        self.failures.extend(other.failures);
    }
}

impl Eq for OutputHost {}

impl PartialOrd for OutputHost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered by score only; findings do not participate.
impl Ord for OutputHost {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score.cmp(&other.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Severity;
    use proptest::prelude::*;

    #[test]
    fn record_adds_finding_and_points() {
        let mut host = OutputHost::new();
        host.record(
            Finding::new("smb_anon", true, "Anonymous SMB access.", Severity::High),
            Points::new(200),
        );
        assert_eq!(host.score(), 200);
        assert_eq!(host.findings().len(), 1);
    }

    #[test]
    fn absorb_keeps_order() {
        let mut a = OutputHost::new();
        a.record(Finding::new("a", 1, "a", Severity::Low), Points::new(5));
        let mut b = OutputHost::new();
        b.record(Finding::new("b", 2, "b", Severity::Low), Points::new(7));
        a.absorb(b);
        assert_eq!(a.score(), 12);
        let ids: Vec<_> = a.findings().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn orders_by_score() {
        let mut low = OutputHost::new();
        low.increase_score(Points::new(10));
        let mut high = OutputHost::new();
        high.increase_score(Points::new(20));
        assert!(high > low);
    }

    proptest! {
        #[test]
        fn score_never_decreases(deltas in proptest::collection::vec(0u32..5_000, 0..64)) {
            let mut host = OutputHost::new();
            let mut previous = host.score();
            for d in deltas {
                host.increase_score(Points::new(d));
                prop_assert!(host.score() >= previous);
                previous = host.score();
            }
        }
    }
}
