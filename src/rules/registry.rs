use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{builtin, Detector};
use crate::error::{Result, ShowdownError};

/// Name and description of a registered rule, used for `list-rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleInfo {
    pub name: String,
    pub summary: String,
}

/// Compiled-in rule catalogue. Adding a rule means adding one entry to
/// [`builtin::all_detectors`].
pub struct RuleRegistry {
    detectors: Vec<Arc<dyn Detector>>,
}

impl RuleRegistry {
    /// Registry with every built-in detector.
    pub fn builtin() -> Self {
        Self {
            detectors: builtin::all_detectors(),
        }
    }

    /// All registered rules in catalogue order.
    pub fn list(&self) -> Vec<RuleInfo> {
        self.detectors
            .iter()
            .map(|d| RuleInfo {
                name: d.name().into(),
                summary: d.summary().into(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Detector>> {
        self.detectors
            .iter()
            .find(|d| d.name() == name)
            .map(Arc::clone)
    }

    /// Resolve names, in the order given, to shared detector instances.
    ///
    /// Fails on the first name that is not registered.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn Detector>>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref().trim();
                self.get(name)
                    .ok_or_else(|| ShowdownError::UnknownRule(name.to_string()))
            })
            .collect()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_builtin_rule() {
        let registry = RuleRegistry::builtin();
        let names = registry.names();
        for expected in ["info", "vulns", "ssl", "db", "files", "eol", "ssh", "http", "cloud"] {
            assert!(names.contains(&expected), "missing rule {expected}");
        }
        assert!(registry.list().iter().all(|r| !r.summary.is_empty()));
    }

    #[test]
    fn resolve_keeps_requested_order() {
        let registry = RuleRegistry::builtin();
        let rules = registry.resolve(&["vulns", "info"]).unwrap();
        let names: Vec<_> = rules.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["vulns", "info"]);
    }

    #[test]
    fn resolve_rejects_unknown_name() {
        let registry = RuleRegistry::builtin();
        let err = registry.resolve(&["info", "nmap"]).err().unwrap();
        assert!(matches!(err, ShowdownError::UnknownRule(ref n) if n == "nmap"));
    }

    #[test]
    fn resolved_rules_are_shared() {
        let registry = RuleRegistry::builtin();
        let a = registry.resolve(&["ssl"]).unwrap();
        let b = registry.resolve(&["ssl"]).unwrap();
        assert!(Arc::ptr_eq(&a[0], &b[0]));
    }
}
