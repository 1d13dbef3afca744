//! showdown: pull back juicy info on external targets from Shodan and rank
//! hosts by risk.
//!
//! Host records are retrieved concurrently under a global rate limit,
//! evaluated by a configurable set of detector rules, and ranked by score.
//!
//! # Quick Start
//!
//! ```no_run
//! use showdown::source::RecordDirectory;
//! use showdown::{triage, TriageOptions};
//!
//! let source = RecordDirectory::open("./records").unwrap();
//! let targets = source.identifiers();
//! let report = triage(&source, targets, &TriageOptions::default(), |_| {}).unwrap();
//! for (ip, host) in report.results.sorted() {
//!     println!("{ip}: {}", host.score());
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod output;
pub mod record;
pub mod retrieval;
pub mod rules;
pub mod source;
pub mod targets;

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use aggregate::ResultSet;
use config::Config;
use error::Result;
use output::OutputFormat;
use record::HostIdentifier;
use retrieval::{FetchEvent, RetrievalEngine};
use rules::{Pipeline, RuleRegistry};
use source::HostSource;

/// Options for a triage run.
#[derive(Debug, Clone)]
pub struct TriageOptions {
    /// Rule names to run, in order.
    pub rules: Vec<String>,
    /// Maximum simultaneous fetches.
    pub concurrency: usize,
    /// Minimum delay between starting consecutive fetches.
    pub min_interval: Duration,
    /// Hosts evaluated at once after retrieval.
    pub eval_threads: NonZeroUsize,
}

impl Default for TriageOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl TriageOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            rules: config.rules.enabled.clone(),
            concurrency: config.retrieval.concurrency,
            min_interval: config.retrieval.min_interval(),
            eval_threads: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// What happened in a triage run.
#[derive(Debug)]
pub struct TriageReport {
    /// Identifiers handed to retrieval.
    pub requested: usize,
    /// Records actually retrieved.
    pub retrieved: usize,
    pub results: ResultSet,
}

/// Distinguishes an empty retrieval from a clean bill of health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoHostsRetrieved,
    NoFindings { hosts: usize },
    Findings { hosts: usize, findings: usize },
}

impl TriageReport {
    pub fn outcome(&self) -> Outcome {
        if self.retrieved == 0 {
            Outcome::NoHostsRetrieved
        } else if self.results.finding_count() == 0 {
            Outcome::NoFindings {
                hosts: self.results.len(),
            }
        } else {
            Outcome::Findings {
                hosts: self.results.len(),
                findings: self.results.finding_count(),
            }
        }
    }
}

/// Run a complete triage: resolve rules, retrieve records, evaluate, rank.
///
/// Rule names are resolved before any fetch, so an unknown rule costs no
/// API credits. `on_progress` sees one event per identifier. Hosts are
/// evaluated in the order they were requested, so ties in score rank the
/// same way on every run.
pub fn triage<S, I, F>(source: &S, targets: I, options: &TriageOptions, on_progress: F) -> Result<TriageReport>
where
    S: HostSource,
    I: IntoIterator<Item = HostIdentifier>,
    F: FnMut(&FetchEvent) + Send,
{
    let detectors = RuleRegistry::builtin().resolve(&options.rules)?;
    tracing::info!(rules = %options.rules.join(","), "using rules");

    let engine = RetrievalEngine::new(options.concurrency, options.min_interval)?;

    let targets: Vec<HostIdentifier> = targets.into_iter().collect();
    let requested = targets.len();
    let order: HashMap<HostIdentifier, usize> = targets
        .iter()
        .enumerate()
        .rev()
        .map(|(n, id)| (id.clone(), n))
        .collect();

    let mut records = engine.retrieve_with(source, targets, on_progress);
    records.sort_by_key(|record| order.get(record.identifier()).copied().unwrap_or(usize::MAX));
    let retrieved = records.len();

    let pipeline = Pipeline::with_detectors(detectors).with_parallelism(options.eval_threads);
    let results = pipeline.evaluate(records);

    Ok(TriageReport {
        requested,
        retrieved,
        results,
    })
}

/// Render a triage report in the specified format.
pub fn render_report(report: &TriageReport, format: OutputFormat, color: bool) -> Result<String> {
    output::render(&report.results, format, color)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::error::ShowdownError;
    use crate::record::HostRecord;
    use crate::rules::Severity;
    use crate::source::{FetchError, RecordDirectory};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    const FIXTURES: &str = "tests/fixtures/hosts";

    fn options(rules: &[&str]) -> TriageOptions {
        TriageOptions {
            rules: rules.iter().map(|r| r.to_string()).collect(),
            concurrency: 4,
            min_interval: Duration::ZERO,
            ..TriageOptions::default()
        }
    }

    fn run(rules: &[&str]) -> TriageReport {
        let source = RecordDirectory::open(FIXTURES).unwrap();
        let targets = source.identifiers();
        triage(&source, targets, &options(rules), |_| {}).unwrap()
    }

    #[test]
    fn vulnerable_host_scores_by_cvss() {
        let report = run(&["vulns"]);
        let host = report.results.get(&"203.0.113.10".into()).unwrap();

        let summary = &host.findings()[0];
        assert_eq!(summary.id, "vulns_count");
        assert_eq!(summary.summary, "Found 2 vulnerabilities");
        assert_eq!(summary.severity, Severity::Critical);
        assert_eq!(host.score(), 1150);
    }

    #[test]
    fn anonymous_smb_host() {
        let report = run(&["files"]);
        let host = report.results.get(&"203.0.113.20".into()).unwrap();
        let ids: Vec<&str> = host.findings().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["smb_anon", "smb_shares"]);
        assert_eq!(host.score(), 300);
    }

    #[test]
    fn legacy_tls_host() {
        let report = run(&["ssl"]);
        let host = report.results.get(&"203.0.113.30".into()).unwrap();
        let ids: Vec<&str> = host.findings().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["protocol_weak_SSLv3", "cipher_weak"]);
        let severities: Vec<Severity> = host.findings().iter().map(|f| f.severity).collect();
        assert_eq!(severities, vec![Severity::High, Severity::Medium]);
        assert_eq!(host.score(), 800);
    }

    #[test]
    fn corrupt_cvss_is_isolated_to_its_rule() {
        let report = run(&["info", "vulns"]);
        let host = report.results.get(&"203.0.113.40".into()).unwrap();
        assert_eq!(host.failures().len(), 1);
        assert_eq!(host.failures()[0].rule, "vulns");
        assert_eq!(host.score(), 0);

        // Other hosts are unaffected.
        assert_eq!(report.results.get(&"203.0.113.10".into()).unwrap().score(), 1150);
    }

    #[test]
    fn ranking_is_descending() {
        let report = run(&["vulns", "files", "ssl"]);
        assert_eq!(report.requested, 4);
        assert_eq!(report.retrieved, 4);

        let ranked: Vec<&str> = report.results.sorted().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ranked, vec!["203.0.113.10", "203.0.113.30", "203.0.113.20", "203.0.113.40"]);
        assert!(matches!(report.outcome(), Outcome::Findings { hosts: 4, .. }));
    }

    /// Serves bare records, sleeping a different amount on every call so
    /// fetches complete out of order.
    struct Jittered {
        calls: AtomicU64,
    }

    impl HostSource for Jittered {
        fn fetch(&self, id: &HostIdentifier) -> std::result::Result<HostRecord, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::Relaxed);
            std::thread::sleep(Duration::from_millis((call * 7 + 3) % 11));
            Ok(serde_json::from_value(serde_json::json!({ "ip_str": id.as_str() })).unwrap())
        }
    }

    #[test]
    fn tied_hosts_rank_in_request_order() {
        let targets: Vec<HostIdentifier> = (1..=10).map(|n| HostIdentifier::from(format!("192.0.2.{n}"))).collect();
        let expected: Vec<String> = targets.iter().map(|id| id.to_string()).collect();
        let mut opts = options(&["cloud"]);
        opts.concurrency = 8;
        opts.eval_threads = NonZeroUsize::new(4).unwrap();

        for _ in 0..3 {
            let source = Jittered {
                calls: AtomicU64::new(0),
            };
            let report = triage(&source, targets.clone(), &opts, |_| {}).unwrap();
            let ranked: Vec<String> = report.results.sorted().iter().map(|(id, _)| id.to_string()).collect();
            assert_eq!(ranked, expected);
        }
    }

    #[test]
    fn unknown_rule_fails_before_retrieval() {
        let source = RecordDirectory::open(FIXTURES).unwrap();
        let events = Mutex::new(0usize);
        let err = triage(&source, source.identifiers(), &options(&["vulns", "nope"]), |_| {
            *events.lock() += 1;
        })
        .unwrap_err();
        assert!(matches!(err, ShowdownError::UnknownRule(name) if name == "nope"));
        assert_eq!(*events.lock(), 0);
    }

    #[test]
    fn missing_hosts_are_reported_not_fatal() {
        let source = RecordDirectory::open(FIXTURES).unwrap();
        let failed = Mutex::new(Vec::new());
        let targets = vec![HostIdentifier::from("198.51.100.1"), HostIdentifier::from("203.0.113.20")];
        let report = triage(&source, targets, &options(&["files"]), |event| {
            if !event.is_success() {
                failed.lock().push(event.identifier().clone());
            }
        })
        .unwrap();
        assert_eq!(report.retrieved, 1);
        assert_eq!(*failed.lock(), vec![HostIdentifier::from("198.51.100.1")]);
    }

    #[test]
    fn empty_targets_are_not_an_error() {
        let source = RecordDirectory::open(FIXTURES).unwrap();
        let report = triage(&source, Vec::new(), &options(&["info"]), |_| {}).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.outcome(), Outcome::NoHostsRetrieved);
    }

    #[test]
    fn clean_hosts_report_no_findings() {
        let source = RecordDirectory::open(FIXTURES).unwrap();
        let targets = vec![HostIdentifier::from("203.0.113.30")];
        let report = triage(&source, targets, &options(&["cloud"]), |_| {}).unwrap();
        assert_eq!(report.outcome(), Outcome::NoFindings { hosts: 1 });
    }

    #[test]
    fn renders_every_format() {
        let report = run(&["vulns", "files"]);
        let csv = render_report(&report, OutputFormat::Csv, false).unwrap();
        assert!(csv.starts_with("ip,score,port,protocol,id,value,summary,severity,references,items\n"));
        let json = render_report(&report, OutputFormat::Json, false).unwrap();
        assert!(json.contains("\"vulns_count\""));
        let console = render_report(&report, OutputFormat::Console, false).unwrap();
        assert!(console.contains("Host: 203.0.113.10 Score: 1150"));
    }
}
