use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Detector, OutputHost};
use crate::aggregate::ResultSet;
use crate::record::HostRecord;

/// Runs registered detectors, in registration order, against host records.
pub struct Pipeline {
    detectors: Vec<Arc<dyn Detector>>,
    parallelism: NonZeroUsize,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
            parallelism: NonZeroUsize::MIN,
        }
    }

    pub fn with_detectors(detectors: Vec<Arc<dyn Detector>>) -> Self {
        Self {
            detectors,
            ..Self::new()
        }
    }

    /// Evaluate up to `threads` hosts at once in [`Pipeline::evaluate`].
    pub fn with_parallelism(mut self, threads: NonZeroUsize) -> Self {
        self.parallelism = threads;
        self
    }

    pub fn register(&mut self, detector: Arc<dyn Detector>) {
        self.detectors.push(detector);
    }

    pub fn detectors(&self) -> impl Iterator<Item = &dyn Detector> {
        self.detectors.iter().map(|d| d.as_ref())
    }

    /// Evaluate one host with every registered detector.
    ///
    /// Each detector writes into a scratch accumulator that is merged only
    /// when it succeeds, so a failing detector contributes nothing but a
    /// recorded failure.
    pub fn execute(&self, host: &HostRecord) -> OutputHost {
        let mut output = OutputHost::new();

        for detector in &self.detectors {
            let mut scratch = OutputHost::new();
            match detector.process(host, &mut scratch) {
                Ok(()) => output.absorb(scratch),
                Err(e) => {
                    tracing::error!(
                        host = %host.identifier(),
                        rule = detector.name(),
                        error = %e,
                        "rule aborted, its findings for this host are discarded"
                    );
                    output.record_failure(detector.name(), e.to_string());
                }
            }
        }

        tracing::debug!(
            host = %host.identifier(),
            score = output.score(),
            findings = output.findings().len(),
            "host evaluated"
        );
        output
    }

    /// Evaluate a batch of records into a [`ResultSet`].
    ///
    /// Hosts are published in record order regardless of parallelism, so
    /// equal scores always rank the same way. Every host is fully evaluated
    /// before it reaches the result set.
    pub fn evaluate(&self, records: Vec<HostRecord>) -> ResultSet {
        let threads = self.parallelism.get().min(records.len());
        let mut results = ResultSet::new();
        if threads <= 1 {
            for record in &records {
                results.put(record.identifier().clone(), self.execute(record));
            }
            return results;
        }

        let (work_tx, work_rx) = crossbeam_channel::bounded(records.len());
        for work in records.into_iter().enumerate() {
            // Capacity equals the record count, so this never blocks.
            let _ = work_tx.send(work);
        }
        drop(work_tx);

        let finished = Mutex::new(Vec::new());
        std::thread::scope(|scope| {
            for _ in 0..threads {
                let work_rx = work_rx.clone();
                let finished = &finished;
                scope.spawn(move || {
                    for (index, record) in work_rx.iter() {
                        let output = self.execute(&record);
                        finished.lock().push((index, record.identifier().clone(), output));
                    }
                });
            }
        });

        let mut finished = finished.into_inner();
        finished.sort_unstable_by_key(|(index, _, _)| *index);
        for (_, id, output) in finished {
            results.put(id, output);
        }
        results
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Finding, Points, RuleError, Severity, SeverityError};
    use serde_json::json;

    struct Fixed(&'static str, u32);

    impl Detector for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }
        fn summary(&self) -> &'static str {
            "fixed test rule"
        }
        fn process(&self, _host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
            sink.record(Finding::new(self.0, self.1, self.0, Severity::Low), Points::new(self.1));
            Ok(())
        }
    }

    struct Corrupt;

    impl Detector for Corrupt {
        fn name(&self) -> &'static str {
            "corrupt"
        }
        fn summary(&self) -> &'static str {
            "emits then fails"
        }
        fn process(&self, _host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
            sink.record(Finding::new("partial", 0, "partial", Severity::High), Points::new(999));
            Err(SeverityError::OutOfRange(11.0).into())
        }
    }

    fn host(ip: &str) -> HostRecord {
        serde_json::from_value(json!({ "ip_str": ip })).unwrap()
    }

    #[test]
    fn runs_rules_in_registration_order() {
        let mut pipeline = Pipeline::new();
        pipeline.register(Arc::new(Fixed("second", 2)));
        pipeline.register(Arc::new(Fixed("first", 1)));
        let output = pipeline.execute(&host("1.1.1.1"));
        let ids: Vec<_> = output.findings().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
        assert_eq!(output.score(), 3);
    }

    #[test]
    fn failing_rule_is_isolated() {
        let pipeline = Pipeline::with_detectors(vec![
            Arc::new(Fixed("a", 10)),
            Arc::new(Corrupt),
            Arc::new(Fixed("b", 20)),
        ]);
        let output = pipeline.execute(&host("1.1.1.1"));
        assert_eq!(output.score(), 30);
        assert!(output.findings().iter().all(|f| f.id != "partial"));
        assert_eq!(output.failures().len(), 1);
        assert_eq!(output.failures()[0].rule, "corrupt");
    }

    #[test]
    fn repeated_execution_is_independent() {
        let pipeline = Pipeline::with_detectors(vec![Arc::new(Fixed("a", 10))]);
        let record = host("1.1.1.1");
        let first = pipeline.execute(&record);
        let second = pipeline.execute(&record);
        assert_eq!(first, second);
        assert_eq!(second.score(), 10);
    }

    #[test]
    fn parallel_evaluation_matches_sequential() {
        let detectors: Vec<Arc<dyn Detector>> =
            vec![Arc::new(Fixed("a", 10)), Arc::new(Fixed("b", 5))];
        let records: Vec<_> = (0..20).map(|i| host(&format!("10.0.0.{i}"))).collect();

        let sequential = Pipeline::with_detectors(detectors.clone()).evaluate(records.clone());
        let parallel = Pipeline::with_detectors(detectors)
            .with_parallelism(NonZeroUsize::new(4).unwrap())
            .evaluate(records);

        assert_eq!(sequential.len(), 20);
        assert_eq!(parallel.len(), 20);
        for (id, output) in sequential.iter() {
            assert_eq!(parallel.get(id), Some(output));
        }
    }

    struct Sleepy;

    impl Detector for Sleepy {
        fn name(&self) -> &'static str {
            "sleepy"
        }
        fn summary(&self) -> &'static str {
            "takes longer for earlier hosts"
        }
        fn process(&self, host: &HostRecord, _sink: &mut OutputHost) -> Result<(), RuleError> {
            let octet: u64 = host
                .identifier()
                .as_str()
                .rsplit('.')
                .next()
                .and_then(|o| o.parse().ok())
                .unwrap_or(0);
            std::thread::sleep(std::time::Duration::from_millis(2 * (12 - octet.min(12))));
            Ok(())
        }
    }

    #[test]
    fn parallel_ties_keep_record_order() {
        let records: Vec<_> = (0..12).map(|i| host(&format!("10.0.0.{i}"))).collect();
        let expected: Vec<String> = records.iter().map(|r| r.identifier().to_string()).collect();

        let results = Pipeline::with_detectors(vec![Arc::new(Sleepy)])
            .with_parallelism(NonZeroUsize::new(6).unwrap())
            .evaluate(records);

        let ranked: Vec<String> = results.sorted().iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ranked, expected);
    }
}
