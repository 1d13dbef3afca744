use std::collections::BTreeSet;

use crate::record::fields::str_at;
use crate::record::HostRecord;
use crate::rules::{Detector, Finding, OutputHost, RuleError, Severity};

/// Cloud providers, services and regions seen across the host's probes.
pub struct CloudDetector;

impl Detector for CloudDetector {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn summary(&self) -> &'static str {
        "Cloud details associated with services on host."
    }

    fn process(&self, host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
        let mut providers = BTreeSet::new();
        let mut services = BTreeSet::new();
        let mut regions = BTreeSet::new();

        for probe in host.probes_with("cloud") {
            let Some(cloud) = probe.module("cloud") else { continue };
            providers.extend(str_at(cloud, "provider"));
            services.extend(str_at(cloud, "service"));
            regions.extend(str_at(cloud, "region"));
        }

        for (id, label, names) in [
            ("cloud_providers", "Cloud Providers", providers),
            ("cloud_services", "Cloud services", services),
            ("cloud_regions", "Cloud regions", regions),
        ] {
            if names.is_empty() {
                continue;
            }
            let items: Vec<String> = names.into_iter().map(str::to_string).collect();
            sink.add_finding(
                Finding::new(id, items.clone(), format!("{label}: {}", items.join(",")), Severity::Info)
                    .with_items(items),
            );
        }
        Ok(())
    }
}
