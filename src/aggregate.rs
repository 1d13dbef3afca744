//! Per-host results keyed by identifier, ranked by score.

use std::collections::HashMap;

use crate::record::HostIdentifier;
use crate::rules::OutputHost;

/// Maps each host to its latest evaluation.
///
/// Hosts keep the position of their first `put`; a later `put` for the same
/// host replaces its output (last write wins, no merging).
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    entries: Vec<(HostIdentifier, OutputHost)>,
    index: HashMap<HostIdentifier, usize>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, id: HostIdentifier, output: OutputHost) {
        match self.index.get(&id) {
            Some(&slot) => self.entries[slot].1 = output,
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push((id, output));
            }
        }
    }

    pub fn get(&self, id: &HostIdentifier) -> Option<&OutputHost> {
        self.index.get(id).map(|&slot| &self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&HostIdentifier, &OutputHost)> {
        self.entries.iter().map(|(id, output)| (id, output))
    }

    /// Total findings across all hosts.
    pub fn finding_count(&self) -> usize {
        self.entries.iter().map(|(_, o)| o.findings().len()).sum()
    }

    /// Hosts by descending score; equal scores keep first-insertion order.
    pub fn sorted(&self) -> Vec<(&HostIdentifier, &OutputHost)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1));
        ranked
    }
}
