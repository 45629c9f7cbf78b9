//! The immutable set of permitted `host:port` destinations

use std::collections::HashSet;

use super::log::AccessLog;

/// Set of whitelisted `host:port` strings.
///
/// Entries are compared byte-for-byte: no trimming, case folding, wildcard or
/// port handling. The set is built once and exposes no mutation afterwards,
/// so it can be shared behind an `Arc` by any number of connection tasks.
#[derive(Debug, Clone, Default)]
pub struct WhitelistRegistry {
    entries: HashSet<String>,
}

impl WhitelistRegistry {
    /// Build the registry from raw configured entries.
    ///
    /// Repeated entries collapse. An empty input yields an empty registry,
    /// which denies everything. Each configured entry is logged once as it
    /// is added.
    pub fn build<I, S>(entries: I, log: &dyn AccessLog) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let entry = entry.into();
                log.whitelisting(&entry);
                entry
            })
            .collect();

        Self { entries }
    }

    /// Exact membership test.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Number of distinct entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct entries in sorted order, for the startup summary.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        let mut entries: Vec<&str> = self.entries.iter().map(String::as_str).collect();
        entries.sort_unstable();
        entries.into_iter()
    }
}
