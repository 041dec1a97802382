//! Digest frequency tables and the aggregator that owns them.
//!
//! Every worker shares one [`Aggregator`] through an `Arc`. Both tables sit
//! behind a single mutex: an update is a hash map bump, so one lock is
//! plenty at the worker counts this tool runs with. The scanner only calls
//! [`Aggregator::finalize`] after the worker pool has been joined, so the
//! snapshot in a [`ScanReport`] never races with an increment.
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::digest::Digest;
use crate::errors::ScanResult;
use crate::extract::RegionKind;
use crate::metrics::ScanStats;

/// Digest to occurrence count for one region kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: HashMap<Digest, u64>,
}

/// One row of a frequency table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    pub digest: Digest,
    pub count: u64,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn increment(&mut self, digest: Digest) {
        *self.counts.entry(digest).or_insert(0) += 1;
    }

    /// Occurrences of a digest, zero when absent
    pub fn count(&self, digest: &Digest) -> u64 {
        self.counts.get(digest).copied().unwrap_or(0)
    }

    /// Number of distinct digests
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries sorted by count (descending), then digest
    pub fn entries(&self) -> Vec<TableEntry> {
        let mut entries: Vec<TableEntry> = self
            .counts
            .iter()
            .map(|(digest, count)| TableEntry {
                digest: *digest,
                count: *count,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.digest.cmp(&b.digest)));
        entries
    }
}

impl Serialize for FrequencyTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut seq = serializer.serialize_seq(Some(entries.len()))?;
        for entry in &entries {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}

/// Final result of a run
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    #[serde(rename = "__text")]
    pub code: FrequencyTable,
    #[serde(rename = "__cstring")]
    pub strings: FrequencyTable,
    pub stats: ScanStats,
    /// Whether the run stopped early on a cancellation request
    pub interrupted: bool,
}

impl ScanReport {
    pub fn table(&self, kind: RegionKind) -> &FrequencyTable {
        match kind {
            RegionKind::Code => &self.code,
            RegionKind::Strings => &self.strings,
        }
    }

    pub fn to_json(&self) -> ScanResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> ScanResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[derive(Debug, Default)]
struct Tables {
    code: FrequencyTable,
    strings: FrequencyTable,
}

impl Tables {
    fn table_mut(&mut self, kind: RegionKind) -> &mut FrequencyTable {
        match kind {
            RegionKind::Code => &mut self.code,
            RegionKind::Strings => &mut self.strings,
        }
    }
}

/// Thread-safe owner of the per-kind frequency tables
#[derive(Debug, Default)]
pub struct Aggregator {
    tables: Mutex<Tables>,
}

impl Aggregator {
    pub fn new() -> Self {
        Default::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Tables stay consistent even if a holder panicked: each update is a single bump.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds one occurrence of `digest` to the table for `kind`
    pub fn increment(&self, kind: RegionKind, digest: Digest) {
        self.lock().table_mut(kind).increment(digest);
    }

    /// Adds all of one file's digests under a single lock acquisition
    pub fn record(&self, digests: &[(RegionKind, Digest)]) {
        if digests.is_empty() {
            return;
        }
        let mut tables = self.lock();
        for (kind, digest) in digests {
            tables.table_mut(*kind).increment(*digest);
        }
    }

    /// Copy of the current table for `kind`
    pub fn snapshot(&self, kind: RegionKind) -> FrequencyTable {
        match kind {
            RegionKind::Code => self.lock().code.clone(),
            RegionKind::Strings => self.lock().strings.clone(),
        }
    }

    /// Builds the report. Must not be called while workers are still running.
    pub fn finalize(&self, stats: ScanStats, interrupted: bool) -> ScanReport {
        let tables = self.lock();
        ScanReport {
            code: tables.code.clone(),
            strings: tables.strings.clone(),
            stats,
            interrupted,
        }
    }
}
