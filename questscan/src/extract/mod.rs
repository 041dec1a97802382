//! Region extraction.
//!
//! The scanner never looks inside a sample itself. It hands the path to a
//! [`RegionExtractor`] and gets back the byte regions it tracks, keyed by
//! [`RegionKind`]. A kind missing from [`Regions`] means the binary has no
//! such region; an `Err` means the file is not something the extractor
//! understands. Both are normal outcomes during a scan.
mod macho;

pub use macho::MachOExtractor;

use serde::Serialize;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::ExtractError;

/// The region categories the scanner keeps a frequency table for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    /// Executable code (`__text`)
    Code,
    /// C string table (`__cstring`)
    Strings,
}

impl RegionKind {
    pub const ALL: [RegionKind; 2] = [RegionKind::Code, RegionKind::Strings];

    /// Mach-O section name backing this region
    pub fn section_name(self) -> &'static str {
        match self {
            RegionKind::Code => "__text",
            RegionKind::Strings => "__cstring",
        }
    }
}

/// Regions extracted from one binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Regions {
    inner: BTreeMap<RegionKind, Vec<u8>>,
}

impl Regions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Stores a region. The first buffer for a kind wins.
    pub fn insert(&mut self, kind: RegionKind, bytes: Vec<u8>) {
        self.inner.entry(kind).or_insert(bytes);
    }

    pub fn get(&self, kind: RegionKind) -> Option<&[u8]> {
        self.inner.get(&kind).map(Vec::as_slice)
    }

    pub fn contains(&self, kind: RegionKind) -> bool {
        self.inner.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionKind, &[u8])> {
        self.inner.iter().map(|(kind, bytes)| (*kind, bytes.as_slice()))
    }
}

impl IntoIterator for Regions {
    type Item = (RegionKind, Vec<u8>);
    type IntoIter = btree_map::IntoIter<RegionKind, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

/// Turns a sample path into its tracked regions.
///
/// Implementations are shared by every worker thread, so they must be
/// `Send + Sync` and must not keep per-file state between calls.
pub trait RegionExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Regions, ExtractError>;
}
