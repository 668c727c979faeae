//! Per-source lookup structure over normalized channel records

use std::collections::HashMap;
use tracing::debug;

use super::normalizer::{ChannelProbe, NameNormalizer};
use crate::models::{ChannelRecord, SourceId};

/// A record together with its precomputed match probe
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    pub record: ChannelRecord,
    pub probe: ChannelProbe,
}

/// Records of one source
#[derive(Debug, Clone)]
pub struct SourceEntry {
    source_id: SourceId,
    by_key: HashMap<String, Vec<usize>>,
    records: Vec<IndexedRecord>,
}

impl SourceEntry {
    fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            by_key: HashMap::new(),
            records: Vec::new(),
        }
    }

    fn push(&mut self, indexed: IndexedRecord) {
        self.by_key
            .entry(indexed.record.normalized_name.clone())
            .or_default()
            .push(self.records.len());
        self.records.push(indexed);
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Records whose normalized key equals `key`, in arrival order
    pub fn exact<'s>(&'s self, key: &str) -> impl Iterator<Item = &'s IndexedRecord> + 's {
        self.by_key
            .get(key)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.records[idx])
    }

    /// All records in arrival order
    pub fn records(&self) -> &[IndexedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Normalized records of every source, in declared source order
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    sources: Vec<SourceEntry>,
}

impl SourceIndex {
    /// Group records by source; nothing is merged or dropped
    ///
    /// Sources missing from `order` are appended after the declared ones in
    /// first-seen order.
    pub fn build<I>(order: &[SourceId], records: I, normalizer: &NameNormalizer) -> Self
    where
        I: IntoIterator<Item = ChannelRecord>,
    {
        let mut sources: Vec<SourceEntry> = order.iter().cloned().map(SourceEntry::new).collect();
        let mut positions: HashMap<SourceId, usize> = order
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.clone(), pos))
            .collect();

        for record in records {
            let pos = match positions.get(&record.source_id) {
                Some(&pos) => pos,
                None => {
                    debug!("Indexing undeclared source '{}'", record.source_id);
                    sources.push(SourceEntry::new(record.source_id.clone()));
                    positions.insert(record.source_id.clone(), sources.len() - 1);
                    sources.len() - 1
                }
            };
            let probe = normalizer.probe(&record.raw_name);
            sources[pos].push(IndexedRecord { record, probe });
        }

        Self { sources }
    }

    pub fn source(&self, id: &SourceId) -> Option<&SourceEntry> {
        self.sources.iter().find(|entry| &entry.source_id == id)
    }

    /// Sources in fallback order
    pub fn sources(&self) -> &[SourceEntry] {
        &self.sources
    }

    /// Records of one source, empty when the source is unknown
    pub fn records_of(&self, id: &SourceId) -> &[IndexedRecord] {
        self.source(id).map(SourceEntry::records).unwrap_or_default()
    }

    /// Total number of records across sources
    pub fn len(&self) -> usize {
        self.sources.iter().map(SourceEntry::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.iter().all(SourceEntry::is_empty)
    }
}
