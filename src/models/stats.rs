use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use super::TemporalBucket;

/// Aggregate counters of one merge run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub sources_loaded: usize,
    pub sources_empty: usize,
    pub parse_issues: usize,
    pub slots_considered: usize,
    pub slots_resolved: usize,
    pub slots_unresolved: usize,
    pub slots_skipped: usize,
    pub urls_changed: usize,
    pub special_groups_replaced: usize,
    pub special_groups_retained: usize,
    pub special_records: usize,
    pub temporal_records: BTreeMap<TemporalBucket, usize>,
    pub temporal_groups_replaced: usize,
    pub temporal_groups_retained: usize,
    pub duplicates_suppressed: usize,
    pub entries_emitted: usize,
}

impl RunStats {
    pub fn log_summary(&self) {
        info!(
            "Sources: {} loaded, {} empty ({} parse issues)",
            self.sources_loaded, self.sources_empty, self.parse_issues
        );
        info!(
            "Slots: {} considered, {} resolved, {} unresolved, {} skipped, {} URLs changed",
            self.slots_considered,
            self.slots_resolved,
            self.slots_unresolved,
            self.slots_skipped,
            self.urls_changed
        );
        info!(
            "Special groups: {} replaced ({} records), {} retained",
            self.special_groups_replaced, self.special_records, self.special_groups_retained
        );
        for (bucket, count) in &self.temporal_records {
            info!("Temporal bucket {}: {} records", bucket, count);
        }
        if self.temporal_groups_replaced + self.temporal_groups_retained > 0 {
            info!(
                "Temporal groups: {} replaced, {} retained",
                self.temporal_groups_replaced, self.temporal_groups_retained
            );
        }
        info!(
            "Emitted {} entries, suppressed {} duplicate URLs",
            self.entries_emitted, self.duplicates_suppressed
        );
    }
}
