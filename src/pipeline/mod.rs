//! One merge run over already fetched inputs
//!
//! The pipeline is pure: it takes the target playlist text, the fetched source
//! texts and the reference date, and returns the entries to write together
//! with the run counters. Fetching and writing stay with the caller.

use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::generator::Deduplicator;
use crate::ingestor::{FetchedFeed, ParseIssue, PlaylistParser};
use crate::matching::{
    MergeRules, NameNormalizer, ResolutionEngine, SourceIndex, TemporalBuckets, TemporalClassifier,
};
use crate::models::{
    CanonicalSlot, ChannelRecord, EntryOrigin, GroupKind, OutputEntry, RunStats, SlotDecision,
};

/// Result of a merge run
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Header of the target playlist, when it had one
    pub header: Option<String>,
    pub entries: Vec<OutputEntry>,
    pub stats: RunStats,
}

/// Orchestrates parsing, indexing, classification, resolution and
/// de-duplication for one run
pub struct MergePipeline<'a> {
    rules: &'a MergeRules,
    normalizer: &'a NameNormalizer,
    parser: PlaylistParser,
    /// Parser for the live-events source, extracting section dates
    dated_parser: PlaylistParser,
}

impl<'a> MergePipeline<'a> {
    pub fn new(rules: &'a MergeRules, normalizer: &'a NameNormalizer) -> AppResult<Self> {
        let parser = PlaylistParser::new(&rules.line_marker)?;
        let dated_parser = match &rules.temporal {
            Some(temporal) => parser
                .clone()
                .with_section_date_pattern(temporal.date_pattern.clone()),
            None => parser.clone(),
        };

        Ok(Self {
            rules,
            normalizer,
            parser,
            dated_parser,
        })
    }

    /// Run the merge
    ///
    /// Output order: roster slots (minus replaced groups), then special groups
    /// in rule order, then temporal groups in rule order. Duplicate URLs are
    /// suppressed once over that complete list.
    pub fn run(
        &self,
        target_text: &str,
        feeds: &[FetchedFeed],
        reference_date: NaiveDate,
    ) -> MergeOutcome {
        let mut stats = RunStats::default();

        let target = self.parser.parse(target_text);
        report_issues("target playlist", &target.issues, &mut stats);
        let slots: Vec<CanonicalSlot> = target.entries.into_iter().map(CanonicalSlot::from).collect();
        info!("Loaded {} roster slots from target playlist", slots.len());

        let records = self.load_records(feeds, &mut stats);
        let index = SourceIndex::build(&self.rules.source_order, records, self.normalizer);
        info!(
            "Indexed {} records from {} sources",
            index.len(),
            index.sources().len()
        );

        let classifier = TemporalClassifier::new(reference_date);
        let temporal = self.rules.temporal.as_ref().map(|settings| {
            classifier.classify(
                index
                    .records_of(&settings.source)
                    .iter()
                    .map(|indexed| &indexed.record),
            )
        });
        if let Some(buckets) = &temporal {
            for (bucket, records) in buckets {
                stats.temporal_records.insert(*bucket, records.len());
            }
            debug!(
                "Classified live events against reference date {}",
                classifier.reference_date()
            );
        }

        let engine = ResolutionEngine::new(self.rules, self.normalizer, &index);
        let (replacements, retained) = self.group_replacements(&engine, temporal.as_ref(), &mut stats);
        let mut entries = self.resolve_roster(&engine, &slots, &retained, &mut stats);
        entries.extend(replacements);

        let mut dedup = Deduplicator::new();
        let entries = dedup.dedupe(entries);
        stats.duplicates_suppressed = dedup.suppressed();
        stats.entries_emitted = entries.len();

        MergeOutcome {
            header: target.header,
            entries,
            stats,
        }
    }

    fn load_records(&self, feeds: &[FetchedFeed], stats: &mut RunStats) -> Vec<ChannelRecord> {
        let mut records = Vec::new();

        for feed in feeds {
            let Some(content) = feed.content.as_deref().filter(|c| !c.trim().is_empty()) else {
                warn!("Source '{}' contributed no content", feed.source_id);
                stats.sources_empty += 1;
                continue;
            };

            let is_temporal = self
                .rules
                .temporal
                .as_ref()
                .is_some_and(|settings| settings.source == feed.source_id);
            let parser = if is_temporal {
                &self.dated_parser
            } else {
                &self.parser
            };

            let parsed = parser.parse(content);
            report_issues(feed.source_id.as_str(), &parsed.issues, stats);
            stats.sources_loaded += 1;

            let before = records.len();
            for entry in parsed.entries {
                let normalized = self.normalizer.normalize(&entry.base_name);
                match ChannelRecord::from_entry(entry, feed.source_id.clone(), normalized) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        debug!("Skipping record from '{}': {}", feed.source_id, e);
                        stats.parse_issues += 1;
                    }
                }
            }
            info!(
                "Source '{}' provided {} records",
                feed.source_id,
                records.len() - before
            );
        }

        records
    }

    /// Entries of special and temporal groups, plus the names of replaced
    /// groups whose replacement came up empty and keep their prior slots
    fn group_replacements(
        &self,
        engine: &ResolutionEngine<'_>,
        temporal: Option<&TemporalBuckets<'_>>,
        stats: &mut RunStats,
    ) -> (Vec<OutputEntry>, HashSet<&'a str>) {
        let rules: &'a MergeRules = self.rules;
        let mut special_entries = Vec::new();
        let mut temporal_entries = Vec::new();
        let mut retained = HashSet::new();

        for rule in &rules.groups {
            match &rule.kind {
                GroupKind::Normal { .. } => {}
                GroupKind::Special {
                    source,
                    original_label,
                } => {
                    let records = engine.special_records(source, original_label);
                    if records.is_empty() {
                        warn!(
                            "Special group '{}' found no '{}' records in '{}', keeping existing entries",
                            rule.name, original_label, source
                        );
                        stats.special_groups_retained += 1;
                        retained.insert(rule.name.as_str());
                        continue;
                    }

                    info!(
                        "Special group '{}' replaced by {} records from '{}'",
                        rule.name,
                        records.len(),
                        source
                    );
                    stats.special_groups_replaced += 1;
                    stats.special_records += records.len();
                    special_entries.extend(records.into_iter().map(|record| {
                        OutputEntry::from_record(
                            record,
                            &rule.name,
                            EntryOrigin::Special {
                                source: source.clone(),
                            },
                        )
                    }));
                }
                GroupKind::Temporal { buckets } => {
                    let mut entries = Vec::new();
                    if let Some(classified) = temporal {
                        for bucket in buckets {
                            let records = classified.get(bucket).map(Vec::as_slice).unwrap_or_default();
                            entries.extend(records.iter().map(|record| {
                                OutputEntry::from_record(
                                    record,
                                    &rule.name,
                                    EntryOrigin::Temporal { bucket: *bucket },
                                )
                            }));
                        }
                    }

                    if entries.is_empty() {
                        warn!(
                            "Temporal group '{}' has no records for its buckets, keeping existing entries",
                            rule.name
                        );
                        stats.temporal_groups_retained += 1;
                        retained.insert(rule.name.as_str());
                    } else {
                        info!("Temporal group '{}' replaced by {} records", rule.name, entries.len());
                        stats.temporal_groups_replaced += 1;
                        temporal_entries.extend(entries);
                    }
                }
            }
        }

        special_entries.extend(temporal_entries);
        (special_entries, retained)
    }

    fn resolve_roster(
        &self,
        engine: &ResolutionEngine<'_>,
        slots: &[CanonicalSlot],
        retained: &HashSet<&str>,
        stats: &mut RunStats,
    ) -> Vec<OutputEntry> {
        let mut entries = Vec::with_capacity(slots.len());

        for slot in slots {
            let replaced_group = self
                .rules
                .group_rule(slot.group_name())
                .filter(|rule| rule.kind.is_replaced());
            if let Some(rule) = replaced_group {
                if retained.contains(rule.name.as_str()) {
                    entries.push(OutputEntry::from_slot(slot, &slot.current_url));
                }
                continue;
            }

            stats.slots_considered += 1;
            if slot.base_name.trim().is_empty() {
                debug!("Skipping slot at line {} with empty name", slot.line_index);
                stats.slots_skipped += 1;
                entries.push(OutputEntry::from_slot(slot, &slot.current_url));
                continue;
            }

            match engine.resolve(slot) {
                SlotDecision::Replace { record, .. } => {
                    stats.slots_resolved += 1;
                    if record.stream_url != slot.current_url {
                        stats.urls_changed += 1;
                    }
                    entries.push(OutputEntry::from_slot(slot, &record.stream_url));
                }
                SlotDecision::Unchanged => {
                    stats.slots_unresolved += 1;
                    entries.push(OutputEntry::from_slot(slot, &slot.current_url));
                }
            }
        }

        info!(
            "Resolved {}/{} slots, {} URLs changed",
            stats.slots_resolved, stats.slots_considered, stats.urls_changed
        );
        entries
    }
}

fn report_issues(origin: &str, issues: &[ParseIssue], stats: &mut RunStats) {
    stats.parse_issues += issues.len();
    for issue in issues {
        warn!("{}: {}", origin, AppError::from(issue.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::SourceId;

    #[test]
    fn test_empty_feeds_and_target() {
        let config: Config = toml::from_str(
            r#"
[[sources]]
id = "a"
url = "http://a.example.com/a.m3u"
"#,
        )
        .unwrap();
        let rules = MergeRules::from_config(&config).unwrap();
        let normalizer = NameNormalizer::new(&config.naming, &config.aliases).unwrap();
        let pipeline = MergePipeline::new(&rules, &normalizer).unwrap();

        let feeds = vec![FetchedFeed {
            source_id: SourceId::from("a"),
            content: None,
        }];
        let outcome = pipeline.run("", &feeds, NaiveDate::from_ymd_opt(2024, 6, 16).unwrap());

        assert!(outcome.header.is_none());
        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.stats.sources_empty, 1);
        assert_eq!(outcome.stats.sources_loaded, 0);
    }
}
