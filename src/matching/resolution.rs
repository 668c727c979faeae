//! Per-slot resolution of stream URLs
//!
//! Precedence, first match wins:
//!
//! 1. prefix pinning: the slot's key starts with a rule's prefix and the slot's
//!    group is on the rule's allow-list, search only the pinned source
//! 2. group pinning: the slot's group is pinned to a source, search only it
//! 3. fallback: search every source in declared order
//! 4. otherwise the slot keeps its current URL
//!
//! With strict pinning a miss at step 1 or 2 ends resolution.

use std::collections::HashSet;
use tracing::{debug, trace};

use super::normalizer::{ChannelProbe, NameNormalizer};
use super::rules::MergeRules;
use super::source_index::{SourceEntry, SourceIndex};
use crate::errors::AppError;
use crate::models::{CanonicalSlot, ChannelRecord, GroupKind, ResolutionPath, SlotDecision, SourceId};

/// Resolves canonical slots against a built [`SourceIndex`]
///
/// The engine only borrows its inputs; neither the index nor the roster is
/// modified.
pub struct ResolutionEngine<'a> {
    rules: &'a MergeRules,
    normalizer: &'a NameNormalizer,
    index: &'a SourceIndex,
}

impl<'a> ResolutionEngine<'a> {
    pub fn new(rules: &'a MergeRules, normalizer: &'a NameNormalizer, index: &'a SourceIndex) -> Self {
        Self {
            rules,
            normalizer,
            index,
        }
    }

    /// Decide which record, if any, replaces the slot's URL
    pub fn resolve(&self, slot: &CanonicalSlot) -> SlotDecision<'a> {
        if slot.base_name.trim().is_empty() {
            return SlotDecision::Unchanged;
        }

        let probe = self.normalizer.probe(&slot.base_name);
        let variant = slot.variant.max(1) as usize;
        let group = slot.group_name();

        // URLs already counted toward the variant; a pin scope that misses
        // still occupies the leading positions of the fallback.
        let mut taken: HashSet<&'a str> = HashSet::new();

        let folded_key = NameNormalizer::fold(&probe.key);
        if let Some(rule) = self.rules.prefix_rule_for(&folded_key, group) {
            if let Some(record) = self.select_from(&rule.source, &probe, variant, &mut taken) {
                return self.replace(slot, record, ResolutionPath::PrefixPin);
            }
            trace!("'{}' missed prefix-pinned source '{}'", slot.display_name, rule.source);
            if self.rules.strict_group_pinning {
                return SlotDecision::Unchanged;
            }
        }

        if let Some(GroupKind::Normal {
            source: Some(source),
        }) = self.rules.group_rule(group).map(|rule| &rule.kind)
        {
            if let Some(record) = self.select_from(source, &probe, variant, &mut taken) {
                return self.replace(slot, record, ResolutionPath::GroupPin);
            }
            trace!("'{}' missed group-pinned source '{}'", slot.display_name, source);
            if self.rules.strict_group_pinning {
                return SlotDecision::Unchanged;
            }
        }

        let all: Vec<&'a SourceEntry> = self.index.sources().iter().collect();
        if let Some(record) = self.select(&all, &probe, variant, &mut taken) {
            return self.replace(slot, record, ResolutionPath::Fallback);
        }

        debug!(
            "{} (key '{}'), keeping current URL",
            AppError::not_found("channel", slot.display_name.as_str()),
            probe.key
        );
        SlotDecision::Unchanged
    }

    /// Records of `source` whose source-side group is `original_label`, in
    /// arrival order
    pub fn special_records(&self, source: &SourceId, original_label: &str) -> Vec<&'a ChannelRecord> {
        self.index
            .records_of(source)
            .iter()
            .map(|indexed| &indexed.record)
            .filter(|record| record.group_name().trim() == original_label)
            .collect()
    }

    fn replace(
        &self,
        slot: &CanonicalSlot,
        record: &'a ChannelRecord,
        path: ResolutionPath,
    ) -> SlotDecision<'a> {
        debug!(
            "'{}' resolved via {:?} from '{}' ({})",
            slot.display_name, path, record.source_id, record.raw_name
        );
        SlotDecision::Replace { record, path }
    }

    fn select_from(
        &self,
        source: &SourceId,
        probe: &ChannelProbe,
        variant: usize,
        taken: &mut HashSet<&'a str>,
    ) -> Option<&'a ChannelRecord> {
        let index: &'a SourceIndex = self.index;
        let entry = index.source(source)?;
        self.select(&[entry], probe, variant, taken)
    }

    /// The `variant`-th distinct-URL candidate across `scope`, counting the
    /// URLs already in `taken`
    ///
    /// Exact key hits of every source in the scope come before any fuzzy hit;
    /// each kind is walked in source order, then arrival order.
    fn select(
        &self,
        scope: &[&'a SourceEntry],
        probe: &ChannelProbe,
        variant: usize,
        taken: &mut HashSet<&'a str>,
    ) -> Option<&'a ChannelRecord> {
        let normalizer = self.normalizer;
        let key = probe.key.as_str();
        let exact = scope.iter().flat_map(move |&entry| entry.exact(key));
        let fuzzy = scope.iter().flat_map(move |&entry| {
            entry.records().iter().filter(move |candidate| {
                candidate.probe.key != key && normalizer.probes_match(probe, &candidate.probe)
            })
        });

        for candidate in exact.chain(fuzzy) {
            if taken.insert(candidate.record.stream_url.as_str()) && taken.len() == variant {
                return Some(&candidate.record);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, NamingConfig};
    use crate::models::AliasGroup;

    struct Fixture {
        rules: MergeRules,
        normalizer: NameNormalizer,
        index: SourceIndex,
    }

    impl Fixture {
        fn new(config_extra: &str, aliases: &[AliasGroup], records: &[(&str, &str, &str, &str)]) -> Self {
            let text = format!(
                r#"
[[sources]]
id = "A"
url = "http://a.example.com/a.m3u"

[[sources]]
id = "B"
url = "http://b.example.com/b.m3u"

{config_extra}
"#
            );
            let config: Config = toml::from_str(&text).unwrap();
            let rules = MergeRules::from_config(&config).unwrap();
            let normalizer = NameNormalizer::new(&NamingConfig::default(), aliases).unwrap();
            let records: Vec<ChannelRecord> = records
                .iter()
                .map(|(source, name, group, url)| ChannelRecord {
                    raw_name: name.to_string(),
                    normalized_name: normalizer.normalize(name),
                    group: Some(group.to_string()),
                    stream_url: url.to_string(),
                    source_id: SourceId::from(*source),
                    section_date: None,
                    attributes: Vec::new(),
                    duration: "-1".to_string(),
                })
                .collect();
            let index = SourceIndex::build(&rules.source_order, records, &normalizer);
            Self {
                rules,
                normalizer,
                index,
            }
        }

        fn engine(&self) -> ResolutionEngine<'_> {
            ResolutionEngine::new(&self.rules, &self.normalizer, &self.index)
        }
    }

    fn slot(name: &str, variant: u32, group: &str, url: &str) -> CanonicalSlot {
        CanonicalSlot {
            display_name: name.to_string(),
            base_name: name.to_string(),
            variant,
            group: Some(group.to_string()),
            current_url: url.to_string(),
            line_index: 0,
            attributes: Vec::new(),
            duration: "-1".to_string(),
        }
    }

    fn url_of<'a>(decision: &SlotDecision<'a>) -> Option<&'a str> {
        match decision {
            SlotDecision::Replace { record, .. } => Some(record.stream_url.as_str()),
            SlotDecision::Unchanged => None,
        }
    }

    #[test]
    fn test_group_pin_prefers_pinned_source() {
        let fixture = Fixture::new(
            "[[groups]]\nname = \"CentralLocal\"\nsource = \"A\"\n",
            &[],
            &[
                ("B", "StationOne", "x", "u2"),
                ("A", "StationOne", "y", "u1"),
            ],
        );
        let decision = fixture.engine().resolve(&slot("StationOne", 1, "CentralLocal", "old"));
        assert_eq!(url_of(&decision), Some("u1"));
        assert!(matches!(
            decision,
            SlotDecision::Replace {
                path: ResolutionPath::GroupPin,
                ..
            }
        ));
    }

    #[test]
    fn test_alias_resolves_through_fallback() {
        let fixture = Fixture::new(
            "",
            &[AliasGroup::new("CityLive", &["CityTV", "CityChannel"])],
            &[("B", "CityChannel", "g", "u3")],
        );
        let decision = fixture.engine().resolve(&slot("CityLive", 1, "Local", "old"));
        assert_eq!(url_of(&decision), Some("u3"));
        assert!(matches!(
            decision,
            SlotDecision::Replace {
                path: ResolutionPath::Fallback,
                ..
            }
        ));
    }

    #[test]
    fn test_unresolved_slot_is_unchanged() {
        let fixture = Fixture::new("", &[], &[("A", "StationOne", "g", "u1")]);
        let decision = fixture.engine().resolve(&slot("NoSuchStation", 1, "Local", "keep"));
        assert_eq!(decision, SlotDecision::Unchanged);

        let decision = fixture.engine().resolve(&slot("  ", 1, "Local", "keep"));
        assert_eq!(decision, SlotDecision::Unchanged);
    }

    #[test]
    fn test_group_pin_miss_falls_back_unless_strict() {
        let records = [("B", "StationTwo", "g", "u-b")];
        let lenient = Fixture::new(
            "[[groups]]\nname = \"Pinned\"\nsource = \"A\"\n",
            &[],
            &records,
        );
        let decision = lenient.engine().resolve(&slot("StationTwo", 1, "Pinned", "old"));
        assert_eq!(url_of(&decision), Some("u-b"));

        let strict = Fixture::new(
            "[resolution]\nstrict_group_pinning = true\n\n[[groups]]\nname = \"Pinned\"\nsource = \"A\"\n",
            &[],
            &records,
        );
        let decision = strict.engine().resolve(&slot("StationTwo", 1, "Pinned", "old"));
        assert_eq!(decision, SlotDecision::Unchanged);
    }

    #[test]
    fn test_prefix_pin_applies_only_to_listed_groups() {
        let fixture = Fixture::new(
            "[[prefix_rules]]\nprefix = \"CCTV\"\nsource = \"B\"\ngroups = [\"付费\"]\n",
            &[],
            &[
                ("A", "CCTV5+ 体育赛事", "g", "u-a"),
                ("B", "CCTV-5+", "g", "u-b"),
            ],
        );
        let engine = fixture.engine();

        let pinned = engine.resolve(&slot("CCTV5+", 1, "付费", "old"));
        assert_eq!(url_of(&pinned), Some("u-b"));
        assert!(matches!(
            pinned,
            SlotDecision::Replace {
                path: ResolutionPath::PrefixPin,
                ..
            }
        ));

        let other_group = engine.resolve(&slot("CCTV5+", 1, "央视", "old"));
        assert_eq!(url_of(&other_group), Some("u-a"));
    }

    #[test]
    fn test_variant_selects_nth_distinct_url() {
        let fixture = Fixture::new(
            "",
            &[],
            &[
                ("A", "CCTV1", "g", "u1"),
                ("A", "CCTV-1", "g", "u1"),
                ("A", "CCTV1 HD", "g", "u2"),
                ("B", "CCTV1", "g", "u3"),
            ],
        );
        let engine = fixture.engine();
        assert_eq!(url_of(&engine.resolve(&slot("CCTV1", 1, "g", "old"))), Some("u1"));
        assert_eq!(url_of(&engine.resolve(&slot("CCTV1", 2, "g", "old"))), Some("u2"));
        assert_eq!(url_of(&engine.resolve(&slot("CCTV1", 3, "g", "old"))), Some("u3"));
        assert_eq!(engine.resolve(&slot("CCTV1", 4, "g", "old")), SlotDecision::Unchanged);
    }

    #[test]
    fn test_exact_hits_rank_before_fuzzy_hits() {
        let fixture = Fixture::new(
            "",
            &[AliasGroup::new("吉视都市", &["吉林都市"])],
            &[
                ("A", "吉林都市 高清", "g", "u-fuzzy"),
                ("A", "吉林都市", "g", "u-exact"),
            ],
        );
        let engine = fixture.engine();
        assert_eq!(url_of(&engine.resolve(&slot("吉视都市", 1, "g", "old"))), Some("u-exact"));
        assert_eq!(url_of(&engine.resolve(&slot("吉视都市", 2, "g", "old"))), Some("u-fuzzy"));
    }

    #[test]
    fn test_pin_miss_counts_pinned_urls_before_fallback() {
        let fixture = Fixture::new(
            "[[groups]]\nname = \"G\"\nsource = \"B\"\n",
            &[],
            &[
                ("A", "StationX", "g", "u-a"),
                ("B", "StationX", "g", "u-b"),
            ],
        );
        let engine = fixture.engine();

        let first = engine.resolve(&slot("StationX", 1, "G", "old"));
        assert_eq!(url_of(&first), Some("u-b"));

        let second = engine.resolve(&slot("StationX", 2, "G", "old"));
        assert_eq!(url_of(&second), Some("u-a"));
        assert!(matches!(
            second,
            SlotDecision::Replace {
                path: ResolutionPath::Fallback,
                ..
            }
        ));

        assert_eq!(engine.resolve(&slot("StationX", 3, "G", "old")), SlotDecision::Unchanged);
    }

    #[test]
    fn test_exact_hit_in_later_source_beats_fuzzy_hit_in_earlier_source() {
        let fixture = Fixture::new(
            "",
            &[],
            &[
                ("A", "StationOne Plus", "g", "u-fuzzy"),
                ("B", "StationOne", "g", "u-exact"),
            ],
        );
        let engine = fixture.engine();
        assert_eq!(url_of(&engine.resolve(&slot("StationOne", 1, "g", "old"))), Some("u-exact"));
        assert_eq!(url_of(&engine.resolve(&slot("StationOne", 2, "g", "old"))), Some("u-fuzzy"));
    }

    #[test]
    fn test_special_records_filter_by_label() {
        let fixture = Fixture::new(
            "",
            &[],
            &[
                ("B", "Match 1", "冰茶体育", "m1"),
                ("B", "News", "新闻", "n1"),
                ("B", "Match 2", "冰茶体育", "m2"),
                ("A", "Match 3", "冰茶体育", "m3"),
            ],
        );
        let records = fixture.engine().special_records(&SourceId::from("B"), "冰茶体育");
        let urls: Vec<&str> = records.iter().map(|r| r.stream_url.as_str()).collect();
        assert_eq!(urls, vec!["m1", "m2"]);
        assert!(fixture.engine().special_records(&SourceId::from("B"), "none").is_empty());
    }
}
