//! Compiled merge rules
//!
//! [`MergeRules`] is the validated, immutable form of the group, prefix and
//! temporal sections of the configuration. It is built once before any source
//! is parsed; every problem found here is a configuration error.

use chrono::FixedOffset;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

use super::normalizer::NameNormalizer;
use crate::config::defaults::DEFAULT_REFERENCE_OFFSET;
use crate::config::{Config, GroupKindConfig, GroupRuleConfig};
use crate::errors::{AppError, AppResult};
use crate::models::{GroupKind, GroupRule, PrefixRule, SourceId};
use crate::utils::time::{fixed_offset, parse_time_offset};

/// Settings for the designated live-events source
#[derive(Debug, Clone)]
pub struct TemporalSettings {
    pub source: SourceId,
    pub date_pattern: Regex,
}

/// Validated rule set shared by every component of a run
#[derive(Debug, Clone)]
pub struct MergeRules {
    /// Source ids in fallback order
    pub source_order: Vec<SourceId>,
    pub groups: Vec<GroupRule>,
    /// Prefix rules with folded prefixes
    pub prefix_rules: Vec<PrefixRule>,
    pub temporal: Option<TemporalSettings>,
    /// Fixed offset from UTC defining "today" and the update timestamp
    pub reference_offset: FixedOffset,
    pub line_marker: String,
    pub strict_group_pinning: bool,
}

impl MergeRules {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let source_order = config.source_order();
        if source_order.is_empty() {
            return Err(AppError::configuration("no sources configured"));
        }
        let known: HashSet<&SourceId> = source_order.iter().collect();

        let require_source = |field: &str, id: &str| -> AppResult<SourceId> {
            let source = SourceId::new(id.trim());
            if known.contains(&source) {
                Ok(source)
            } else {
                Err(AppError::configuration(format!(
                    "{field} refers to unknown source '{id}'"
                )))
            }
        };

        let raw_offset = config
            .temporal
            .as_ref()
            .map_or(DEFAULT_REFERENCE_OFFSET, |temporal| temporal.reference_offset.as_str());
        let reference_offset = parse_time_offset(raw_offset)
            .and_then(fixed_offset)
            .map_err(|e| AppError::configuration(format!("invalid temporal.reference_offset: {e}")))?;

        let temporal = match &config.temporal {
            Some(temporal) => {
                let source = require_source("temporal.source", &temporal.source)?;
                let date_pattern = Regex::new(&temporal.date_pattern).map_err(|e| {
                    AppError::configuration(format!(
                        "invalid temporal.date_pattern '{}': {e}",
                        temporal.date_pattern
                    ))
                })?;
                Some(TemporalSettings {
                    source,
                    date_pattern,
                })
            }
            None => None,
        };

        let mut groups = Vec::with_capacity(config.groups.len());
        let mut seen_groups = HashSet::new();
        for group in &config.groups {
            let name = group.name.trim();
            if name.is_empty() {
                return Err(AppError::configuration("group rule with empty name"));
            }
            if !seen_groups.insert(name) {
                return Err(AppError::configuration(format!(
                    "duplicate group rule '{name}'"
                )));
            }
            let kind = compile_group_kind(group, &require_source, temporal.is_some())?;
            debug!("Group '{}' is {}", name, kind.label());
            groups.push(GroupRule {
                name: name.to_string(),
                kind,
            });
        }

        let mut prefix_rules = Vec::with_capacity(config.prefix_rules.len());
        for rule in &config.prefix_rules {
            let prefix = NameNormalizer::fold(&rule.prefix);
            if prefix.is_empty() {
                return Err(AppError::configuration(format!(
                    "prefix rule '{}' has an empty prefix",
                    rule.prefix
                )));
            }
            if rule.groups.is_empty() {
                warn!("Prefix rule '{}' lists no groups and never applies", rule.prefix);
            }
            prefix_rules.push(PrefixRule {
                prefix,
                source: require_source("prefix_rules.source", &rule.source)?,
                groups: rule.groups.iter().map(|g| g.trim().to_string()).collect(),
            });
        }

        debug!(
            "Compiled {} group rules and {} prefix rules over {} sources",
            groups.len(),
            prefix_rules.len(),
            source_order.len()
        );

        Ok(Self {
            source_order,
            groups,
            prefix_rules,
            temporal,
            reference_offset,
            line_marker: config.naming.line_marker.trim().to_string(),
            strict_group_pinning: config.resolution.strict_group_pinning,
        })
    }

    /// Rule for a canonical group, if one is configured
    pub fn group_rule(&self, group: &str) -> Option<&GroupRule> {
        self.groups.iter().find(|rule| rule.name == group)
    }

    /// First prefix rule whose folded prefix starts `folded_key` and whose
    /// allow-list contains `group`
    pub fn prefix_rule_for(&self, folded_key: &str, group: &str) -> Option<&PrefixRule> {
        self.prefix_rules
            .iter()
            .find(|rule| folded_key.starts_with(rule.prefix.as_str()) && rule.applies_to_group(group))
    }
}

fn compile_group_kind<F>(
    group: &GroupRuleConfig,
    require_source: &F,
    temporal_configured: bool,
) -> AppResult<GroupKind>
where
    F: Fn(&str, &str) -> AppResult<SourceId>,
{
    let field = format!("group '{}'", group.name);
    match group.kind {
        GroupKindConfig::Normal => {
            let source = match &group.source {
                Some(id) => Some(require_source(&field, id)?),
                None => None,
            };
            Ok(GroupKind::Normal { source })
        }
        GroupKindConfig::Special => {
            let id = group.source.as_deref().ok_or_else(|| {
                AppError::configuration(format!("special {field} needs a source"))
            })?;
            let original_label = group
                .source_group
                .as_deref()
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .ok_or_else(|| {
                    AppError::configuration(format!("special {field} needs a source_group"))
                })?;
            Ok(GroupKind::Special {
                source: require_source(&field, id)?,
                original_label: original_label.to_string(),
            })
        }
        GroupKindConfig::Temporal => {
            if !temporal_configured {
                return Err(AppError::configuration(format!(
                    "temporal {field} needs a [temporal] section"
                )));
            }
            let buckets: BTreeSet<_> = group.buckets.iter().copied().collect();
            if buckets.is_empty() {
                return Err(AppError::configuration(format!(
                    "temporal {field} lists no buckets"
                )));
            }
            Ok(GroupKind::Temporal { buckets })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TemporalBucket;

    fn config(extra: &str) -> Config {
        let text = format!(
            r#"
[[sources]]
id = "jilin"
url = "http://example.com/jilin.m3u"

[[sources]]
id = "events"
path = "events.txt"

{extra}
"#
        );
        toml::from_str(&text).unwrap()
    }

    #[test]
    fn test_compiles_all_group_kinds() {
        let rules = MergeRules::from_config(&config(
            r#"
[[groups]]
name = "央视吉林"
source = "jilin"

[[groups]]
name = "连宇体育"
kind = "special"
source = "events"
source_group = "冰茶体育"

[[groups]]
name = "赛事"
kind = "temporal"
buckets = ["tomorrow", "today"]

[[prefix_rules]]
prefix = "cctv"
source = "jilin"
groups = ["央视付费频道"]

[temporal]
source = "events"
"#,
        ))
        .unwrap();

        assert_eq!(rules.source_order, vec![SourceId::from("jilin"), SourceId::from("events")]);
        assert_eq!(
            rules.group_rule("央视吉林").unwrap().kind,
            GroupKind::Normal {
                source: Some(SourceId::from("jilin"))
            }
        );
        assert!(rules.group_rule("连宇体育").unwrap().kind.is_replaced());
        assert_eq!(
            rules.group_rule("赛事").unwrap().kind,
            GroupKind::Temporal {
                buckets: BTreeSet::from([TemporalBucket::Today, TemporalBucket::Tomorrow])
            }
        );
        assert!(rules.group_rule("other").is_none());

        assert_eq!(rules.prefix_rules[0].prefix, "CCTV");
        assert!(rules.prefix_rule_for("CCTV5+", "央视付费频道").is_some());
        assert!(rules.prefix_rule_for("CCTV5+", "央视吉林").is_none());

        assert_eq!(rules.temporal.unwrap().source, SourceId::from("events"));
        assert_eq!(rules.reference_offset.local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_unknown_source_is_fatal() {
        let err = MergeRules::from_config(&config(
            r#"
[[groups]]
name = "央视吉林"
source = "nowhere"
"#,
        ))
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_special_group_needs_label() {
        let err = MergeRules::from_config(&config(
            r#"
[[groups]]
name = "连宇体育"
kind = "special"
source = "events"
"#,
        ))
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_temporal_group_needs_temporal_section() {
        assert!(
            MergeRules::from_config(&config(
                r#"
[[groups]]
name = "赛事"
kind = "temporal"
buckets = ["today"]
"#,
            ))
            .is_err()
        );
    }

    #[test]
    fn test_bad_offset_and_pattern_rejected() {
        assert!(
            MergeRules::from_config(&config(
                r#"
[temporal]
source = "events"
reference_offset = "+30h"
"#,
            ))
            .is_err()
        );
        assert!(
            MergeRules::from_config(&config(
                r#"
[temporal]
source = "events"
date_pattern = "(\\d{8}"
"#,
            ))
            .is_err()
        );
    }

    #[test]
    fn test_reference_offset_defaults_without_temporal_section() {
        let rules = MergeRules::from_config(&config("")).unwrap();
        assert!(rules.temporal.is_none());
        assert_eq!(rules.reference_offset.local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_duplicate_group_rejected() {
        assert!(
            MergeRules::from_config(&config(
                r#"
[[groups]]
name = "A"

[[groups]]
name = "A"
"#,
            ))
            .is_err()
        );
    }
}
