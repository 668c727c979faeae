use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub mod channel;
pub mod stats;

pub use channel::*;
pub use stats::RunStats;

/// Identifier of an upstream playlist source as declared in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Date-relative classification of a live-events record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalBucket {
    Today,
    Yesterday,
    Tomorrow,
    Other,
}

impl TemporalBucket {
    pub const ALL: [TemporalBucket; 4] = [
        TemporalBucket::Today,
        TemporalBucket::Yesterday,
        TemporalBucket::Tomorrow,
        TemporalBucket::Other,
    ];

    /// Bucket for a signed day difference `section_date - reference_date`
    pub fn from_day_offset(days: i64) -> Self {
        match days {
            0 => TemporalBucket::Today,
            -1 => TemporalBucket::Yesterday,
            1 => TemporalBucket::Tomorrow,
            _ => TemporalBucket::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalBucket::Today => "today",
            TemporalBucket::Yesterday => "yesterday",
            TemporalBucket::Tomorrow => "tomorrow",
            TemporalBucket::Other => "other",
        }
    }
}

impl fmt::Display for TemporalBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the slots of one canonical group are produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind {
    /// Slots are resolved one by one, optionally pinned to a single source
    Normal { source: Option<SourceId> },
    /// All slots are replaced by the records of `source` whose source-side
    /// group equals `original_label`
    Special {
        source: SourceId,
        original_label: String,
    },
    /// All slots are replaced by the live-events records of these buckets
    Temporal { buckets: BTreeSet<TemporalBucket> },
}

impl GroupKind {
    /// Whether the group's slots are replaced wholesale rather than resolved
    pub fn is_replaced(&self) -> bool {
        !matches!(self, GroupKind::Normal { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            GroupKind::Normal { .. } => "normal",
            GroupKind::Special { .. } => "special",
            GroupKind::Temporal { .. } => "temporal",
        }
    }
}

/// A configured group together with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRule {
    pub name: String,
    pub kind: GroupKind,
}

/// Interchangeable spellings of one channel name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasGroup {
    pub canonical: String,
    #[serde(default)]
    pub variants: Vec<String>,
    /// A variant claimed by several groups belongs to the highest priority;
    /// ties go to the group declared first
    #[serde(default)]
    pub priority: i32,
}

impl AliasGroup {
    pub fn new<S: Into<String>>(canonical: S, variants: &[&str]) -> Self {
        Self {
            canonical: canonical.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
            priority: 0,
        }
    }
}

/// Binds channel names starting with `prefix` to one source, for the listed
/// groups only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRule {
    pub prefix: String,
    pub source: SourceId,
    pub groups: Vec<String>,
}

impl PrefixRule {
    pub fn applies_to_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_from_day_offset() {
        assert_eq!(TemporalBucket::from_day_offset(0), TemporalBucket::Today);
        assert_eq!(TemporalBucket::from_day_offset(-1), TemporalBucket::Yesterday);
        assert_eq!(TemporalBucket::from_day_offset(1), TemporalBucket::Tomorrow);
        assert_eq!(TemporalBucket::from_day_offset(2), TemporalBucket::Other);
        assert_eq!(TemporalBucket::from_day_offset(-30), TemporalBucket::Other);
    }

    #[test]
    fn test_bucket_serde_names() {
        let bucket: TemporalBucket = serde_json::from_str(r#""yesterday""#).unwrap();
        assert_eq!(bucket, TemporalBucket::Yesterday);
        assert_eq!(serde_json::to_string(&TemporalBucket::Other).unwrap(), r#""other""#);
    }

    #[test]
    fn test_group_kind_replacement() {
        assert!(!GroupKind::Normal { source: None }.is_replaced());
        assert!(
            GroupKind::Special {
                source: SourceId::from("sports"),
                original_label: "冰茶体育".to_string(),
            }
            .is_replaced()
        );
        assert!(
            GroupKind::Temporal {
                buckets: BTreeSet::from([TemporalBucket::Today]),
            }
            .is_replaced()
        );
    }
}
