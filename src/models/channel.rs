//! Channel-level data flowing through a merge run

use chrono::NaiveDate;
use serde::Serialize;

use super::{SourceId, TemporalBucket};
use crate::errors::{AppError, AppResult};
use crate::utils::url::UrlUtils;

/// Ordered `key="value"` attributes of an EXTINF line
pub type Attributes = Vec<(String, String)>;

/// Looks up an attribute by key
pub fn attribute<'a>(attributes: &'a Attributes, key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Sets an attribute, keeping its position when it already exists
pub fn set_attribute(attributes: &mut Attributes, key: &str, value: &str) {
    match attributes.iter_mut().find(|(k, _)| k == key) {
        Some((_, v)) => *v = value.to_string(),
        None => attributes.push((key.to_string(), value.to_string())),
    }
}

/// One paired playlist entry as produced by the parser
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    /// Name as written in the playlist
    pub display_name: String,
    /// Name with the line marker suffix removed
    pub base_name: String,
    /// 1 for the primary line, N for `<marker>N`
    pub variant: u32,
    /// EXTINF duration token, `-1` for live streams and simple lines
    pub duration: String,
    pub attributes: Attributes,
    /// `group-title`, or the active section label
    pub group: Option<String>,
    pub url: String,
    pub section_date: Option<NaiveDate>,
    /// Zero-based position among the playlist's entries
    pub line_index: usize,
}

/// A normalized upstream channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRecord {
    pub raw_name: String,
    pub normalized_name: String,
    pub group: Option<String>,
    pub stream_url: String,
    pub source_id: SourceId,
    pub section_date: Option<NaiveDate>,
    #[serde(skip)]
    pub attributes: Attributes,
    #[serde(skip)]
    pub duration: String,
}

impl ChannelRecord {
    /// Build a record from a parsed entry, rejecting entries whose URL is not
    /// an http(s) stream URL
    pub fn from_entry(
        entry: PlaylistEntry,
        source_id: SourceId,
        normalized_name: String,
    ) -> AppResult<Self> {
        if !UrlUtils::is_stream_url(&entry.url) {
            return Err(AppError::parse(
                entry.line_index,
                format!("'{}' is not an http(s) stream URL", entry.url),
            ));
        }

        Ok(Self {
            raw_name: entry.base_name,
            normalized_name,
            group: entry.group,
            stream_url: entry.url,
            source_id,
            section_date: entry.section_date,
            attributes: entry.attributes,
            duration: entry.duration,
        })
    }

    pub fn group_name(&self) -> &str {
        self.group.as_deref().unwrap_or_default()
    }
}

/// An entry of the current target playlist that a run attempts to refresh
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSlot {
    pub display_name: String,
    pub base_name: String,
    pub variant: u32,
    pub group: Option<String>,
    pub current_url: String,
    pub line_index: usize,
    pub attributes: Attributes,
    pub duration: String,
}

impl CanonicalSlot {
    pub fn group_name(&self) -> &str {
        self.group.as_deref().unwrap_or_default()
    }
}

impl From<PlaylistEntry> for CanonicalSlot {
    fn from(entry: PlaylistEntry) -> Self {
        Self {
            display_name: entry.display_name,
            base_name: entry.base_name,
            variant: entry.variant,
            group: entry.group,
            current_url: entry.url,
            line_index: entry.line_index,
            attributes: entry.attributes,
            duration: entry.duration,
        }
    }
}

/// Which precedence step produced a replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPath {
    PrefixPin,
    GroupPin,
    Fallback,
}

/// Outcome of resolving one canonical slot
#[derive(Debug, Clone, PartialEq)]
pub enum SlotDecision<'a> {
    Replace {
        record: &'a ChannelRecord,
        path: ResolutionPath,
    },
    /// Keep `current_url` verbatim
    Unchanged,
}

/// Where an emitted entry came from
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOrigin {
    Roster { line_index: usize, changed: bool },
    Special { source: SourceId },
    Temporal { bucket: TemporalBucket },
}

/// One entry of the composed output playlist
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEntry {
    pub name: String,
    pub group: Option<String>,
    pub url: String,
    pub duration: String,
    pub attributes: Attributes,
    pub origin: EntryOrigin,
}

impl OutputEntry {
    /// Entry for a roster slot, with `url` either refreshed or the slot's own
    pub fn from_slot(slot: &CanonicalSlot, url: &str) -> Self {
        Self {
            name: slot.display_name.clone(),
            group: slot.group.clone(),
            url: url.to_string(),
            duration: slot.duration.clone(),
            attributes: slot.attributes.clone(),
            origin: EntryOrigin::Roster {
                line_index: slot.line_index,
                changed: url != slot.current_url,
            },
        }
    }

    /// Entry emitted for a whole-group replacement, re-grouped under `group`
    pub fn from_record(record: &ChannelRecord, group: &str, origin: EntryOrigin) -> Self {
        let mut attributes = record.attributes.clone();
        set_attribute(&mut attributes, "group-title", group);

        Self {
            name: record.raw_name.clone(),
            group: Some(group.to_string()),
            url: record.stream_url.clone(),
            duration: record.duration.clone(),
            attributes,
            origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, url: &str) -> PlaylistEntry {
        PlaylistEntry {
            display_name: name.to_string(),
            base_name: name.to_string(),
            variant: 1,
            duration: "-1".to_string(),
            attributes: vec![("tvg-id".to_string(), "one".to_string())],
            group: Some("源分组".to_string()),
            url: url.to_string(),
            section_date: None,
            line_index: 0,
        }
    }

    #[test]
    fn test_record_requires_http_url() {
        let ok = ChannelRecord::from_entry(
            entry("StationOne", "https://cdn.example.com/one.m3u8"),
            SourceId::from("a"),
            "STATIONONE".to_string(),
        );
        assert!(ok.is_ok());

        let err = ChannelRecord::from_entry(
            entry("StationOne", "rtsp://cdn.example.com/one"),
            SourceId::from("a"),
            "STATIONONE".to_string(),
        );
        assert!(matches!(err, Err(AppError::Parse { .. })));
    }

    #[test]
    fn test_output_entry_regroups_record() {
        let record = ChannelRecord::from_entry(
            entry("Match 1", "http://cdn.example.com/m1"),
            SourceId::from("sports"),
            "MATCH1".to_string(),
        )
        .unwrap();

        let out = OutputEntry::from_record(
            &record,
            "连宇体育",
            EntryOrigin::Special {
                source: SourceId::from("sports"),
            },
        );
        assert_eq!(out.group.as_deref(), Some("连宇体育"));
        assert_eq!(attribute(&out.attributes, "group-title"), Some("连宇体育"));
        assert_eq!(attribute(&out.attributes, "tvg-id"), Some("one"));
    }

    #[test]
    fn test_set_attribute_keeps_position() {
        let mut attributes = vec![
            ("tvg-id".to_string(), "x".to_string()),
            ("group-title".to_string(), "old".to_string()),
            ("tvg-logo".to_string(), "l".to_string()),
        ];
        set_attribute(&mut attributes, "group-title", "new");
        assert_eq!(attributes[1], ("group-title".to_string(), "new".to_string()));
        assert_eq!(attributes.len(), 3);
    }
}
