use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::errors::{AppError, AppResult};
use crate::models::{AliasGroup, SourceId, TemporalBucket};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream playlists, in fallback order
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub aliases: Vec<AliasGroup>,
    #[serde(default)]
    pub groups: Vec<GroupRuleConfig>,
    #[serde(default)]
    pub prefix_rules: Vec<PrefixRuleConfig>,
    pub temporal: Option<TemporalConfig>,
}

/// One upstream playlist. Exactly one of `url`, `url_env` or `path` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub url: Option<String>,
    /// Environment variable holding the URL; unset or empty disables the source
    pub url_env: Option<String>,
    pub path: Option<PathBuf>,
}

/// Where a source's playlist text comes from once the environment is consulted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Url(String),
    Path(PathBuf),
}

impl SourceConfig {
    pub fn source_id(&self) -> SourceId {
        SourceId::new(self.id.clone())
    }

    /// Resolve the configured location, `None` when the source is disabled
    pub fn location(&self) -> Option<SourceLocation> {
        if let Some(url) = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            return Some(SourceLocation::Url(url.to_string()));
        }
        if let Some(var) = &self.url_env {
            return std::env::var(var)
                .ok()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .map(SourceLocation::Url);
        }
        self.path.clone().map(SourceLocation::Path)
    }

    fn validate(&self) -> AppResult<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::configuration("source with empty id"));
        }
        let declared = [self.url.is_some(), self.url_env.is_some(), self.path.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if declared != 1 {
            return Err(AppError::configuration(format!(
                "source '{}' must set exactly one of url, url_env or path",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout", with = "duration_serde::duration")]
    pub timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// Current published playlist, read as the canonical roster
    #[serde(default = "default_target_path")]
    pub target: PathBuf,
    /// Where to write the merged playlist; defaults to `target`
    pub output: Option<PathBuf>,
    /// Header used when the target has none
    #[serde(default = "default_playlist_header")]
    pub default_header: String,
    #[serde(default = "default_write_update_trailer")]
    pub write_update_trailer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Suffix marking alternative lines of one channel, e.g. `CCTV1 线路2`
    #[serde(default = "default_line_marker")]
    pub line_marker: String,
    /// Ordered key-extraction patterns; first capture group is the key
    #[serde(default = "default_family_patterns")]
    pub families: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Stop at a group's pinned source instead of falling back to all sources
    #[serde(default)]
    pub strict_group_pinning: bool,
    /// Accept substring matches between alias forms
    #[serde(default = "default_true")]
    pub fuzzy_matching: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKindConfig {
    #[default]
    Normal,
    Special,
    Temporal,
}

/// A canonical group and how its slots are produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRuleConfig {
    pub name: String,
    #[serde(default)]
    pub kind: GroupKindConfig,
    /// Pinned source (normal), or the replacing source (special)
    pub source: Option<String>,
    /// Source-side group label to copy (special only)
    pub source_group: Option<String>,
    /// Buckets emitted under this group (temporal only)
    #[serde(default)]
    pub buckets: Vec<TemporalBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixRuleConfig {
    pub prefix: String,
    pub source: String,
    /// Groups the prefix rule applies to
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// The designated live-events source
    pub source: String,
    /// Regex whose first capture group is the `YYYYMMDD` token of a section header
    #[serde(default = "default_date_pattern")]
    pub date_pattern: String,
    /// Fixed offset from UTC used to compute today's date, e.g. `+8h`
    #[serde(default = "default_reference_offset")]
    pub reference_offset: String,
}

fn default_true() -> bool {
    true
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_target_path() -> PathBuf {
    PathBuf::from(DEFAULT_TARGET_PATH)
}

fn default_playlist_header() -> String {
    DEFAULT_PLAYLIST_HEADER.to_string()
}

fn default_write_update_trailer() -> bool {
    DEFAULT_WRITE_UPDATE_TRAILER
}

fn default_line_marker() -> String {
    DEFAULT_LINE_MARKER.to_string()
}

fn default_date_pattern() -> String {
    DEFAULT_DATE_PATTERN.to_string()
}

fn default_reference_offset() -> String {
    DEFAULT_REFERENCE_OFFSET.to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            target: default_target_path(),
            output: None,
            default_header: default_playlist_header(),
            write_update_trailer: default_write_update_trailer(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            line_marker: default_line_marker(),
            families: default_family_patterns(),
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            strict_group_pinning: false,
            fuzzy_matching: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "merge.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }

    /// Source ids in declared order
    pub fn source_order(&self) -> Vec<SourceId> {
        self.sources.iter().map(SourceConfig::source_id).collect()
    }

    /// Sources that resolve to a location, in declared order
    ///
    /// A configuration where no source resolves is fatal.
    pub fn active_sources(&self) -> AppResult<Vec<(SourceId, SourceLocation)>> {
        let active: Vec<_> = self
            .sources
            .iter()
            .filter_map(|source| match source.location() {
                Some(location) => Some((source.source_id(), location)),
                None => {
                    warn!("Source '{}' has no location configured, skipping", source.id);
                    None
                }
            })
            .collect();

        if active.is_empty() {
            return Err(AppError::configuration(
                "no usable sources configured; set url, url_env or path for at least one source",
            ));
        }
        Ok(active)
    }

    /// Structural validation that does not need compiled rules
    pub fn validate(&self) -> AppResult<()> {
        if self.sources.is_empty() {
            return Err(AppError::configuration("no sources configured"));
        }
        for source in &self.sources {
            source.validate()?;
        }
        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(AppError::configuration(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
        }
        if self.naming.line_marker.trim().is_empty() {
            return Err(AppError::configuration("naming.line_marker must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[sources]]
id = "jilin"
url = "http://example.com/jilin.m3u"

[[sources]]
id = "events"
path = "feeds/events.txt"

[fetch]
timeout = "10s"

[[aliases]]
canonical = "吉视都市"
variants = ["吉林都市", "吉林电视台都市频道"]

[[groups]]
name = "央视吉林"
source = "jilin"

[[groups]]
name = "连宇体育"
kind = "special"
source = "events"
source_group = "冰茶体育"

[[groups]]
name = "今日赛事"
kind = "temporal"
buckets = ["today"]

[[prefix_rules]]
prefix = "CCTV"
source = "jilin"
groups = ["央视付费频道"]

[temporal]
source = "events"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.fetch.timeout, Duration::from_secs(10));
        assert_eq!(config.fetch.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.groups[1].kind, GroupKindConfig::Special);
        assert_eq!(config.groups[2].buckets, vec![TemporalBucket::Today]);
        assert_eq!(config.aliases[0].priority, 0);
        assert_eq!(config.naming.line_marker, "线路");
        assert!(config.resolution.fuzzy_matching);

        let temporal = config.temporal.as_ref().unwrap();
        assert_eq!(temporal.date_pattern, DEFAULT_DATE_PATTERN);
        assert_eq!(temporal.reference_offset, "+8h");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_source_configuration_is_fatal() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_source_must_declare_one_location() {
        let config: Config = toml::from_str(
            r#"
[[sources]]
id = "a"
url = "http://example.com/a.m3u"
path = "a.m3u"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_source_ids_rejected() {
        let config: Config = toml::from_str(
            r#"
[[sources]]
id = "a"
url = "http://example.com/a.m3u"

[[sources]]
id = "a"
url = "http://example.com/b.m3u"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_source_unset_is_inactive() {
        let config: Config = toml::from_str(
            r#"
[[sources]]
id = "secret"
url_env = "M3U_MERGE_TEST_SOURCE_THAT_IS_NEVER_SET"
"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert!(config.sources[0].location().is_none());
        assert!(config.active_sources().unwrap_err().is_fatal());
    }

    #[test]
    fn test_unset_env_source_is_skipped_among_active_sources() {
        let config: Config = toml::from_str(
            r#"
[[sources]]
id = "secret"
url_env = "M3U_MERGE_TEST_SOURCE_THAT_IS_NEVER_SET"

[[sources]]
id = "local"
path = "/srv/playlists/local.m3u"
"#,
        )
        .unwrap();
        let active = config.active_sources().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0, SourceId::from("local"));
    }

    #[test]
    fn test_load_from_file_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge.toml");
        let path_str = path.to_str().unwrap();

        let config = Config::load_from_file(path_str).unwrap();
        assert!(config.sources.is_empty());
        assert!(path.exists());

        let reloaded = Config::load_from_file(path_str).unwrap();
        assert_eq!(reloaded.naming.families, default_family_patterns());
        assert_eq!(reloaded.fetch.timeout, default_fetch_timeout());
    }
}
