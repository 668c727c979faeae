//! Source fetching
//!
//! Every configured source is fetched concurrently. A source that cannot be
//! fetched is logged and treated as empty; it never aborts the run.

use encoding_rs::GBK;
use futures::future::join_all;
use reqwest::Client;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{FetchConfig, SourceLocation};
use crate::errors::{AppError, AppResult, SourceError, SourceResult};
use crate::models::SourceId;
use crate::utils::UrlUtils;

/// Raw playlist text of one source; `None` when the fetch failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFeed {
    pub source_id: SourceId,
    pub content: Option<String>,
}

/// Fetches source playlists over HTTP(S) or from local files
pub struct SourceFetcher {
    client: Client,
}

impl SourceFetcher {
    /// Create a fetcher with the configured timeout and user agent
    pub fn new(config: &FetchConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }

    /// Fetch all sources concurrently, preserving input order
    pub async fn fetch_all(&self, sources: &[(SourceId, SourceLocation)]) -> Vec<FetchedFeed> {
        let feeds = join_all(sources.iter().map(|(source_id, location)| async move {
            let content = match self.fetch(location).await {
                Ok(content) => {
                    debug!("Fetched source '{}' ({} bytes)", source_id, content.len());
                    Some(content)
                }
                Err(e) => {
                    warn!(
                        "Source '{}' unavailable, treating as empty: {}",
                        source_id, e
                    );
                    None
                }
            };
            FetchedFeed {
                source_id: source_id.clone(),
                content,
            }
        }))
        .await;

        let available = feeds.iter().filter(|f| f.content.is_some()).count();
        info!("Fetched {}/{} sources", available, feeds.len());
        feeds
    }

    /// Fetch a single location
    pub async fn fetch(&self, location: &SourceLocation) -> AppResult<String> {
        match location {
            SourceLocation::Url(url) => self.fetch_url(url).await,
            SourceLocation::Path(path) => Ok(read_playlist_file(path).await?),
        }
    }

    async fn fetch_url(&self, url: &str) -> AppResult<String> {
        let display_url = UrlUtils::obfuscate_credentials(url);
        debug!(
            "Fetching playlist from {} (host {})",
            display_url,
            UrlUtils::extract_domain(url).unwrap_or_default()
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::from(SourceError::timeout(display_url.clone()))
            } else {
                AppError::from(e.without_url())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("{} returned {}", display_url, status),
            }
            .into());
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                AppError::from(SourceError::timeout(display_url.clone()))
            } else {
                AppError::from(e.without_url())
            }
        })?;
        Ok(decode_playlist_bytes(&bytes))
    }
}

async fn read_playlist_file(path: &Path) -> SourceResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SourceError::unreadable(path.display().to_string(), e.to_string()))?;
    Ok(decode_playlist_bytes(&bytes))
}

/// Decode playlist bytes, dropping a UTF-8 byte order mark
///
/// UTF-8 is tried first, then GBK (a superset of GB2312, common in regional
/// feeds). Bytes valid in neither are decoded as lossy UTF-8.
pub fn decode_playlist_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    if let Some(text) = GBK.decode_without_bom_handling_and_without_replacement(bytes) {
        debug!("Playlist is not valid UTF-8, decoded as GBK");
        return text.into_owned();
    }

    warn!("Playlist is neither UTF-8 nor GBK, replacing invalid sequences");
    String::from_utf8_lossy(bytes).into_owned()
}
