//! Run-scoped stream URL de-duplication

use std::collections::HashSet;
use tracing::trace;

use crate::models::{ChannelRecord, OutputEntry};
use crate::utils::stream_url_digest;

/// Anything carrying a stream URL
pub trait StreamUrl {
    fn stream_url(&self) -> &str;
}

impl StreamUrl for OutputEntry {
    fn stream_url(&self) -> &str {
        &self.url
    }
}

impl StreamUrl for ChannelRecord {
    fn stream_url(&self) -> &str {
        &self.stream_url
    }
}

/// Suppresses items whose URL digest was already emitted in this run
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
    suppressed: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `url`, returning whether it had not been seen yet
    pub fn admit(&mut self, url: &str) -> bool {
        if self.seen.insert(stream_url_digest(url)) {
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Keep the first occurrence of every URL, preserving order
    pub fn dedupe<T: StreamUrl>(&mut self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| {
                let admitted = self.admit(item.stream_url());
                if !admitted {
                    trace!("Suppressed duplicate stream {}", item.stream_url());
                }
                admitted
            })
            .collect()
    }

    pub fn suppressed(&self) -> usize {
        self.suppressed
    }
}
