//! Merges regional IPTV playlists from several upstream feeds into one
//! canonical M3U playlist.
//!
//! The target playlist is the canonical roster: its channels, order and
//! attributes survive every run, only stream URLs are refreshed from whichever
//! upstream source is authoritative for the channel. Whole groups can instead
//! be replaced from one source (special groups) or from the date buckets of a
//! live-events feed (temporal groups).

pub mod config;
pub mod errors;
pub mod generator;
pub mod ingestor;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod utils;
