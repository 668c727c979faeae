//! Playlist ingestion: fetching source text and parsing it into entries

pub mod fetch;
pub mod playlist_parser;

pub use fetch::{FetchedFeed, SourceFetcher, decode_playlist_bytes};
pub use playlist_parser::{ParseIssue, ParsedPlaylist, PlaylistParser};
