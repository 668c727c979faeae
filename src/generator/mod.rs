//! Output generation: run-scoped de-duplication and M3U rendering

pub mod composer;
pub mod dedup;

pub use composer::PlaylistComposer;
pub use dedup::{Deduplicator, StreamUrl};
