//! Utility modules shared by the parser, the merge core and the CLI

pub mod hashing;
pub mod time;
pub mod url;

pub use hashing::stream_url_digest;
pub use url::UrlUtils;
