use sha2::{Digest, Sha256};

/// Stable content digest of a stream URL, used as the dedup key
///
/// Surrounding whitespace is ignored; everything else (scheme, case, query
/// order) is significant.
pub fn stream_url_digest(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    hex::encode(hasher.finalize())
}
