//! Error type definitions for the playlist merger

use thiserror::Error;

/// Top-level application error type
///
/// Per-slot lookups never surface as errors; only configuration problems and
/// collaborator failures (I/O, HTTP) end up here.
#[derive(Error, Debug)]
pub enum AppError {
    /// Source handling errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Malformed playlist line or section
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// No candidate found for a channel
    #[error("Not found: {resource} '{name}'")]
    NotFound { resource: String, name: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File system errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Source handling specific errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network connection timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// HTTP errors from external sources
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Local playlist file could not be read
    #[error("Unreadable file: {path} - {message}")]
    Unreadable { path: String, message: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a parse error for a specific line
    pub fn parse<S: Into<String>>(line: usize, message: S) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create a not found error for a named resource
    pub fn not_found<R: Into<String>, N: Into<String>>(resource: R, name: N) -> Self {
        Self::NotFound {
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error must abort the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl SourceError {
    /// Create a timeout error
    pub fn timeout<U: Into<String>>(url: U) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Create an unreadable file error
    pub fn unreadable<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Unreadable {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_errors_are_fatal() {
        assert!(AppError::configuration("no sources configured").is_fatal());
        assert!(!AppError::parse(3, "missing url").is_fatal());
        assert!(!AppError::not_found("channel", "CCTV1").is_fatal());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AppError::parse(12, "EXTINF without stream URL").to_string(),
            "Parse error at line 12: EXTINF without stream URL"
        );
        assert_eq!(
            AppError::from(SourceError::timeout("http://example.com/a.m3u")).to_string(),
            "Source error: Connection timeout: http://example.com/a.m3u"
        );
    }
}
