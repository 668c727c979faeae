//! Centralized error handling for the playlist merger
//!
//! Errors fall into three groups that the merge run treats very differently:
//!
//! - **Configuration errors** are fatal and abort the run before any
//!   resolution happens (for example when no source is configured).
//! - **Parse errors** describe a malformed line or section. They are recorded
//!   and the offending unit is skipped.
//! - **Not found** describes a slot no source could satisfy. It is counted and
//!   the slot keeps its current URL.
//!
//! # Usage
//!
//! ```rust
//! use m3u_merge::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::configuration("no sources configured"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;
