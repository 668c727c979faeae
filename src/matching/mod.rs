//! Channel matching core
//!
//! Everything in this module is synchronous and free of I/O. A run compiles
//! [`MergeRules`] and a [`NameNormalizer`] once, builds the [`SourceIndex`]
//! from every parsed source, and then resolves the target roster slot by slot.

pub mod normalizer;
pub mod resolution;
pub mod rules;
pub mod source_index;
pub mod temporal;

pub use normalizer::{ChannelProbe, NameNormalizer};
pub use resolution::ResolutionEngine;
pub use rules::{MergeRules, TemporalSettings};
pub use source_index::{IndexedRecord, SourceEntry, SourceIndex};
pub use temporal::{TemporalBuckets, TemporalClassifier};
