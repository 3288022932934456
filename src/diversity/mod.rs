//! Novelty checks for generated samples.
//!
//! Two uses of the same key:
//!
//! - [`Deduplicator`] runs a stateless pass over a whole partition and keeps
//!   the first occurrence of every (task, context, output) triple.
//! - [`SeenKeyIndex`] is built from the accepted partition at the start of a
//!   run and extended on every acceptance, so the pipeline can reject a
//!   candidate that would duplicate an accepted sample.

pub mod dedup;

pub use dedup::{sample_key, DeduplicationResult, Deduplicator, SeenKeyIndex};
