//! propdoc fuzzy matching.
//!
//! Reconciles extracted key fields against an in-memory property registry.
//! Each matchable field gets a field-appropriate similarity metric —
//! order-sensitive edit distance for identifiers, token-order-insensitive
//! for addresses — with one shared threshold for filtering and auto-match
//! acceptance. Per-field hits are merged, deduplicated by property id
//! (best single-field similarity wins), and capped at a configured top-N.
//!
//! The registry is loaded wholesale before matching begins and is read-only
//! for the session; matching without one is a fast usage error, not a
//! degraded path.

mod engine;
mod error;
mod registry;
mod similarity;

pub use crate::engine::{
    FieldMatches, FuzzyMatcher, KeyFields, MatchCandidate, MatchConfig, MatchField, MatchOutcome,
};
pub use crate::error::MatchError;
pub use crate::registry::{PropertyRecord, Registry};
pub use crate::similarity::{ratio, token_sort_ratio};
