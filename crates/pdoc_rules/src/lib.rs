//! Declarative document-type rules for the propdoc classifier.
//!
//! A [`RuleSet`] is pure data loaded from YAML: per-type keyword patterns,
//! named regex checks, score weights, and a pass threshold. The classifier
//! crate consumes it; nothing here scores documents.
//!
//! Loading is fallible but callers are expected to degrade rather than
//! abort: [`RuleSet::fallback`] yields the single catch-all `unknown` type
//! with a zero threshold for when configuration is missing or corrupt.

mod error;
mod types;

pub use crate::error::RuleError;
pub use crate::types::{DocTypeRule, RuleSet, RuleWeights, UNKNOWN_DOC_TYPE};
