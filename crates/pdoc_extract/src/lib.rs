//! propdoc field extraction.
//!
//! Runs a fixed table of field regexes over cleaned document text, collects
//! every hit as a [`Candidate`] with its surrounding context, and picks one
//! best value per field through a weighted composite score (format re-match,
//! context keyword density, document-position decay, value shape).
//!
//! Nothing here raises for "not found": a field with zero candidates is
//! simply absent from the result. The only fallible operation is
//! [`Extractor::new`], which compiles the pattern table up front.

mod candidate;
mod error;
mod extract;
mod field;
mod score;
pub mod validate;

pub use crate::candidate::Candidate;
pub use crate::error::ExtractError;
pub use crate::extract::{ExtractionResult, Extractor, PageExtraction};
pub use crate::field::FieldKind;
pub use crate::score::ScoredCandidate;
