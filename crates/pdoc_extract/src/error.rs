use thiserror::Error;

/// Errors raised while building an extractor.
///
/// Extraction itself never errors: a field with no candidates is a normal
/// outcome, and a missing canonical pattern only changes scoring.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("field `{field}` pattern does not compile: {source}")]
    BadPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
}
