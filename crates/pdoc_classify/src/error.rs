use thiserror::Error;

/// Errors from classifier state handling: rule compilation and persisted
/// artifact I/O. Classification itself never raises; load failures degrade
/// to the rules-only or fallback paths instead.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("invalid classifier config: {0}")]
    InvalidConfig(String),

    #[error("failed to read {what}: {source}")]
    Io {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rule pattern `{name}` does not compile: {source}")]
    BadRulePattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// Training failures. None of these touch the previously active model or
/// feature transform; the old artifact stays authoritative.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("training requires at least 2 samples, got {count}")]
    NotEnoughSamples { count: usize },

    #[error("samples contain no usable tokens; vocabulary is empty")]
    EmptyVocabulary,

    #[error("failed to persist trained model: {0}")]
    Persist(#[source] ClassifyError),
}
