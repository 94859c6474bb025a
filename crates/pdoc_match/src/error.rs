use thiserror::Error;

/// Errors from the matching layer.
///
/// Matching before a registry is loaded is a usage error and fails fast;
/// an extracted field being absent is not an error at all — that lookup is
/// simply skipped.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("no property registry loaded")]
    RegistryNotLoaded,

    #[error("invalid match config: {0}")]
    InvalidConfig(String),

    #[error("failed to read registry {path}: {source}")]
    RegistryRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry {path}: {message}")]
    RegistryParse { path: String, message: String },

    #[error("registry {path} has no `property_id` column")]
    MissingPropertyId { path: String },
}
