use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, PresearchError>;

/// Errors surfaced by pattern parsing, configuration and presearch.
#[derive(Debug, Error)]
pub enum PresearchError {
    /// The pattern text could not be parsed into a pattern AST.
    #[error("malformed pattern {pattern:?} at byte {position}: {reason}")]
    MalformedPattern {
        pattern: String,
        position: usize,
        reason: &'static str,
    },

    /// The suffix marker occurs inside query or document text, so marked
    /// n-gram terms could collide with natural text.
    #[error("suffix marker {marker:?} found inside {context} text {text:?}")]
    MarkerCollision {
        marker: String,
        context: &'static str,
        text: String,
    },

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading the upstream token stream failed.
    #[error("token stream read failed: {0}")]
    Io(#[from] std::io::Error),

    /// A pattern could not be compiled for candidate verification.
    #[error("pattern cannot be verified: {0}")]
    Regex(#[from] regex::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PresearchError {
    pub(crate) fn malformed(pattern: &str, position: usize, reason: &'static str) -> Self {
        PresearchError::MalformedPattern {
            pattern: pattern.to_string(),
            position,
            reason,
        }
    }
}
