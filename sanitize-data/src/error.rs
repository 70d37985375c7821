//! Errors raised while building a sanitizer or converting input.
//!
//! Sanitizing itself never fails; these only come out of construction and
//! conversion helpers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SanitizerError {
    /// A configured `/pattern/` field entry is not a valid regular expression.
    #[error("invalid sensitive field pattern `{pattern}`: {source}")]
    InvalidFieldPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A value could not be converted into a payload tree.
    #[error("failed to convert value: {0}")]
    Serialization(#[from] serde_json::Error),
}
