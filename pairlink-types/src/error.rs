//! Error types for wire decoding.

/// Errors produced while decoding one wire record.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The line is not valid JSON.
    #[error("invalid JSON record: {0}")]
    Json(#[from] serde_json::Error),

    /// The record is not a JSON object.
    #[error("record is not a JSON object")]
    NotAnObject,

    /// The record carries no string `type` field.
    #[error("record has no `type` field")]
    MissingType,

    /// A required field is absent, empty, or has the wrong shape.
    #[error("`{kind}` record is missing required field `{field}`")]
    MissingField {
        /// The declared record type.
        kind: String,
        /// The field that was expected.
        field: &'static str,
    },
}
