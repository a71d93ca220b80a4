//! Error types for the receipt-scanner library.

use thiserror::Error;

/// Main error type for the scanning pipeline.
///
/// Every stage fails fast and surfaces its error unchanged to the caller;
/// no stage downgrades another stage's error into a default value. In
/// particular, financial-field failures are never coerced to zero or a
/// fallback currency.
#[derive(Error, Debug)]
pub enum ScanError {
    /// No template with the requested name exists in the store.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// A template placeholder has no matching key in the render context.
    #[error("template `{template}` references missing context key `{key}`")]
    MissingContextKey { template: String, key: String },

    /// A model identifier that the dispatch table does not know.
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// The LLM call failed at the transport or API level.
    #[error("LLM request failed: {0}")]
    UpstreamCallFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The model returned no choices, or only empty/whitespace content.
    #[error("model returned an empty response")]
    EmptyModelResponse,

    /// No decodable JSON object could be located in the raw model output.
    #[error("unparsable model response: {0}")]
    UnparsableResponse(String),

    /// A field was present but could not be coerced to its expected type.
    #[error("invalid value for field `{field}`: {value}")]
    InvalidFieldType { field: String, value: String },

    /// A date string matched none of the accepted formats.
    #[error("unrecognized date format: {0}")]
    InvalidDateFormat(String),

    /// A required field was absent from the extracted data.
    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    /// Staging the input bytes into object storage failed.
    #[error("failed to stage input for OCR: {0}")]
    StorageWriteFailed(String),

    /// The OCR service call itself errored.
    #[error("OCR service failed: {0}")]
    OcrServiceFailed(String),
}

impl ScanError {
    /// Wrap an upstream transport/API error without losing the cause.
    pub fn upstream<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ScanError::UpstreamCallFailed(Box::new(err))
    }

    /// Shorthand for an [`ScanError::InvalidFieldType`] with a displayable value.
    pub fn invalid_field(field: impl Into<String>, value: impl std::fmt::Display) -> Self {
        ScanError::InvalidFieldType {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

/// Result type for the receipt-scanner library.
pub type Result<T> = std::result::Result<T, ScanError>;
