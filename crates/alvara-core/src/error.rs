use thiserror::Error;

/// Errors raised when constructing or parsing domain values.
#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("unknown process field: {0:?}")]
    UnknownField(String),

    #[error("unknown comparison operator: {0:?}")]
    UnknownOperator(String),

    #[error("unknown process status: {0:?}")]
    UnknownStatus(String),

    #[error("unknown attachment kind: {0:?}")]
    UnknownAttachmentKind(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid value for {field}: {value}")]
    InvalidAttribute { field: &'static str, value: f64 },

    #[error("rule reference value must be finite, got {0}")]
    InvalidReference(f64),
}
