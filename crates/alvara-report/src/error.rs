use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("not a PDF file: {0}")]
    NotAPdf(String),

    #[error("failed to parse PDF: {0}")]
    Parse(String),

    #[error("PDF has no pages")]
    NoPages,

    #[error("failed to render PDF: {0}")]
    Render(String),
}
