//! Report generation for validation results.
//!
//! A [`ValidationReport`] is laid out once into styled [`Line`]s; the text
//! and PDF renderers only differ in how they typeset those lines.

mod error;
mod layout;
mod pdf;
mod text;

pub use error::ReportError;
pub use layout::{Line, LineStyle, ValidationReport};
pub use pdf::{PdfInfo, inspect_pdf, render_pdf};
pub use text::render_text;
