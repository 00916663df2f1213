//! Plain-text rendering, for terminals and logs.

use crate::layout::{LineStyle, ValidationReport};

/// Render `report` as plain text. Titles are uppercased and underlined,
/// headings underlined.
pub fn render_text(report: &ValidationReport<'_>) -> String {
    let mut out = String::new();
    for line in report.lines() {
        match line.style {
            LineStyle::Title => {
                let title = line.text.to_uppercase();
                out.push_str(&title);
                out.push('\n');
                out.push_str(&"=".repeat(title.chars().count()));
            }
            LineStyle::Heading => {
                out.push_str(&line.text);
                out.push('\n');
                out.push_str(&"-".repeat(line.text.chars().count()));
            }
            LineStyle::Item => {
                out.push_str("  ");
                out.push_str(&line.text);
            }
            LineStyle::Body | LineStyle::Blank => out.push_str(&line.text),
        }
        out.push('\n');
    }
    out
}
