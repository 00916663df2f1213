//! PDF rendering and inspection with lopdf.
//!
//! Reports use the standard Helvetica faces, so nothing is embedded. Text is
//! written in WinAnsiEncoding, which covers Portuguese; characters outside it
//! are replaced with `?`.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

use crate::error::ReportError;
use crate::layout::{LineStyle, ValidationReport, wrap};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const FOOTER_Y: i64 = 30;
const BODY_CHARS: usize = 92;
const ITEM_INDENT: i64 = 12;

/// Basic facts about an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInfo {
    pub page_count: u32,
    /// Version from the header, e.g. "1.7".
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
}

/// Check that `bytes` is a parseable PDF with at least one page.
pub fn inspect_pdf(bytes: &[u8]) -> Result<PdfInfo, ReportError> {
    if bytes.len() < 8 || !bytes.starts_with(b"%PDF-") {
        return Err(ReportError::NotAPdf("missing %PDF- header".into()));
    }
    let version = std::str::from_utf8(&bytes[5..8])
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|_| "1.4".to_string());

    let document = Document::load_mem(bytes).map_err(|e| ReportError::Parse(e.to_string()))?;
    let page_count = document.get_pages().len() as u32;
    if page_count == 0 {
        return Err(ReportError::NoPages);
    }
    Ok(PdfInfo {
        page_count,
        version,
        encrypted: document.is_encrypted(),
        size_bytes: bytes.len(),
    })
}

#[derive(Debug, Clone, Copy)]
struct Face {
    font: &'static [u8],
    size: i64,
    leading: i64,
}

fn face(style: LineStyle) -> Face {
    match style {
        LineStyle::Title => Face { font: b"F2", size: 16, leading: 24 },
        LineStyle::Heading => Face { font: b"F2", size: 12, leading: 18 },
        LineStyle::Body | LineStyle::Item => Face { font: b"F1", size: 10, leading: 14 },
        LineStyle::Blank => Face { font: b"F1", size: 10, leading: 8 },
    }
}

/// A positioned run of text.
#[derive(Debug, Clone)]
struct Placed {
    face: Face,
    x: i64,
    y: i64,
    text: String,
}

/// Wrap and paginate the report lines.
fn paginate(report: &ValidationReport<'_>) -> Vec<Vec<Placed>> {
    let top = PAGE_HEIGHT - MARGIN;
    let bottom = FOOTER_Y + 2 * MARGIN / 3;
    let mut pages: Vec<Vec<Placed>> = vec![Vec::new()];
    let mut y = top;

    for line in report.lines() {
        let face = face(line.style);
        let (x, width) = match line.style {
            LineStyle::Item => (MARGIN + ITEM_INDENT, BODY_CHARS - 4),
            _ => (MARGIN, BODY_CHARS),
        };
        for (i, chunk) in wrap(&line.text, width).into_iter().enumerate() {
            if y - face.leading < bottom {
                pages.push(Vec::new());
                y = top;
            }
            y -= face.leading;
            // Continuation lines of an item hang under its text, past the dash.
            let x = if line.style == LineStyle::Item && i > 0 { x + 8 } else { x };
            if let Some(page) = pages.last_mut() {
                page.push(Placed { face, x, y, text: chunk });
            }
        }
    }
    pages
}

/// Map text to WinAnsiEncoding bytes.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' | '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            _ => b'?',
        })
        .collect()
}

fn show(ops: &mut Vec<Operation>, font: &[u8], size: i64, x: i64, y: i64, text: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(font.to_vec()), Object::Integer(size)],
    ));
    ops.push(Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(win_ansi(text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn font(base: &str) -> Dictionary {
    Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(base.as_bytes().to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ])
}

/// Render `report` as a PDF document.
pub fn render_pdf(report: &ValidationReport<'_>) -> Result<Vec<u8>, ReportError> {
    let pages = paginate(report);
    let total = pages.len();

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let regular = doc.add_object(font("Helvetica"));
    let bold = doc.add_object(font("Helvetica-Bold"));
    let resources = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![
            ("F1", Object::Reference(regular)),
            ("F2", Object::Reference(bold)),
        ])),
    )]));

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(total);
    for (n, placed) in pages.iter().enumerate() {
        let mut ops = Vec::new();
        for p in placed {
            show(&mut ops, p.face.font, p.face.size, p.x, p.y, &p.text);
        }
        let footer = format!("Página {} de {}", n + 1, total);
        show(&mut ops, b"F1", 8, PAGE_WIDTH - MARGIN - 60, FOOTER_Y, &footer);
        show(
            &mut ops,
            b"F1",
            8,
            MARGIN,
            FOOTER_Y,
            &format!("Processo {}", report.process.number),
        );

        let content = Content { operations: ops }
            .encode()
            .map_err(|e| ReportError::Render(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(PAGE_WIDTH),
                    Object::Integer(PAGE_HEIGHT),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(total as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
        ("Resources", Object::Reference(resources)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let info_id = doc.add_object(Dictionary::from_iter(vec![
        (
            "Title",
            Object::String(
                win_ansi(&format!("Relatório de validação {}", report.process.number)),
                StringFormat::Literal,
            ),
        ),
        ("Producer", Object::String(b"alvara".to_vec(), StringFormat::Literal)),
    ]));
    doc.trailer.set("Info", Object::Reference(info_id));

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ReportError::Render(e.to_string()))?;
    debug!(pages = total, bytes = out.len(), "rendered report");
    Ok(out)
}
