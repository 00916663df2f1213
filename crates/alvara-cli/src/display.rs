//! Terminal display for processes, legislations, rules and attachments.
//!
//! The process card renders a single-row RecordBatch grouped into sections,
//! skipping any section whose columns are all null.

use alvara_core::{AttachmentMeta, Legislation, Rule};
use arrow::array::{Array, LargeStringArray, StringArray};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};

// ── Schema section groupings ──

const IDENTITY: &[&str] = &["numero", "requerente", "responsavel_tecnico", "analista", "uso"];

const ATTRIBUTES: &[&str] = &[
    "area_total",
    "area_terreno",
    "altura",
    "pavimentos",
    "vagas",
    "recuo_frontal",
];

const STATUS: &[&str] = &["status"];

const DATES: &[&str] = &["data_protocolo", "data_cadastro"];

// ── Process card ──

/// Print a single process row as a vertical card.
pub fn print_process_card(batch: &RecordBatch) -> anyhow::Result<()> {
    anyhow::ensure!(batch.num_rows() > 0, "empty process batch");
    let number = get_utf8(batch, "numero").unwrap_or_default();
    let requester = get_utf8(batch, "requerente").unwrap_or_default();

    println!("=== Processo {number} ===");
    if !requester.is_empty() {
        println!("{requester}");
    }
    println!();

    for (header, cols) in [
        ("Identificação", IDENTITY),
        ("Atributos", ATTRIBUTES),
        ("Situação", STATUS),
        ("Datas", DATES),
    ] {
        print!("{}", format_section(batch, header, cols));
    }
    Ok(())
}

/// Render one card section; empty when every column is null or missing.
fn format_section(batch: &RecordBatch, header: &str, cols: &[&str]) -> String {
    let schema = batch.schema();
    let present: Vec<(&str, usize)> = cols
        .iter()
        .filter_map(|&name| schema.index_of(name).ok().map(|i| (name, i)))
        .filter(|&(_, i)| !batch.column(i).is_null(0))
        .collect();
    if present.is_empty() {
        return String::new();
    }

    let mut out = format!("{header}\n");
    let options = FormatOptions::default();
    for (name, idx) in present {
        let col = batch.column(idx);
        let value = match col_str(col.as_ref(), 0) {
            Some(s) => s.to_string(),
            None => match ArrayFormatter::try_new(col.as_ref(), &options) {
                Ok(fmt) => fmt.value(0).to_string(),
                Err(_) => format!("({})", col.data_type()),
            },
        };
        out.push_str(&format!("  {:<26} {}\n", name, value));
    }
    out.push('\n');
    out
}

// ── Lists ──

pub fn print_legislations(legislations: &[Legislation]) {
    if legislations.is_empty() {
        println!("Nenhuma legislação cadastrada.");
        return;
    }
    for l in legislations {
        let scope = l.land_use.as_deref().unwrap_or("todos os usos");
        println!("  {:<32} [{}] {}", l.name, scope, l.description);
    }
}

pub fn print_legislation(legislation: &Legislation, rules: &[Rule], pdfs: &[AttachmentMeta]) {
    println!("=== {} ===", legislation.name);
    if !legislation.description.is_empty() {
        println!("{}", legislation.description);
    }
    println!();
    println!(
        "  {:<26} {}",
        "uso",
        legislation.land_use.as_deref().unwrap_or("todos os usos")
    );
    println!("  {:<26} {}", "data_criacao", legislation.created_at.to_rfc3339());
    println!();
    println!("Regras ({})", rules.len());
    print_rules(rules);
    println!();
    println!("Anexos ({})", pdfs.len());
    print_attachments(pdfs);
}

pub fn print_rules(rules: &[Rule]) {
    for r in rules {
        println!(
            "  #{:<5} {:<12} {} {} {}",
            r.id, r.article, r.field, r.operator, r.reference
        );
        if !r.description.is_empty() {
            println!("         {}", r.description);
        }
    }
}

pub fn print_attachments(attachments: &[AttachmentMeta]) {
    for a in attachments {
        let doc_type = a.doc_type.as_deref().unwrap_or("-");
        println!(
            "  #{:<5} {:<32} {:<20} {:>10} bytes  {}",
            a.id,
            a.filename,
            doc_type,
            a.size,
            a.uploaded_at.format("%Y-%m-%d %H:%M")
        );
    }
}

// ── Helpers ──

fn get_utf8(batch: &RecordBatch, col_name: &str) -> Option<String> {
    let idx = batch.schema().index_of(col_name).ok()?;
    col_str(batch.column(idx).as_ref(), 0).map(str::to_string)
}

/// Get a string value from a column that might be Utf8 or LargeUtf8.
fn col_str(col: &dyn Array, i: usize) -> Option<&str> {
    if col.is_null(i) {
        return None;
    }
    if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
        return Some(arr.value(i));
    }
    if let Some(arr) = col.as_any().downcast_ref::<LargeStringArray>() {
        return Some(arr.value(i));
    }
    None
}
