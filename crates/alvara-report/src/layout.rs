//! Renderer-independent report layout.

use alvara_core::{Evaluation, Process, VerdictKind};
use chrono::{DateTime, Utc};

/// Everything a report shows. Built from an existing evaluation; nothing is
/// re-evaluated here.
#[derive(Debug, Clone)]
pub struct ValidationReport<'a> {
    pub process: &'a Process,
    pub evaluation: &'a Evaluation,
    /// Legislations the rules were drawn from, for the header.
    pub legislations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Heading,
    Body,
    Item,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub style: LineStyle,
    pub text: String,
}

impl Line {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Self::new(LineStyle::Blank, "")
    }
}

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M UTC";

impl<'a> ValidationReport<'a> {
    pub fn new(process: &'a Process, evaluation: &'a Evaluation, generated_at: DateTime<Utc>) -> Self {
        Self {
            process,
            evaluation,
            legislations: Vec::new(),
            generated_at,
        }
    }

    pub fn with_legislations(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.legislations = names.into_iter().collect();
        self
    }

    /// Lay the report out as styled lines, unwrapped.
    pub fn lines(&self) -> Vec<Line> {
        let p = self.process;
        let eval = self.evaluation;
        let mut out = vec![
            Line::new(LineStyle::Title, "Relatório de Validação"),
            Line::blank(),
            Line::new(LineStyle::Body, format!("Processo: {}", p.number)),
            Line::new(LineStyle::Body, format!("Requerente: {}", p.requester)),
            Line::new(LineStyle::Body, format!("Responsável técnico: {}", p.technician)),
            Line::new(
                LineStyle::Body,
                format!("Analista: {}", p.analyst.as_deref().unwrap_or("não atribuído")),
            ),
            Line::new(LineStyle::Body, format!("Uso: {}", p.land_use)),
        ];
        for (field, value) in p.attributes() {
            out.push(Line::new(
                LineStyle::Body,
                format!("{}: {}", field.description(), value),
            ));
        }
        out.push(Line::new(
            LineStyle::Body,
            format!("Protocolo: {}", p.protocol_at.format(TIMESTAMP_FORMAT)),
        ));
        if !self.legislations.is_empty() {
            out.push(Line::new(
                LineStyle::Body,
                format!("Legislação aplicada: {}", self.legislations.join(", ")),
            ));
        }
        out.push(Line::new(
            LineStyle::Body,
            format!("Emitido em: {}", self.generated_at.format(TIMESTAMP_FORMAT)),
        ));
        out.push(Line::blank());

        out.push(Line::new(LineStyle::Heading, format!("Resultado: {}", eval.status)));
        if eval.verdicts.is_empty() {
            out.push(Line::new(
                LineStyle::Body,
                "Nenhuma regra aplicável ao processo.",
            ));
        } else {
            out.push(Line::new(
                LineStyle::Body,
                format!(
                    "{} regra(s) avaliada(s): {} atendida(s), {} violação(ões), {} erro(s) de configuração.",
                    eval.verdicts.len(),
                    eval.count(VerdictKind::Passed),
                    eval.count(VerdictKind::Violation),
                    eval.count(VerdictKind::ConfigurationError),
                ),
            ));
        }

        self.section(
            &mut out,
            VerdictKind::Violation,
            "Violações",
            Some("Exigem correção do projeto pelo requerente."),
        );
        self.section(
            &mut out,
            VerdictKind::ConfigurationError,
            "Erros de configuração",
            Some("Exigem revisão da regra ou dos dados cadastrados; não indicam descumprimento."),
        );
        self.section(&mut out, VerdictKind::Passed, "Regras atendidas", None);
        out
    }

    fn section(&self, out: &mut Vec<Line>, kind: VerdictKind, title: &str, note: Option<&str>) {
        let verdicts: Vec<_> = self.evaluation.of_kind(kind).collect();
        if verdicts.is_empty() {
            return;
        }
        out.push(Line::blank());
        out.push(Line::new(LineStyle::Heading, format!("{title} ({})", verdicts.len())));
        if let Some(note) = note {
            out.push(Line::new(LineStyle::Body, note));
        }
        for v in verdicts {
            out.push(Line::new(LineStyle::Item, format!("- {}", v.message)));
        }
    }
}

/// Greedy word wrap to at most `width` characters per line. Words longer
/// than `width` are split.
pub(crate) fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current.is_empty() {
            word.len()
        } else {
            current.chars().count() + 1 + word.len()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
