//! Validation pipeline: resolve rules, evaluate, record the outcome and render.

use std::path::PathBuf;

use alvara_core::Rule;
use alvara_report::{ValidationReport, render_pdf, render_text};
use alvara_store::{
    LegislationStore, ProcessStore, RuleScope, StoreError, Validation, record_outcome,
    validate_process,
};
use anyhow::Context;
use chrono::Utc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Restrict to these legislations; empty means every legislation applicable
    /// to the process's land use.
    pub legislations: Vec<String>,
    pub dry_run: bool,
    pub json: bool,
    pub pdf: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ValidateOutcome {
    pub validation: Validation,
    pub legislations: Vec<String>,
    pub recorded: bool,
    /// Rendered text or JSON, ready for stdout.
    pub output: String,
}

pub fn run_validate<S>(
    store: &mut S,
    number: &str,
    opts: &ValidateOptions,
) -> anyhow::Result<ValidateOutcome>
where
    S: ProcessStore + LegislationStore,
{
    let scope = if opts.legislations.is_empty() {
        RuleScope::LandUse
    } else {
        RuleScope::Legislations(opts.legislations.clone())
    };

    let validation = validate_process(&*store, &*store, number, &scope)
        .with_context(|| format!("validating process {number}"))?;
    let legislations = applied_legislations(&*store, &scope, &validation.rules)?;

    let recorded = !opts.dry_run;
    let report = ValidationReport::new(&validation.process, &validation.evaluation, Utc::now())
        .with_legislations(legislations.iter().cloned());

    if let Some(path) = &opts.pdf {
        let bytes = render_pdf(&report).context("rendering PDF report")?;
        std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), bytes = bytes.len(), "wrote PDF report");
    }

    let output = if opts.json {
        let doc = serde_json::json!({
            "process": validation.process.number,
            "legislations": legislations,
            "recorded": recorded,
            "status": validation.evaluation.status.label(),
            "verdicts": validation.evaluation.verdicts,
        });
        serde_json::to_string_pretty(&doc).context("serialising evaluation")?
    } else {
        render_text(&report)
    };

    // Status changes only once every output has been produced.
    if recorded {
        record_outcome(store, number, &validation.evaluation)
            .with_context(|| format!("recording status of process {number}"))?;
    }

    Ok(ValidateOutcome {
        validation,
        legislations,
        recorded,
        output,
    })
}

/// Names of the legislations whose rules were evaluated, in rule order.
fn applied_legislations<L: LegislationStore + ?Sized>(
    store: &L,
    scope: &RuleScope,
    rules: &[Rule],
) -> Result<Vec<String>, StoreError> {
    match scope {
        RuleScope::Legislations(names) => {
            let mut unique: Vec<String> = Vec::new();
            for name in names {
                if !unique.contains(name) {
                    unique.push(name.clone());
                }
            }
            Ok(unique)
        }
        RuleScope::LandUse => {
            let all = store.legislations()?;
            let mut names: Vec<String> = Vec::new();
            for rule in rules {
                if let Some(l) = all.iter().find(|l| l.id == rule.legislation_id) {
                    if !names.contains(&l.name) {
                        names.push(l.name.clone());
                    }
                }
            }
            Ok(names)
        }
    }
}

#[cfg(test)]
mod tests {
    use alvara_core::{NewLegislation, NewProcess, NewRule, Operator, ProcessField, ProcessStatus};
    use alvara_report::inspect_pdf;
    use alvara_store::MemoryStore;

    use super::*;

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .create_process(
                NewProcess::new("2024/0200", "Paulo Nunes", "Eng. Rita Dias", "residencial", 320.0)
                    .with_attribute(ProcessField::Height, 14.0),
            )
            .unwrap();
        store
            .create_legislation(NewLegislation::new("Código de Obras", "Lei 1.234/2010"))
            .unwrap();
        store
            .create_legislation(NewLegislation::new("Zona Residencial", "").for_land_use("residencial"))
            .unwrap();
        store
            .add_rule(
                "Código de Obras",
                NewRule::new("Art. 3", ProcessField::TotalArea, Operator::GreaterOrEqual, 60.0),
            )
            .unwrap();
        store
            .add_rule(
                "Zona Residencial",
                NewRule::new("Art. 8", ProcessField::Height, Operator::LessOrEqual, 12.0)
                    .with_message("{article}: altura de {value} m excede {reference} m"),
            )
            .unwrap();
        store
    }

    #[test]
    fn records_outcome_unless_dry_run() {
        let mut store = seeded();
        let opts = ValidateOptions {
            dry_run: true,
            ..Default::default()
        };
        let outcome = run_validate(&mut store, "2024/0200", &opts).unwrap();
        assert!(!outcome.recorded);
        assert_eq!(outcome.validation.evaluation.status, ProcessStatus::Rejected);
        assert_eq!(store.process("2024/0200").unwrap().status, ProcessStatus::UnderReview);

        run_validate(&mut store, "2024/0200", &ValidateOptions::default()).unwrap();
        assert_eq!(store.process("2024/0200").unwrap().status, ProcessStatus::Rejected);
    }

    #[test]
    fn land_use_scope_names_contributing_legislations() {
        let mut store = seeded();
        let outcome = run_validate(&mut store, "2024/0200", &ValidateOptions::default()).unwrap();
        assert_eq!(outcome.legislations, vec!["Código de Obras", "Zona Residencial"]);
        assert!(outcome.output.contains("Art. 8: altura de 14 m excede 12 m"));
        assert!(outcome.output.contains("Legislação aplicada: Código de Obras, Zona Residencial"));
    }

    #[test]
    fn json_output_lists_verdicts() {
        let mut store = seeded();
        let opts = ValidateOptions {
            legislations: vec!["Código de Obras".into()],
            json: true,
            ..Default::default()
        };
        let outcome = run_validate(&mut store, "2024/0200", &opts).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&outcome.output).unwrap();
        assert_eq!(doc["status"], "Aprovado");
        assert_eq!(doc["recorded"], true);
        assert_eq!(doc["verdicts"].as_array().unwrap().len(), 1);
        assert_eq!(doc["verdicts"][0]["article"], "Art. 3");
    }

    #[test]
    fn writes_pdf_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relatorio.pdf");
        let mut store = seeded();
        let opts = ValidateOptions {
            pdf: Some(path.clone()),
            dry_run: true,
            ..Default::default()
        };
        run_validate(&mut store, "2024/0200", &opts).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(inspect_pdf(&bytes).unwrap().page_count >= 1);
    }

    #[test]
    fn failed_pdf_write_leaves_status_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ausente").join("relatorio.pdf");
        let mut store = seeded();
        let opts = ValidateOptions {
            pdf: Some(path.clone()),
            ..Default::default()
        };
        let err = run_validate(&mut store, "2024/0200", &opts).unwrap_err();
        assert!(err.to_string().contains("writing"));
        assert!(!path.exists());
        assert_eq!(store.process("2024/0200").unwrap().status, ProcessStatus::UnderReview);
    }

    #[test]
    fn repeated_legislation_listed_once() {
        let mut store = seeded();
        let opts = ValidateOptions {
            legislations: vec!["Código de Obras".into(), "Código de Obras".into()],
            json: true,
            dry_run: true,
            ..Default::default()
        };
        let outcome = run_validate(&mut store, "2024/0200", &opts).unwrap();
        assert_eq!(outcome.legislations, vec!["Código de Obras"]);
        assert_eq!(outcome.validation.evaluation.verdicts.len(), 1);
        let doc: serde_json::Value = serde_json::from_str(&outcome.output).unwrap();
        assert_eq!(doc["verdicts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn unknown_legislation_leaves_status_untouched() {
        let mut store = seeded();
        let opts = ValidateOptions {
            legislations: vec!["Lei Inexistente".into()],
            ..Default::default()
        };
        let err = run_validate(&mut store, "2024/0200", &opts).unwrap_err();
        let store_err = err.downcast_ref::<StoreError>().unwrap();
        assert!(store_err.is_not_found());
        assert_eq!(store.process("2024/0200").unwrap().status, ProcessStatus::UnderReview);
    }
}
