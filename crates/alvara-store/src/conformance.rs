//! Behaviour every store implementation must share. Each backend's test
//! module calls these against a fresh store.

use alvara_core::{
    AttachmentKind, DomainError, NewAttachment, NewLegislation, NewProcess, NewRule, Operator,
    ProcessField, ProcessStatus,
};
use pretty_assertions::assert_eq;

use crate::{LegislationStore, ProcessStore, StoreError};

pub(crate) fn submission(number: &str) -> NewProcess {
    NewProcess::new(number, "Maria Souza", "Eng. Carlos Lima", "residencial", 180.5)
        .with_attribute(ProcessField::Height, 7.2)
}

fn pdf_bytes(tag: &str) -> Vec<u8> {
    format!("%PDF-1.7\n% {tag}\n%%EOF\n").into_bytes()
}

pub(crate) fn process_lifecycle<S: ProcessStore>(store: &mut S) {
    let created = store.create_process(submission("2024/0001")).unwrap();
    assert_eq!(created.status, ProcessStatus::UnderReview);
    assert_eq!(created.height, Some(7.2));
    assert_eq!(created.analyst, None);

    let fetched = store.process("2024/0001").unwrap();
    assert_eq!(fetched, created);

    let updated = store.set_status("2024/0001", ProcessStatus::Approved).unwrap();
    assert_eq!(updated.status, ProcessStatus::Approved);
    assert_eq!(store.process("2024/0001").unwrap().status, ProcessStatus::Approved);

    let assigned = store.assign_analyst("2024/0001", "Ana Pereira").unwrap();
    assert_eq!(assigned.analyst.as_deref(), Some("Ana Pereira"));

    store.create_process(submission("2024/0002")).unwrap();
    let numbers: Vec<String> = store
        .processes()
        .unwrap()
        .into_iter()
        .map(|p| p.number)
        .collect();
    assert_eq!(numbers, vec!["2024/0001", "2024/0002"]);
}

pub(crate) fn duplicate_process_rejected<S: ProcessStore>(store: &mut S) {
    store.create_process(submission("2024/0001")).unwrap();
    let err = store.create_process(submission("2024/0001")).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { entity: "process", .. }));
    assert_eq!(store.processes().unwrap().len(), 1);
}

pub(crate) fn invalid_submission_rejected<S: ProcessStore>(store: &mut S) {
    let bad = submission("2024/0003").with_attribute(ProcessField::TotalArea, 0.0);
    let err = store.create_process(bad).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::InvalidAttribute { field: "area_total", .. })
    ));
    assert!(store.process("2024/0003").unwrap_err().is_not_found());
}

pub(crate) fn rule_roundtrip_is_exact<S: LegislationStore>(store: &mut S) {
    store
        .create_legislation(NewLegislation::new("Código de Obras", "Lei Complementar 12/2019"))
        .unwrap();
    // Not representable in decimal; must survive storage bit for bit.
    let reference = 0.1 + 0.2;
    let created = store
        .add_rule(
            "Código de Obras",
            NewRule::new("Art. 5", ProcessField::TotalArea, Operator::GreaterOrEqual, reference)
                .with_description("Área mínima")
                .with_message("Área de {value} m² abaixo do mínimo de {reference} m²"),
        )
        .unwrap();

    let rules = store.rules("Código de Obras").unwrap();
    assert_eq!(rules.len(), 1);
    let read = &rules[0];
    assert_eq!(read, &created);
    assert_eq!(read.operator, Operator::GreaterOrEqual);
    assert_eq!(read.field, ProcessField::TotalArea);
    assert_eq!(read.reference.to_bits(), reference.to_bits());
}

pub(crate) fn rules_keep_insertion_order<S: LegislationStore>(store: &mut S) {
    store.create_legislation(NewLegislation::new("A", "")).unwrap();
    store.create_legislation(NewLegislation::new("B", "")).unwrap();
    let first = store
        .add_rule("B", NewRule::new("Art. 9", ProcessField::Floors, Operator::LessOrEqual, 4.0))
        .unwrap();
    let second = store
        .add_rule("A", NewRule::new("Art. 1", ProcessField::Height, Operator::LessThan, 12.0))
        .unwrap();
    let third = store
        .add_rule("B", NewRule::new("Art. 2", ProcessField::TotalArea, Operator::GreaterThan, 1.0))
        .unwrap();

    let ids: Vec<i64> = store.rules("B").unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id, third.id]);

    let all: Vec<i64> = store
        .rules_for_land_use("residencial")
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(all, vec![first.id, second.id, third.id]);
}

pub(crate) fn rules_for_land_use_filters_legislations<S: LegislationStore>(store: &mut S) {
    store.create_legislation(NewLegislation::new("Geral", "")).unwrap();
    store
        .create_legislation(NewLegislation::new("Residencial", "").for_land_use("Residencial"))
        .unwrap();
    store
        .create_legislation(NewLegislation::new("Comercial", "").for_land_use("comercial"))
        .unwrap();
    let general = store
        .add_rule("Geral", NewRule::new("Art. 1", ProcessField::TotalArea, Operator::GreaterThan, 0.0))
        .unwrap();
    let residential = store
        .add_rule("Residencial", NewRule::new("Art. 2", ProcessField::Floors, Operator::LessOrEqual, 3.0))
        .unwrap();
    store
        .add_rule("Comercial", NewRule::new("Art. 3", ProcessField::ParkingSpaces, Operator::GreaterOrEqual, 10.0))
        .unwrap();

    let ids: Vec<i64> = store
        .rules_for_land_use("residencial")
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![general.id, residential.id]);
    assert_eq!(store.rules_for_land_use("industrial").unwrap().len(), 1);
}

pub(crate) fn delete_legislation_cascades<S: LegislationStore>(store: &mut S) {
    store.create_legislation(NewLegislation::new("Plano Diretor", "")).unwrap();
    store.create_legislation(NewLegislation::new("Código de Posturas", "")).unwrap();
    store
        .add_rule("Plano Diretor", NewRule::new("Art. 1", ProcessField::Height, Operator::LessOrEqual, 15.0))
        .unwrap();
    store
        .add_rule("Plano Diretor", NewRule::new("Art. 2", ProcessField::Floors, Operator::LessOrEqual, 5.0))
        .unwrap();
    let kept = store
        .add_rule("Código de Posturas", NewRule::new("Art. 7", ProcessField::FrontSetback, Operator::GreaterOrEqual, 4.0))
        .unwrap();
    let pdf = store
        .attach_legislation_pdf("Plano Diretor", NewAttachment::new("plano.pdf", pdf_bytes("plano")))
        .unwrap();

    let summary = store.delete_legislation("Plano Diretor").unwrap();
    assert_eq!(summary.rules, 2);
    assert_eq!(summary.pdfs, 1);

    assert!(store.legislation("Plano Diretor").unwrap_err().is_not_found());
    assert!(store.legislation_pdf(pdf.id).unwrap_err().is_not_found());
    assert_eq!(store.rules("Código de Posturas").unwrap(), vec![kept]);
    assert_eq!(store.legislations().unwrap().len(), 1);
}

pub(crate) fn delete_rule<S: LegislationStore>(store: &mut S) {
    store.create_legislation(NewLegislation::new("Lei 1", "")).unwrap();
    let rule = store
        .add_rule("Lei 1", NewRule::new("Art. 1", ProcessField::Height, Operator::LessOrEqual, 9.0))
        .unwrap();
    store.delete_rule(rule.id).unwrap();
    assert!(store.rules("Lei 1").unwrap().is_empty());
    assert!(store.delete_rule(rule.id).unwrap_err().is_not_found());
}

pub(crate) fn attachments_roundtrip<S: ProcessStore + LegislationStore>(store: &mut S) {
    store.create_process(submission("2024/0010")).unwrap();
    store.create_legislation(NewLegislation::new("NBR 9050", "Acessibilidade")).unwrap();

    let content = pdf_bytes("planta");
    let meta = store
        .attach_project_pdf("2024/0010", "planta baixa", NewAttachment::new("planta.pdf", content.clone()))
        .unwrap();
    assert_eq!(meta.kind, AttachmentKind::Project);
    assert_eq!(meta.size, content.len());
    assert_eq!(meta.doc_type.as_deref(), Some("planta baixa"));

    let listed = store.project_pdfs("2024/0010").unwrap();
    assert_eq!(listed, vec![meta.clone()]);

    let fetched = store.project_pdf(meta.id).unwrap();
    assert_eq!(fetched.content, content);
    assert_eq!(fetched.filename, "planta.pdf");

    let leg = store
        .attach_legislation_pdf("NBR 9050", NewAttachment::new("nbr9050.pdf", pdf_bytes("nbr")))
        .unwrap();
    assert_eq!(leg.kind, AttachmentKind::Legislation);
    assert_eq!(leg.doc_type, None);
    assert_eq!(store.legislation_pdfs("NBR 9050").unwrap().len(), 1);

    // Ids are scoped by kind.
    assert!(store.legislation_pdf(meta.id).unwrap_err().is_not_found());

    let err = store
        .attach_project_pdf("2024/0010", " ", NewAttachment::new("x.pdf", pdf_bytes("x")))
        .unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::Empty("document type"))));
}

pub(crate) fn missing_parents_are_not_found<S: ProcessStore + LegislationStore>(store: &mut S) {
    assert!(store.process("nope").unwrap_err().is_not_found());
    assert!(store.set_status("nope", ProcessStatus::Rejected).unwrap_err().is_not_found());
    assert!(store.rules("nope").unwrap_err().is_not_found());
    assert!(store.delete_legislation("nope").unwrap_err().is_not_found());
    assert!(store
        .add_rule("nope", NewRule::new("Art. 1", ProcessField::Height, Operator::LessOrEqual, 1.0))
        .unwrap_err()
        .is_not_found());
    assert!(store
        .attach_project_pdf("nope", "memorial", NewAttachment::new("m.pdf", pdf_bytes("m")))
        .unwrap_err()
        .is_not_found());
}
