//! In-process store backed by vectors kept in insertion order.

use alvara_core::{
    Attachment, AttachmentKind, AttachmentMeta, Legislation, NewAttachment, NewLegislation,
    NewProcess, NewRule, Process, ProcessStatus, Rule,
};
use chrono::Utc;
use tracing::info;

use crate::{CascadeSummary, LegislationStore, ProcessStore, StoreError};

/// Ephemeral store implementing both store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    processes: Vec<Process>,
    legislations: Vec<Legislation>,
    rules: Vec<Rule>,
    attachments: Vec<Attachment>,
    last_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn process_mut(&mut self, number: &str) -> Result<&mut Process, StoreError> {
        let number = number.trim();
        self.processes
            .iter_mut()
            .find(|p| p.number == number)
            .ok_or_else(|| StoreError::not_found("process", number))
    }

    fn attachments_of(&self, kind: AttachmentKind, owner_id: i64) -> Vec<AttachmentMeta> {
        self.attachments
            .iter()
            .filter(|a| a.kind == kind && a.owner_id == owner_id)
            .map(Attachment::meta)
            .collect()
    }

    fn attachment(&self, kind: AttachmentKind, id: i64) -> Result<Attachment, StoreError> {
        self.attachments
            .iter()
            .find(|a| a.kind == kind && a.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("attachment", id))
    }

    fn store_attachment(
        &mut self,
        kind: AttachmentKind,
        owner_id: i64,
        doc_type: Option<String>,
        upload: NewAttachment,
    ) -> Result<AttachmentMeta, StoreError> {
        upload.validate()?;
        let attachment = Attachment {
            id: self.next_id(),
            kind,
            owner_id,
            filename: upload.filename,
            doc_type,
            uploaded_at: Utc::now(),
            content: upload.content,
        };
        let meta = attachment.meta();
        info!(id = meta.id, %kind, owner_id, size = meta.size, "stored attachment");
        self.attachments.push(attachment);
        Ok(meta)
    }
}

impl ProcessStore for MemoryStore {
    fn create_process(&mut self, submission: NewProcess) -> Result<Process, StoreError> {
        submission.validate()?;
        let number = submission.number.trim();
        if self.processes.iter().any(|p| p.number == number) {
            return Err(StoreError::duplicate("process", number));
        }
        let id = self.next_id();
        let process = submission.into_process(id, Utc::now())?;
        info!(number = %process.number, id, "registered process");
        self.processes.push(process.clone());
        Ok(process)
    }

    fn process(&self, number: &str) -> Result<Process, StoreError> {
        let number = number.trim();
        self.processes
            .iter()
            .find(|p| p.number == number)
            .cloned()
            .ok_or_else(|| StoreError::not_found("process", number))
    }

    fn processes(&self) -> Result<Vec<Process>, StoreError> {
        Ok(self.processes.clone())
    }

    fn set_status(&mut self, number: &str, status: ProcessStatus) -> Result<Process, StoreError> {
        let process = self.process_mut(number)?;
        info!(number = %process.number, from = %process.status, to = %status, "status changed");
        process.status = status;
        Ok(process.clone())
    }

    fn assign_analyst(&mut self, number: &str, analyst: &str) -> Result<Process, StoreError> {
        if analyst.trim().is_empty() {
            return Err(alvara_core::DomainError::Empty("analyst").into());
        }
        let process = self.process_mut(number)?;
        process.analyst = Some(analyst.trim().to_string());
        Ok(process.clone())
    }

    fn attach_project_pdf(
        &mut self,
        number: &str,
        doc_type: &str,
        upload: NewAttachment,
    ) -> Result<AttachmentMeta, StoreError> {
        if doc_type.trim().is_empty() {
            return Err(alvara_core::DomainError::Empty("document type").into());
        }
        let owner = self.process(number)?.id;
        self.store_attachment(
            AttachmentKind::Project,
            owner,
            Some(doc_type.trim().to_string()),
            upload,
        )
    }

    fn project_pdfs(&self, number: &str) -> Result<Vec<AttachmentMeta>, StoreError> {
        let owner = self.process(number)?.id;
        Ok(self.attachments_of(AttachmentKind::Project, owner))
    }

    fn project_pdf(&self, id: i64) -> Result<Attachment, StoreError> {
        self.attachment(AttachmentKind::Project, id)
    }
}

impl LegislationStore for MemoryStore {
    fn create_legislation(&mut self, legislation: NewLegislation) -> Result<Legislation, StoreError> {
        legislation.validate()?;
        let name = legislation.name.trim();
        if self.legislations.iter().any(|l| l.name == name) {
            return Err(StoreError::duplicate("legislation", name));
        }
        let id = self.next_id();
        let legislation = legislation.into_legislation(id, Utc::now())?;
        info!(name = %legislation.name, id, "registered legislation");
        self.legislations.push(legislation.clone());
        Ok(legislation)
    }

    fn legislation(&self, name: &str) -> Result<Legislation, StoreError> {
        let name = name.trim();
        self.legislations
            .iter()
            .find(|l| l.name == name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("legislation", name))
    }

    fn legislations(&self) -> Result<Vec<Legislation>, StoreError> {
        Ok(self.legislations.clone())
    }

    fn delete_legislation(&mut self, name: &str) -> Result<CascadeSummary, StoreError> {
        let id = self.legislation(name)?.id;

        let rules_before = self.rules.len();
        self.rules.retain(|r| r.legislation_id != id);
        let pdfs_before = self.attachments.len();
        self.attachments
            .retain(|a| !(a.kind == AttachmentKind::Legislation && a.owner_id == id));
        self.legislations.retain(|l| l.id != id);

        let summary = CascadeSummary {
            rules: rules_before - self.rules.len(),
            pdfs: pdfs_before - self.attachments.len(),
        };
        info!(name, rules = summary.rules, pdfs = summary.pdfs, "deleted legislation");
        Ok(summary)
    }

    fn add_rule(&mut self, legislation: &str, rule: NewRule) -> Result<Rule, StoreError> {
        rule.validate()?;
        let legislation_id = self.legislation(legislation)?.id;
        let id = self.next_id();
        let rule = rule.into_rule(id, legislation_id)?;
        info!(legislation, id, field = %rule.field, op = %rule.operator, "added rule");
        self.rules.push(rule.clone());
        Ok(rule)
    }

    fn rules(&self, legislation: &str) -> Result<Vec<Rule>, StoreError> {
        let id = self.legislation(legislation)?.id;
        Ok(self
            .rules
            .iter()
            .filter(|r| r.legislation_id == id)
            .cloned()
            .collect())
    }

    fn rules_for_land_use(&self, land_use: &str) -> Result<Vec<Rule>, StoreError> {
        let applicable: Vec<i64> = self
            .legislations
            .iter()
            .filter(|l| l.applies_to(land_use))
            .map(|l| l.id)
            .collect();
        Ok(self
            .rules
            .iter()
            .filter(|r| applicable.contains(&r.legislation_id))
            .cloned()
            .collect())
    }

    fn delete_rule(&mut self, id: i64) -> Result<(), StoreError> {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        if self.rules.len() == before {
            return Err(StoreError::not_found("rule", id));
        }
        info!(id, "deleted rule");
        Ok(())
    }

    fn attach_legislation_pdf(
        &mut self,
        legislation: &str,
        upload: NewAttachment,
    ) -> Result<AttachmentMeta, StoreError> {
        let owner = self.legislation(legislation)?.id;
        self.store_attachment(AttachmentKind::Legislation, owner, None, upload)
    }

    fn legislation_pdfs(&self, legislation: &str) -> Result<Vec<AttachmentMeta>, StoreError> {
        let owner = self.legislation(legislation)?.id;
        Ok(self.attachments_of(AttachmentKind::Legislation, owner))
    }

    fn legislation_pdf(&self, id: i64) -> Result<Attachment, StoreError> {
        self.attachment(AttachmentKind::Legislation, id)
    }
}
