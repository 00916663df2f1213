//! Storage layer: process and legislation stores plus the validation workflow.
//!
//! Both stores are traits so the workflow can be exercised against
//! [`MemoryStore`] in tests and against [`DuckStore`] (feature `duckdb`) in
//! the CLI. Reads take `&self`; writes take `&mut self`, which serialises
//! writers at the type level.

mod error;
mod memory;
mod workflow;

#[cfg(test)]
mod conformance;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use workflow::{RuleScope, Validation, collect_rules, record_outcome, validate_process};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

use alvara_core::{
    Attachment, AttachmentMeta, Legislation, NewAttachment, NewLegislation, NewProcess, NewRule,
    Process, ProcessStatus, Rule,
};

/// Rows removed by a cascading legislation delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub rules: usize,
    pub pdfs: usize,
}

/// Persistence for permit applications and their project PDFs.
///
/// Processes are never deleted.
pub trait ProcessStore {
    /// Register a submission. Rejects duplicate process numbers.
    fn create_process(&mut self, submission: NewProcess) -> Result<Process, StoreError>;

    /// Look up a process by number. [`StoreError::NotFound`] if unregistered.
    fn process(&self, number: &str) -> Result<Process, StoreError>;

    /// All processes in registration order.
    fn processes(&self) -> Result<Vec<Process>, StoreError>;

    fn set_status(&mut self, number: &str, status: ProcessStatus) -> Result<Process, StoreError>;

    fn assign_analyst(&mut self, number: &str, analyst: &str) -> Result<Process, StoreError>;

    fn attach_project_pdf(
        &mut self,
        number: &str,
        doc_type: &str,
        upload: NewAttachment,
    ) -> Result<AttachmentMeta, StoreError>;

    /// Attachment metadata for a process, in upload order.
    fn project_pdfs(&self, number: &str) -> Result<Vec<AttachmentMeta>, StoreError>;

    fn project_pdf(&self, id: i64) -> Result<Attachment, StoreError>;
}

/// Persistence for legislations, their rules and reference PDFs.
pub trait LegislationStore {
    /// Register a legislation. Rejects duplicate names.
    fn create_legislation(&mut self, legislation: NewLegislation) -> Result<Legislation, StoreError>;

    fn legislation(&self, name: &str) -> Result<Legislation, StoreError>;

    /// All legislations in creation order.
    fn legislations(&self) -> Result<Vec<Legislation>, StoreError>;

    /// Delete a legislation together with its rules and PDFs.
    fn delete_legislation(&mut self, name: &str) -> Result<CascadeSummary, StoreError>;

    fn add_rule(&mut self, legislation: &str, rule: NewRule) -> Result<Rule, StoreError>;

    /// Rules of one legislation in insertion order.
    fn rules(&self, legislation: &str) -> Result<Vec<Rule>, StoreError>;

    /// Rules of every legislation applicable to `land_use`, in insertion order.
    fn rules_for_land_use(&self, land_use: &str) -> Result<Vec<Rule>, StoreError>;

    fn delete_rule(&mut self, id: i64) -> Result<(), StoreError>;

    fn attach_legislation_pdf(
        &mut self,
        legislation: &str,
        upload: NewAttachment,
    ) -> Result<AttachmentMeta, StoreError>;

    fn legislation_pdfs(&self, legislation: &str) -> Result<Vec<AttachmentMeta>, StoreError>;

    fn legislation_pdf(&self, id: i64) -> Result<Attachment, StoreError>;
}
