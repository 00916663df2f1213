//! Core domain for permit processing: processes, legislations, rules,
//! attachments, and the pure rule validation engine.

pub mod attachment;
pub mod error;
pub mod legislation;
pub mod process;
pub mod validation;

pub use attachment::{Attachment, AttachmentKind, AttachmentMeta, NewAttachment};
pub use error::DomainError;
pub use legislation::{Legislation, NewLegislation, NewRule, Operator, Rule};
pub use process::{NewProcess, NumericFields, Process, ProcessField, ProcessStatus};
pub use validation::{Evaluation, Verdict, VerdictKind, evaluate, evaluate_rule};
