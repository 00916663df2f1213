//! PDF attachments owned by a legislation or a process.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DomainError;
use crate::process::non_empty;

/// Which parent an attachment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// Reference text of a legislation.
    Legislation,
    /// Project document submitted with a process.
    Project,
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Legislation => "legislation",
            Self::Project => "project",
        })
    }
}

impl FromStr for AttachmentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legislation" | "legislacao" | "legislação" => Ok(Self::Legislation),
            "project" | "projeto" | "processo" => Ok(Self::Project),
            _ => Err(DomainError::UnknownAttachmentKind(s.to_string())),
        }
    }
}

/// An uploaded file, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub filename: String,
    pub content: Vec<u8>,
}

impl NewAttachment {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        non_empty(&self.filename, "attachment filename")?;
        if self.content.is_empty() {
            return Err(DomainError::Empty("attachment content"));
        }
        Ok(())
    }
}

/// A stored attachment including its binary content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: i64,
    pub kind: AttachmentKind,
    /// Id of the owning legislation or process.
    pub owner_id: i64,
    pub filename: String,
    /// Document type tag, only set on project attachments.
    pub doc_type: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn meta(&self) -> AttachmentMeta {
        AttachmentMeta {
            id: self.id,
            kind: self.kind,
            owner_id: self.owner_id,
            filename: self.filename.clone(),
            doc_type: self.doc_type.clone(),
            size: self.content.len(),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Attachment listing entry, without content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub id: i64,
    pub kind: AttachmentKind,
    pub owner_id: i64,
    pub filename: String,
    pub doc_type: Option<String>,
    pub size: usize,
    pub uploaded_at: DateTime<Utc>,
}
