//! Legislations and the numeric rules extracted from them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::process::non_empty;
use crate::{DomainError, ProcessField};

/// A named legislative document owning compliance rules and reference PDFs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legislation {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Land-use category this legislation is restricted to. `None` applies
    /// to every process.
    pub land_use: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Legislation {
    /// Whether this legislation governs processes of the given land use.
    pub fn applies_to(&self, land_use: &str) -> bool {
        match &self.land_use {
            None => true,
            Some(uso) => uso.trim().to_lowercase() == land_use.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLegislation {
    pub name: String,
    pub description: String,
    pub land_use: Option<String>,
}

impl NewLegislation {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            land_use: None,
        }
    }

    pub fn for_land_use(mut self, land_use: impl Into<String>) -> Self {
        self.land_use = Some(land_use.into());
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        non_empty(&self.name, "legislation name")
    }

    pub fn into_legislation(self, id: i64, created_at: DateTime<Utc>) -> Result<Legislation, DomainError> {
        self.validate()?;
        Ok(Legislation {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            land_use: self
                .land_use
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            created_at,
        })
    }
}

// ── Operators ──

/// Comparison applied between a process attribute and a rule's reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Self::Equals,
        Self::NotEquals,
        Self::GreaterThan,
        Self::GreaterOrEqual,
        Self::LessThan,
        Self::LessOrEqual,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not-equals",
            Self::GreaterThan => "greater-than",
            Self::GreaterOrEqual => "greater-or-equal",
            Self::LessThan => "less-than",
            Self::LessOrEqual => "less-or-equal",
        }
    }

    /// Symbol form, also the persisted representation.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
        }
    }

    /// Exact IEEE-754 comparison of `value` against `reference`. No tolerance
    /// is applied, so `equals` on computed reals is brittle.
    pub fn apply(self, value: f64, reference: f64) -> bool {
        match self {
            Self::Equals => value == reference,
            Self::NotEquals => value != reference,
            Self::GreaterThan => value > reference,
            Self::GreaterOrEqual => value >= reference,
            Self::LessThan => value < reference,
            Self::LessOrEqual => value <= reference,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = DomainError;

    /// Accepts names ("greater-or-equal", "greater_or_equal") and symbols
    /// (">=", "=", "<>").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        let op = match key.as_str() {
            "==" | "=" => Self::Equals,
            "!=" | "<>" => Self::NotEquals,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterOrEqual,
            "<" => Self::LessThan,
            "<=" => Self::LessOrEqual,
            name => Self::ALL
                .into_iter()
                .find(|op| op.name() == name)
                .ok_or_else(|| DomainError::UnknownOperator(s.to_string()))?,
        };
        Ok(op)
    }
}

// ── Rules ──

/// A numeric constraint taken from an article of a legislation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub legislation_id: i64,
    /// Article reference, e.g. "Art. 12, §2º".
    pub article: String,
    pub description: String,
    pub field: ProcessField,
    pub operator: Operator,
    pub reference: f64,
    /// Message shown on violation. May contain `{field}`, `{value}`,
    /// `{operator}`, `{reference}` and `{article}`.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub article: String,
    pub description: String,
    pub field: ProcessField,
    pub operator: Operator,
    pub reference: f64,
    pub message: String,
}

impl NewRule {
    pub fn new(
        article: impl Into<String>,
        field: ProcessField,
        operator: Operator,
        reference: f64,
    ) -> Self {
        Self {
            article: article.into(),
            description: String::new(),
            field,
            operator,
            reference,
            message: String::new(),
        }
    }

    /// Build from untyped input, rejecting unknown field and operator names.
    pub fn parse(
        article: &str,
        description: &str,
        field: &str,
        operator: &str,
        reference: f64,
        message: &str,
    ) -> Result<Self, DomainError> {
        let rule = Self {
            article: article.to_string(),
            description: description.to_string(),
            field: field.parse()?,
            operator: operator.parse()?,
            reference,
            message: message.to_string(),
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        non_empty(&self.article, "rule article")?;
        if !self.reference.is_finite() {
            return Err(DomainError::InvalidReference(self.reference));
        }
        Ok(())
    }

    pub fn into_rule(self, id: i64, legislation_id: i64) -> Result<Rule, DomainError> {
        self.validate()?;
        Ok(Rule {
            id,
            legislation_id,
            article: self.article.trim().to_string(),
            description: self.description,
            field: self.field,
            operator: self.operator,
            reference: self.reference,
            message: self.message,
        })
    }
}
