//! Permit applications ("processos") and their numeric attributes.
//!
//! Rules never look fields up by free-form name. The set of attributes a rule
//! may target is the closed [`ProcessField`] enum, and each variant maps to a
//! typed accessor on [`Process`]. Unknown names fail when the rule is built,
//! not when it is evaluated.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DomainError;

// ── Status ──

/// Lifecycle status of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStatus {
    #[serde(rename = "Em análise")]
    UnderReview,
    #[serde(rename = "Aprovado")]
    Approved,
    #[serde(rename = "Reprovado")]
    Rejected,
}

impl ProcessStatus {
    pub const ALL: [ProcessStatus; 3] = [Self::UnderReview, Self::Approved, Self::Rejected];

    /// The label shown to analysts and persisted in the store.
    pub fn label(self) -> &'static str {
        match self {
            Self::UnderReview => "Em análise",
            Self::Approved => "Aprovado",
            Self::Rejected => "Reprovado",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProcessStatus {
    type Err = DomainError;

    /// Accepts the stored label as well as unaccented, case-insensitive and
    /// snake/kebab-case spellings ("em_analise", "APROVADO").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'á' | 'à' | 'â' | 'ã' => 'a',
                '_' | '-' => ' ',
                other => other,
            })
            .collect();
        match folded.as_str() {
            "em analise" => Ok(Self::UnderReview),
            "aprovado" => Ok(Self::Approved),
            "reprovado" => Ok(Self::Rejected),
            _ => Err(DomainError::UnknownStatus(s.to_string())),
        }
    }
}

// ── Fields ──

/// Numeric process attributes a rule may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProcessField {
    #[serde(rename = "area_total")]
    TotalArea,
    #[serde(rename = "area_terreno")]
    LotArea,
    #[serde(rename = "altura")]
    Height,
    #[serde(rename = "pavimentos")]
    Floors,
    #[serde(rename = "vagas")]
    ParkingSpaces,
    #[serde(rename = "recuo_frontal")]
    FrontSetback,
}

impl ProcessField {
    pub const ALL: [ProcessField; 6] = [
        Self::TotalArea,
        Self::LotArea,
        Self::Height,
        Self::Floors,
        Self::ParkingSpaces,
        Self::FrontSetback,
    ];

    /// Stable name used in rules, storage and messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::TotalArea => "area_total",
            Self::LotArea => "area_terreno",
            Self::Height => "altura",
            Self::Floors => "pavimentos",
            Self::ParkingSpaces => "vagas",
            Self::FrontSetback => "recuo_frontal",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::TotalArea => "Área total construída (m²)",
            Self::LotArea => "Área do terreno (m²)",
            Self::Height => "Altura da edificação (m)",
            Self::Floors => "Número de pavimentos",
            Self::ParkingSpaces => "Vagas de estacionamento",
            Self::FrontSetback => "Recuo frontal (m)",
        }
    }
}

impl fmt::Display for ProcessField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProcessField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == key)
            .ok_or_else(|| DomainError::UnknownField(s.to_string()))
    }
}

/// Anything the validation engine can read numeric attributes from.
///
/// `None` means the attribute was not submitted.
pub trait NumericFields {
    fn numeric(&self, field: ProcessField) -> Option<f64>;
}

impl NumericFields for HashMap<ProcessField, f64> {
    fn numeric(&self, field: ProcessField) -> Option<f64> {
        self.get(&field).copied()
    }
}

impl NumericFields for BTreeMap<ProcessField, f64> {
    fn numeric(&self, field: ProcessField) -> Option<f64> {
        self.get(&field).copied()
    }
}

// ── Process ──

/// A registered permit application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: i64,
    /// Business key, unique and immutable.
    pub number: String,
    pub requester: String,
    /// Responsável técnico.
    pub technician: String,
    pub analyst: Option<String>,
    pub land_use: String,
    pub total_area: f64,
    pub lot_area: Option<f64>,
    pub height: Option<f64>,
    pub floors: Option<f64>,
    pub parking_spaces: Option<f64>,
    pub front_setback: Option<f64>,
    pub status: ProcessStatus,
    pub protocol_at: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

impl Process {
    /// Submitted value for `field`, if any.
    pub fn field(&self, field: ProcessField) -> Option<f64> {
        match field {
            ProcessField::TotalArea => Some(self.total_area),
            ProcessField::LotArea => self.lot_area,
            ProcessField::Height => self.height,
            ProcessField::Floors => self.floors,
            ProcessField::ParkingSpaces => self.parking_spaces,
            ProcessField::FrontSetback => self.front_setback,
        }
    }

    /// All submitted numeric attributes, in field order.
    pub fn attributes(&self) -> Vec<(ProcessField, f64)> {
        ProcessField::ALL
            .into_iter()
            .filter_map(|f| self.field(f).map(|v| (f, v)))
            .collect()
    }
}

impl NumericFields for Process {
    fn numeric(&self, field: ProcessField) -> Option<f64> {
        self.field(field)
    }
}

/// A process submission, before the store assigns an id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProcess {
    pub number: String,
    pub requester: String,
    pub technician: String,
    pub analyst: Option<String>,
    pub land_use: String,
    pub total_area: f64,
    pub lot_area: Option<f64>,
    pub height: Option<f64>,
    pub floors: Option<f64>,
    pub parking_spaces: Option<f64>,
    pub front_setback: Option<f64>,
    /// Defaults to the registration time when absent.
    pub protocol_at: Option<DateTime<Utc>>,
}

impl NewProcess {
    pub fn new(
        number: impl Into<String>,
        requester: impl Into<String>,
        technician: impl Into<String>,
        land_use: impl Into<String>,
        total_area: f64,
    ) -> Self {
        Self {
            number: number.into(),
            requester: requester.into(),
            technician: technician.into(),
            analyst: None,
            land_use: land_use.into(),
            total_area,
            lot_area: None,
            height: None,
            floors: None,
            parking_spaces: None,
            front_setback: None,
            protocol_at: None,
        }
    }

    pub fn with_analyst(mut self, analyst: impl Into<String>) -> Self {
        self.analyst = Some(analyst.into());
        self
    }

    pub fn with_protocol_at(mut self, at: DateTime<Utc>) -> Self {
        self.protocol_at = Some(at);
        self
    }

    /// Set a numeric attribute. Setting [`ProcessField::TotalArea`] replaces
    /// the mandatory total area.
    pub fn with_attribute(mut self, field: ProcessField, value: f64) -> Self {
        match field {
            ProcessField::TotalArea => self.total_area = value,
            ProcessField::LotArea => self.lot_area = Some(value),
            ProcessField::Height => self.height = Some(value),
            ProcessField::Floors => self.floors = Some(value),
            ProcessField::ParkingSpaces => self.parking_spaces = Some(value),
            ProcessField::FrontSetback => self.front_setback = Some(value),
        }
        self
    }

    /// Check required text fields and numeric ranges.
    ///
    /// `area_total` must be finite and strictly positive; optional attributes
    /// must be finite and non-negative.
    pub fn validate(&self) -> Result<(), DomainError> {
        non_empty(&self.number, "process number")?;
        non_empty(&self.requester, "requester")?;
        non_empty(&self.technician, "technician")?;
        non_empty(&self.land_use, "land use")?;

        if !self.total_area.is_finite() || self.total_area <= 0.0 {
            return Err(DomainError::InvalidAttribute {
                field: ProcessField::TotalArea.name(),
                value: self.total_area,
            });
        }
        let optional = [
            (ProcessField::LotArea, self.lot_area),
            (ProcessField::Height, self.height),
            (ProcessField::Floors, self.floors),
            (ProcessField::ParkingSpaces, self.parking_spaces),
            (ProcessField::FrontSetback, self.front_setback),
        ];
        for (field, value) in optional {
            if let Some(v) = value
                && (!v.is_finite() || v < 0.0)
            {
                return Err(DomainError::InvalidAttribute {
                    field: field.name(),
                    value: v,
                });
            }
        }
        Ok(())
    }

    /// Validate and materialise into a stored record with status "Em análise".
    pub fn into_process(self, id: i64, registered_at: DateTime<Utc>) -> Result<Process, DomainError> {
        self.validate()?;
        Ok(Process {
            id,
            number: self.number.trim().to_string(),
            requester: self.requester,
            technician: self.technician,
            analyst: self.analyst.filter(|a| !a.trim().is_empty()),
            land_use: self.land_use.trim().to_string(),
            total_area: self.total_area,
            lot_area: self.lot_area,
            height: self.height,
            floors: self.floors,
            parking_spaces: self.parking_spaces,
            front_setback: self.front_setback,
            status: ProcessStatus::UnderReview,
            protocol_at: self.protocol_at.unwrap_or(registered_at),
            registered_at,
        })
    }
}

pub(crate) fn non_empty(value: &str, what: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        Err(DomainError::Empty(what))
    } else {
        Ok(())
    }
}
