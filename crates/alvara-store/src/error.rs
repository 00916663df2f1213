use alvara_core::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("invalid input: {0}")]
    Domain(#[from] DomainError),

    #[error("corrupt {entity} row: {detail}")]
    Corrupt { entity: &'static str, detail: String },

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn duplicate(entity: &'static str, key: impl ToString) -> Self {
        Self::Duplicate {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
