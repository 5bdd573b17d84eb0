//! Errors and warnings raised while loading a sales dataset.

use thiserror::Error;

/// Reasons a dataset is rejected by the loader.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file parsed but holds no data rows.
    #[error("The dataset is empty")]
    EmptyDataset,

    /// `Sale_Date` exists but no value could be read as a date.
    #[error("Invalid dates: no value in column '{column}' could be parsed as a date")]
    InvalidDates { column: String },

    /// `Sales_Amount` holds at least one negative value.
    #[error(
        "Negative values found in column '{column}': {count} row(s), first at data row {first_row}"
    )]
    NegativeAmounts {
        column: String,
        count: usize,
        first_row: usize,
    },

    /// Any other failure while decoding or parsing the input.
    #[error("Failed to load dataset: {0}")]
    Load(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl From<anyhow::Error> for LoadError {
    fn from(err: anyhow::Error) -> Self {
        LoadError::Load(err.into())
    }
}

/// Non-fatal conditions reported alongside a loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Some expected columns are absent; metrics needing them are skipped.
    PartialSchema { missing: Vec<String> },
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadWarning::PartialSchema { missing } => write!(
                f,
                "Missing columns: {}. Some metrics will not be available.",
                missing.join(", ")
            ),
        }
    }
}
