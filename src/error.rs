use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Format error: '{value}' does not match {expected}")]
    FormatError { value: String, expected: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invoice date {date} falls outside every audited week")]
    OutOfWindow { date: NaiveDate },

    #[error("Inconsistent rate for {network} at {bucket}: occurrences disagree on cost per spot ({rates:?})")]
    InconsistentRate {
        network: String,
        bucket: String,
        rates: Vec<f64>,
    },

    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("Summary verification failed for {network}: {details}")]
    VerificationError { network: String, details: String },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AuditError {
    pub fn format(value: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::FormatError {
            value: value.into(),
            expected: expected.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
