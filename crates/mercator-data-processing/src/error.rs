use thiserror::Error;
pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed numeric field {field} on line {line}: {value:?} is not a number")]
    MalformedNumericField {
        field: String,
        value: String,
        line: usize,
    },
    #[error("Could not extract text from {name}: {reason}")]
    Extraction { name: String, reason: String },
}

impl DataError {
    /// True for failures that only affect the record being built, not the
    /// whole stream.
    pub const fn is_record_local(&self) -> bool {
        matches!(
            self,
            Self::MalformedNumericField { .. } | Self::Extraction { .. }
        )
    }
}
