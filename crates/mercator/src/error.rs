use mercator_data_processing::DataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MercatorError {
    #[error("Malformed input: {0}")]
    MalformedInput(#[from] DataError),
    #[error("Query syntax error: {0}")]
    QuerySyntax(#[from] tantivy::query::QueryParserError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Index error: {0}")]
    Index(#[from] tantivy::TantivyError),
    #[error("Highlight computation failed: {0}")]
    HighlightComputation(String),
    #[error("Index schema has no field named {0:?}")]
    SchemaMismatch(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Worker pool has shut down")]
    WorkerLost,
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The four failure kinds callers are expected to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A record or document could not be built; the rest of the batch is fine.
    MalformedInput,
    /// The query string did not parse. Never reported as an empty result.
    QuerySyntax,
    /// File or index storage access failed.
    Io,
    /// Only ever recovered locally by degrading to unhighlighted output.
    HighlightComputation,
    Other,
}

impl MercatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedInput(DataError::Io(_)) | Self::Io(_) | Self::Index(_) => {
                ErrorKind::Io
            }
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::QuerySyntax(_) => ErrorKind::QuerySyntax,
            Self::HighlightComputation(_) => ErrorKind::HighlightComputation,
            Self::SchemaMismatch(_)
            | Self::Config(_)
            | Self::WorkerLost
            | Self::InitLoggingError(_)
            | Self::Other(_) => ErrorKind::Other,
        }
    }

    /// True when only the current record failed and a batch may continue.
    pub fn is_record_local(&self) -> bool {
        matches!(self, Self::MalformedInput(e) if e.is_record_local())
    }
}

pub type Result<T> = std::result::Result<T, MercatorError>;
