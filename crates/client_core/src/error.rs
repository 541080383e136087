use shared::error::{ConversionError, ErrorEnvelope, FieldErrors};
use thiserror::Error;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadConstraintError {
    #[error("Maximum {max} files allowed")]
    TooManyFiles { max: usize, attempted: usize },
    #[error("Only XLS/XLSX files under {max_mb}MB are allowed")]
    InvalidFiles { rejected: Vec<String>, max_mb: u64 },
    #[error("Please upload only Excel files (.xlsx or .xls)")]
    UnsupportedExtension { file_name: String },
    #[error("File size must be less than {max_mb}MB")]
    FileTooLarge { file_name: String, max_mb: u64 },
    #[error("Please select a partner and at least one file")]
    MissingSelection,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {message}")]
    Network { message: String, timed_out: bool },
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(FieldErrors),
    #[error("server rejected {} field(s)", .0.len())]
    ServerValidation(FieldErrors),
    #[error("not found: {0}")]
    NotFound(ErrorEnvelope),
    #[error(transparent)]
    UploadConstraint(#[from] UploadConstraintError),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("{0}")]
    Http(ErrorEnvelope),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Network and unclassified failures leave state untouched and may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network { .. } | ClientError::Http(_))
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ClientError::Validation(errors) | ClientError::ServerValidation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Text suitable for a transient notification.
    pub fn notification_text(&self) -> String {
        match self {
            ClientError::Network { timed_out: true, .. } => {
                "The request timed out. Please try again.".to_string()
            }
            ClientError::Network { .. } => "Unable to reach the server. Please try again.".to_string(),
            ClientError::Http(envelope) | ClientError::NotFound(envelope) => envelope.message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ConversionError> for ClientError {
    fn from(value: ConversionError) -> Self {
        ClientError::MalformedResponse(value.to_string())
    }
}
