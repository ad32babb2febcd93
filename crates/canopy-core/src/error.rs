use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid resource id {id:?}: {reason}")]
    InvalidResourceId { id: String, reason: String },

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// A single constraint violation, addressed by a dotted path such as
/// `master_pool_profile.0.vm_size`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Every violation found in one validation pass.
///
/// Validation never stops at the first bad field so the operator sees the
/// full list in one go.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {}", join_errors(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(path, message)],
        }
    }

    /// True if any violation is reported for exactly `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.errors.iter().any(|e| e.path == path)
    }
}

impl From<Vec<FieldError>> for ValidationError {
    fn from(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
