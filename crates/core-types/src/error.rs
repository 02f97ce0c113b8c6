use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
}

impl CoreError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// The name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            CoreError::InvalidField { field, .. } => field,
            CoreError::MissingField(field) => field,
        }
    }
}
