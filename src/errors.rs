/// Domain-specific error types for svcrank
///
/// Lookups that miss are normally surfaced as empty results; `NotFound` is
/// reserved for callers that need a hard miss (the HTTP boundary, the CLI).

#[derive(Debug, thiserror::Error)]
pub enum SvcrankError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("{kind} not found: {key}")]
    NotFound {
        kind: &'static str,
        key: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for SvcrankError {
    fn from(e: sqlx::Error) -> Self {
        SvcrankError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for SvcrankError {
    fn from(e: serde_json::Error) -> Self {
        SvcrankError::Internal(format!("JSON error: {}", e))
    }
}

impl SvcrankError {
    /// Helper to create validation errors with field names
    ///
    /// Example:
    /// ```
    /// use svcrank::errors::SvcrankError;
    /// let err = SvcrankError::validation("name", "Service name cannot be empty");
    /// ```
    pub fn validation(field: &str, message: &str) -> Self {
        SvcrankError::Validation {
            message: message.to_string(),
            field: Some(field.to_string()),
        }
    }

    pub fn not_found(kind: &'static str, key: &str) -> Self {
        SvcrankError::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = SvcrankError::not_found("Category", "notes");
        assert_eq!(err.to_string(), "Category not found: notes");
    }

    #[test]
    fn test_sqlx_error_maps_to_storage() {
        let err: SvcrankError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, SvcrankError::Storage(_)));
    }
}
