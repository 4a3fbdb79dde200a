use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Unsupported file format: {0} (expected .csv or .xlsx)")]
    UnsupportedFormat(String),

    #[error("Unable to read file: {0}")]
    UnreadableFile(String),

    #[error(
        "Missing required columns after normalization: {}. Cleaned headers found in file: {}",
        .missing.join(", "),
        .found.join(", ")
    )]
    MissingRequiredColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

impl EvalError {
    /// True for the failures that abort a preview before any record is produced.
    pub fn is_import_failure(&self) -> bool {
        matches!(
            self,
            EvalError::UnsupportedFormat(_)
                | EvalError::UnreadableFile(_)
                | EvalError::MissingRequiredColumns { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_message_lists_keys_and_headers() {
        let err = EvalError::MissingRequiredColumns {
            missing: vec!["axe".to_string(), "categorie".to_string()],
            found: vec!["REF COMP".to_string(), "DOMAINE".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("axe, categorie"));
        assert!(msg.contains("REF COMP, DOMAINE"));
        assert!(err.is_import_failure());
    }

    #[test]
    fn storage_errors_are_not_import_failures() {
        assert!(!EvalError::Storage("lock poisoned".into()).is_import_failure());
    }
}
