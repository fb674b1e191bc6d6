use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot read bill file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} failed validation with {errors} error(s)")]
    Validation { path: String, errors: usize },

    #[error("Settings error: {0}")]
    Config(String),

    #[error("Unknown report format: {0}")]
    UnknownFormat(String),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BillError>;
