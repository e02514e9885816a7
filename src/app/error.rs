use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComicError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive parsing error: {0}")]
    ArchiveParse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Comic not found: {0}")]
    ComicNotFound(i64),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ComicError {
    /// Failures that mean "the remote produced no usable data" rather than a
    /// broken local state.
    pub fn is_transport(&self) -> bool {
        matches!(self, ComicError::Http(_) | ComicError::Json(_))
    }
}

pub type Result<T> = std::result::Result<T, ComicError>;
