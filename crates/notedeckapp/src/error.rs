use thiserror::Error;

#[derive(Error, Debug)]
pub enum NoteError {
    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Invalid note key: {0}")]
    InvalidKey(String),

    #[error("No local directory selected")]
    NoDirectory,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl NoteError {
    /// True for a remote 404 or a missing local file.
    pub fn is_not_found(&self) -> bool {
        match self {
            NoteError::NoteNotFound(_) => true,
            NoteError::Status { status, .. } => *status == 404,
            NoteError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, NoteError>;
