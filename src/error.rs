use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

/// Every failure the vault engine can report. Each variant carries enough
/// context (path, operation) for a caller to build a user-facing message.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Path traversal detected: {path} ({reason})")]
    PathTraversal { path: String, reason: String },

    #[error("Note not found: {path}")]
    NoteNotFound { path: String },

    #[error("Note already exists: {path}")]
    NoteAlreadyExists { path: String },

    #[error("Invalid frontmatter{}: {reason}", note_suffix(.path))]
    InvalidFrontmatter { path: Option<String>, reason: String },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Vault root does not exist or is not a directory: {path:?}")]
    RootNotFound { path: PathBuf },

    #[error("Failed to {op} {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Failed to serialize result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn note_suffix(path: &Option<String>) -> String {
    path.as_ref().map(|p| format!(" in {}", p)).unwrap_or_default()
}

impl VaultError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VaultError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn traversal(path: &str, reason: impl Into<String>) -> Self {
        VaultError::PathTraversal {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach a note path to a frontmatter error raised by the codec.
    pub(crate) fn in_note(self, note_path: &str) -> Self {
        match self {
            VaultError::InvalidFrontmatter { path: None, reason } => VaultError::InvalidFrontmatter {
                path: Some(note_path.to_string()),
                reason,
            },
            other => other,
        }
    }

    /// Stable snake_case code for transports.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::PathTraversal { .. } => "path_traversal",
            VaultError::NoteNotFound { .. } => "note_not_found",
            VaultError::NoteAlreadyExists { .. } => "note_already_exists",
            VaultError::InvalidFrontmatter { .. } => "invalid_frontmatter",
            VaultError::InvalidPath { .. } => "invalid_path",
            VaultError::InvalidQuery(_) => "invalid_query",
            VaultError::RootNotFound { .. } => "root_not_found",
            VaultError::Io { .. } => "io_failure",
            VaultError::Cancelled => "cancelled",
            VaultError::Serialization(_) => "serialization_failure",
            VaultError::Config(_) => "config",
        }
    }
}
