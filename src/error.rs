use thiserror::Error;

use crate::language::CodeLanguage;

/// Raised when a session is created with settings it cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Failure of a snippet provider. Orchestration recovers from every variant
/// by substituting a placeholder snippet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnippetError {
    #[error("snippet provider unavailable: {0}")]
    Unavailable(String),
    #[error("no snippets available for {0}")]
    Empty(CodeLanguage),
}

/// Failure of a result or xp sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("result sink unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
