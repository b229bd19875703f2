//! Common error types for AI-Hab

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for AI-Hab operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across AI-Hab crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Taxonomy loading or integrity error
    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),
}

/// Taxonomy errors
///
/// Every variant is a data fault on our side (the taxonomy document or the
/// label table disagree with each other), never a caller input fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    /// Taxonomy document does not exist
    #[error("Taxonomy source not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// Taxonomy document exists but could not be read
    #[error("Taxonomy source unreadable ({}): {reason}", .path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    /// Taxonomy document could not be parsed into code → entry mappings
    #[error("Taxonomy source malformed ({}): {reason}", .path.display())]
    SourceMalformed { path: PathBuf, reason: String },

    /// Code (or one of its prefixes) is absent from the taxonomy
    #[error("Unknown habitat code: {0}")]
    UnknownCode(String),
}

impl TaxonomyError {
    /// True when the error came from loading the source document
    pub fn is_load_error(&self) -> bool {
        !matches!(self, TaxonomyError::UnknownCode(_))
    }
}
