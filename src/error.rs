//! Error types for the PDF assembler

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF assembler library
#[derive(Error, Debug)]
pub enum Error {
    /// An input path does not exist, is not a PDF, or cannot be parsed
    #[error("Cannot read PDF {}: {reason}", .path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    /// Signed merge needs a report with at least two pages
    #[error(
        "Report {} has {pages} page(s); at least 2 are required because its first page is dropped",
        .path.display()
    )]
    InsufficientPages { path: PathBuf, pages: usize },

    /// The merge plan would produce no pages
    #[error("Nothing to merge: the plan contains no pages")]
    EmptyPlan,

    /// A page selection does not fit the document it points at
    #[error(
        "Invalid page range {start}..{} for {} ({page_count} pages)",
        .end.map(|e| e.to_string()).unwrap_or_else(|| "end".to_string()),
        .path.display()
    )]
    InvalidSelection {
        path: PathBuf,
        start: usize,
        end: Option<usize>,
        page_count: usize,
    },

    /// The destination could not be written
    #[error("Cannot write {}: {source}; choose a different destination", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination exists and overwriting was not allowed
    #[error("Target file already exists: {}", .0.display())]
    TargetExists(PathBuf),

    /// The report folder could not be resolved
    #[error("Report folder error: {0}")]
    ReportFolder(String),

    /// Rotation that is not a multiple of 90 degrees
    #[error("Invalid rotation {0}: must be a multiple of 90 degrees")]
    InvalidRotation(i32),

    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Write {
            path: path.into(),
            source,
        }
    }
}
