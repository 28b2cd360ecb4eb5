//! PDF Assembler Library
//!
//! Builds one PDF out of pages taken from several others, copying page
//! objects as they are (no rasterization). Two modes are provided:
//! - Signed merge: signature pages followed by a report without its first page
//! - Multi merge: a user-ordered list of PDFs concatenated in full
//!
//! Alongside the assembler the crate offers:
//! - Move-up / move-down reordering of the input list
//! - Page counts and document metadata
//! - Storing a merged report in a test's report folder with versioned names
//!
//! # Example
//!
//! ```no_run
//! use pdf_assembler::config::{run, MergeConfig, MergeMode, OverwritePolicy};
//! use pdf_assembler::order::MergeList;
//! use std::path::PathBuf;
//!
//! let mut files: MergeList = ["1. intro.pdf", "2. advanced.pdf"].into_iter().collect();
//! files.move_down(0);
//!
//! let config = MergeConfig {
//!     mode: MergeMode::Multi { files },
//!     output_path: PathBuf::from("merged.pdf"),
//!     overwrite: OverwritePolicy::Overwrite,
//! };
//!
//! let report = run(&config).expect("Failed to merge PDFs");
//! println!("{} pages", report.page_count);
//! ```

pub mod config;
pub mod error;
pub mod order;
pub mod pdf;
pub mod plan;
pub mod storage;

// Re-export commonly used items
pub use error::{Error, Result};
