//! PDF manipulation module

pub mod assemble;
pub mod metadata;

// Re-export commonly used items
pub use assemble::{assemble, assemble_to, OutputDocument};
pub use metadata::{count_pages, extract_metadata, PdfMetadata};
