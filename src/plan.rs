//! Merge plans: which pages of which documents go into the output, in order
//!
//! A [`MergePlan`] is an ordered list of [`PageSelection`]s. Each selection
//! borrows a [`SourceDocument`] owned by the caller, so the same open document
//! can back several selections and is closed when the caller drops it.

use std::ops::Range;
use std::path::{Path, PathBuf};

use lopdf::Document;
use once_cell::unsync::OnceCell;
use tracing::debug;

use crate::error::{Error, Result};

/// A PDF on disk, parsed lazily the first time its pages are needed
#[derive(Debug)]
pub struct SourceDocument {
    path: PathBuf,
    document: OnceCell<Document>,
}

impl SourceDocument {
    /// Reference a PDF without reading it yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file has already been parsed
    pub fn is_open(&self) -> bool {
        self.document.get().is_some()
    }

    /// Parse the file (once) and return the loaded document
    pub fn open(&self) -> Result<&Document> {
        self.document.get_or_try_init(|| {
            debug!(path = %self.path.display(), "opening source document");
            let doc = Document::load(&self.path)
                .map_err(|e| Error::unreadable(&self.path, e))?;
            if doc.trailer.get(b"Root").is_err() {
                return Err(Error::unreadable(&self.path, "document has no catalog"));
            }
            Ok(doc)
        })
    }

    /// Number of pages, opening the document if necessary
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.open()?.get_pages().len())
    }
}

/// Clockwise rotation applied to every page of a selection
///
/// Always normalized to 0, 90, 180 or 270 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rotation(u16);

impl Rotation {
    pub const NONE: Rotation = Rotation(0);

    /// Build a rotation from any multiple of 90 degrees (negative is counter-clockwise)
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(Error::InvalidRotation(degrees));
        }
        Ok(Rotation(degrees.rem_euclid(360) as u16))
    }

    pub fn degrees(self) -> u16 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Turn another 90 degrees counter-clockwise
    pub fn rotate_left(self) -> Self {
        Rotation((self.0 + 270) % 360)
    }

    /// Turn another 90 degrees clockwise
    pub fn rotate_right(self) -> Self {
        Rotation((self.0 + 90) % 360)
    }

    /// Add this rotation to an existing `/Rotate` value
    pub fn apply_to(self, current: i64) -> i64 {
        (current.rem_euclid(360) + i64::from(self.0)).rem_euclid(360)
    }
}

/// A contiguous run of pages from one source document
#[derive(Debug, Clone, Copy)]
pub struct PageSelection<'a> {
    source: &'a SourceDocument,
    start: usize,
    end: Option<usize>,
    rotation: Rotation,
}

impl<'a> PageSelection<'a> {
    /// Every page of `source`
    pub fn full(source: &'a SourceDocument) -> Self {
        Self::from_page(source, 0)
    }

    /// Pages `start..` through the last page of `source`
    pub fn from_page(source: &'a SourceDocument, start: usize) -> Self {
        Self {
            source,
            start,
            end: None,
            rotation: Rotation::NONE,
        }
    }

    /// Pages `start..end` (0-based, end exclusive)
    ///
    /// Empty ranges are rejected here; ranges past the last page are rejected
    /// when the selection is resolved against the opened document.
    pub fn range(source: &'a SourceDocument, start: usize, end: usize) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidSelection {
                path: source.path().to_path_buf(),
                start,
                end: Some(end),
                page_count: source.document.get().map_or(0, |d| d.get_pages().len()),
            });
        }
        Ok(Self {
            source,
            start,
            end: Some(end),
            rotation: Rotation::NONE,
        })
    }

    pub fn rotated(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn source(&self) -> &'a SourceDocument {
        self.source
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> Option<usize> {
        self.end
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Resolve to a concrete page index range
    ///
    /// Explicit ranges are never empty. An open-ended selection starting at the
    /// last page boundary (a full selection of a zero-page document, say)
    /// resolves to an empty range; starting past it is an error.
    pub fn resolve(&self) -> Result<Range<usize>> {
        let page_count = self.source.page_count()?;
        let end = self.end.unwrap_or(page_count);

        if self.start > end || end > page_count {
            return Err(Error::InvalidSelection {
                path: self.source.path().to_path_buf(),
                start: self.start,
                end: self.end,
                page_count,
            });
        }

        Ok(self.start..end)
    }

    /// Number of pages this selection contributes
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.resolve()?.len())
    }
}

/// Ordered list of page selections to assemble
#[derive(Debug, Clone, Default)]
pub struct MergePlan<'a> {
    selections: Vec<PageSelection<'a>>,
}

impl<'a> MergePlan<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, selection: PageSelection<'a>) {
        self.selections.push(selection);
    }

    pub fn selections(&self) -> &[PageSelection<'a>] {
        &self.selections
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Total pages the plan produces (sum over all selections)
    pub fn page_count(&self) -> Result<usize> {
        self.selections.iter().map(PageSelection::page_count).sum()
    }
}

impl<'a> FromIterator<PageSelection<'a>> for MergePlan<'a> {
    fn from_iter<I: IntoIterator<Item = PageSelection<'a>>>(iter: I) -> Self {
        Self {
            selections: iter.into_iter().collect(),
        }
    }
}

/// Signature pages followed by the report without its first page
///
/// Fails with [`Error::InsufficientPages`] when the report has fewer than two
/// pages, since nothing of it would remain.
pub fn signed_merge_plan<'a>(
    signature: &'a SourceDocument,
    report: &'a SourceDocument,
    signature_rotation: Rotation,
    report_rotation: Rotation,
) -> Result<MergePlan<'a>> {
    let report_pages = report.page_count()?;
    if report_pages < 2 {
        return Err(Error::InsufficientPages {
            path: report.path().to_path_buf(),
            pages: report_pages,
        });
    }

    Ok(MergePlan::from_iter([
        PageSelection::full(signature).rotated(signature_rotation),
        PageSelection::from_page(report, 1).rotated(report_rotation),
    ]))
}

/// Every page of every document, in list order
pub fn multi_merge_plan(sources: &[SourceDocument]) -> MergePlan<'_> {
    sources.iter().map(PageSelection::full).collect()
}
