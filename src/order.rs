//! User-ordered list of files for multi merge

use std::path::PathBuf;

use crate::plan::SourceDocument;

/// Swap the entry at `index` with the one above it
///
/// No-op for the first entry or an out-of-range index.
pub fn move_up<T>(items: &mut [T], index: usize) {
    if index > 0 && index < items.len() {
        items.swap(index, index - 1);
    }
}

/// Swap the entry at `index` with the one below it
///
/// No-op for the last entry or an out-of-range index.
pub fn move_down<T>(items: &mut [T], index: usize) {
    if index < items.len().saturating_sub(1) {
        items.swap(index, index + 1);
    }
}

/// Ordered list of input PDFs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeList {
    paths: Vec<PathBuf>,
}

impl MergeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Move the entry at `index` one place towards the front
    pub fn move_up(&mut self, index: usize) -> &[PathBuf] {
        move_up(&mut self.paths, index);
        &self.paths
    }

    /// Move the entry at `index` one place towards the back
    pub fn move_down(&mut self, index: usize) -> &[PathBuf] {
        move_down(&mut self.paths, index);
        &self.paths
    }

    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        (index < self.paths.len()).then(|| self.paths.remove(index))
    }

    /// Remove several entries at once, each index counted in the list as it
    /// is now
    ///
    /// Duplicates are removed once. If any index is out of range nothing is
    /// removed and the first such index is returned as the error. Removed
    /// paths come back in list order.
    pub fn remove_many(&mut self, indices: &[usize]) -> Result<Vec<PathBuf>, usize> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.paths.len()) {
            return Err(bad);
        }

        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut removed: Vec<PathBuf> =
            sorted.iter().rev().map(|&i| self.paths.remove(i)).collect();
        removed.reverse();
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// One unopened source per entry, in list order
    pub fn open_all(&self) -> Vec<SourceDocument> {
        self.paths.iter().map(SourceDocument::new).collect()
    }
}

impl<P: Into<PathBuf>> Extend<P> for MergeList {
    fn extend<I: IntoIterator<Item = P>>(&mut self, iter: I) {
        self.paths.extend(iter.into_iter().map(Into::into));
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for MergeList {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}
