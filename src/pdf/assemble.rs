//! Page assembly using lopdf
//!
//! Pages are copied as PDF objects from their source documents into a fresh
//! document. Nothing is re-rendered: content streams, resources and page
//! boxes are carried over as they are.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::plan::{MergePlan, PageSelection, Rotation};
use crate::storage::{write_file_atomically, write_new_file_atomically};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed files
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// The assembled document, not yet written anywhere
#[derive(Debug)]
pub struct OutputDocument {
    document: Document,
    page_count: usize,
}

impl OutputDocument {
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Serialize the document to PDF bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.document.save_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Write the document to `path`, replacing any existing file
    ///
    /// The bytes go to a temporary file next to `path` first, so an existing
    /// destination is only replaced by a complete document.
    pub fn save(self, path: &Path) -> Result<()> {
        self.write_with(path, write_file_atomically)
    }

    /// Write the document to `path`, failing with [`Error::TargetExists`] if
    /// the file exists by the time the write completes
    pub fn save_new(self, path: &Path) -> Result<()> {
        self.write_with(path, write_new_file_atomically)
    }

    fn write_with(mut self, path: &Path, persist: fn(&Path, &[u8]) -> Result<()>) -> Result<()> {
        let bytes = self
            .to_bytes()
            .map_err(|e| Error::write(path, std::io::Error::other(e.to_string())))?;
        persist(path, &bytes)?;

        info!(
            path = %path.display(),
            pages = self.page_count,
            bytes = bytes.len(),
            "wrote assembled PDF"
        );
        Ok(())
    }
}

/// Assemble the pages named by `plan` into a single document
///
/// Selections are applied strictly in order, and pages within a selection
/// keep their original order. Each selection gets its own renumbered copy of
/// the source objects, so the same document (or the same page) may appear in
/// several selections.
///
/// # Example
///
/// ```no_run
/// use pdf_assembler::plan::{signed_merge_plan, Rotation, SourceDocument};
/// use pdf_assembler::pdf::assemble;
/// use std::path::Path;
///
/// let signature = SourceDocument::new("signature.pdf");
/// let report = SourceDocument::new("report.pdf");
/// let plan = signed_merge_plan(&signature, &report, Rotation::NONE, Rotation::NONE)?;
///
/// let output = assemble(&plan)?;
/// output.save(Path::new("signed-report.pdf"))?;
/// # Ok::<(), pdf_assembler::Error>(())
/// ```
pub fn assemble(plan: &MergePlan<'_>) -> Result<OutputDocument> {
    if plan.is_empty() {
        return Err(Error::EmptyPlan);
    }

    // Resolve everything up front: bad ranges fail before any copying, and a
    // plan over zero-page documents is empty rather than invalid
    let ranges = plan
        .selections()
        .iter()
        .map(PageSelection::resolve)
        .collect::<Result<Vec<_>>>()?;
    if ranges.iter().all(Range::is_empty) {
        return Err(Error::EmptyPlan);
    }

    // Define a starting max_id for the assembled document
    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for (selection, range) in plan.selections().iter().zip(ranges) {
        if range.is_empty() {
            continue;
        }
        let mut doc = selection.source().open()?.clone();

        // Renumber this copy so its ids follow everything collected so far
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let selected = &pages[range.clone()];

        for &page_id in selected {
            flatten_inherited_attributes(&mut doc, page_id)?;
            if !selection.rotation().is_none() {
                rotate_page(&mut doc, page_id, selection.rotation())?;
            }
        }

        debug!(
            path = %selection.source().path().display(),
            start = range.start,
            end = range.end,
            rotation = selection.rotation().degrees(),
            "collected pages"
        );

        page_ids.extend_from_slice(selected);
        objects.extend(doc.objects);
    }

    let mut merged_doc = Document::with_version("1.5");

    // Add all collected objects FIRST
    merged_doc.objects.extend(objects);

    // Keep new_object_id() above every id we just added
    merged_doc.max_id = max_id - 1;

    let pages_id = merged_doc.new_object_id();

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(page_ids.len() as i64));
    pages_object.set("Kids", Object::Array(kids));

    let catalog_id = merged_doc.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    merged_doc.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged_doc.objects.insert(pages_id, Object::Dictionary(pages_object));
    merged_doc.trailer.set("Root", Object::Reference(catalog_id));

    for &page_id in &page_ids {
        merged_doc
            .get_dictionary_mut(page_id)?
            .set("Parent", Object::Reference(pages_id));
    }

    // Dropped pages and the old page trees are now unreachable
    let pruned = merged_doc.prune_objects();
    debug!(pruned = pruned.len(), "pruned unreachable objects");

    merged_doc.compress();

    Ok(OutputDocument {
        document: merged_doc,
        page_count: page_ids.len(),
    })
}

/// Assemble `plan` and write the result to `output_path`
///
/// Returns the number of pages written.
pub fn assemble_to(plan: &MergePlan<'_>, output_path: &Path) -> Result<usize> {
    let output = assemble(plan)?;
    let page_count = output.page_count();
    output.save(output_path)?;
    Ok(page_count)
}

/// Copy attributes the page inherits from its ancestors onto the page itself
///
/// Once the page is re-parented under a new page tree the old ancestors no
/// longer apply, so the values have to live on the page dictionary.
fn flatten_inherited_attributes(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let inherited: Vec<(&[u8], Object)> = {
        let page = doc.get_dictionary(page_id)?;
        INHERITABLE_ATTRIBUTES
            .iter()
            .filter(|key| !page.has(key))
            .filter_map(|&key| inherited_attribute(doc, page, key).map(|value| (key, value)))
            .collect()
    };

    if inherited.is_empty() {
        return Ok(());
    }

    let page = doc.get_dictionary_mut(page_id)?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}

/// Walk up the `Parent` chain looking for `key`
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

/// Add `rotation` to the page's `/Rotate` entry
fn rotate_page(doc: &mut Document, page_id: ObjectId, rotation: Rotation) -> Result<()> {
    let page = doc.get_dictionary_mut(page_id)?;
    let current = page.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
    page.set("Rotate", Object::Integer(rotation.apply_to(current)));
    Ok(())
}
