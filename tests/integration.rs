//! Integration tests for the PDF assembler library

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdf_assembler::config::{run, MergeConfig, MergeMode, OverwritePolicy};
use pdf_assembler::order::MergeList;
use pdf_assembler::pdf::{assemble, count_pages, extract_metadata};
use pdf_assembler::plan::{
    multi_merge_plan, signed_merge_plan, MergePlan, PageSelection, Rotation, SourceDocument,
};
use pdf_assembler::Error;
use tempfile::TempDir;

/// Where the page size lives in a generated test PDF
#[derive(Clone, Copy)]
enum MediaBoxOn {
    Page,
    PageTree,
}

/// Write a PDF with `num_pages` pages whose content reads "{prefix}-Page-{n}"
fn create_test_pdf(dir: &Path, name: &str, num_pages: u32, prefix: &str) -> PathBuf {
    create_test_pdf_with(dir, name, num_pages, prefix, MediaBoxOn::Page, None)
}

fn create_test_pdf_with(
    dir: &Path,
    name: &str,
    num_pages: u32,
    prefix: &str,
    media_box_on: MediaBoxOn,
    title: Option<&str>,
) -> PathBuf {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let catalog_id = doc.new_object_id();
    let media_box = Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(595),
        Object::Integer(842),
    ]);

    let mut kids = Vec::new();
    for page_num in 0..num_pages {
        let content = format!(
            "BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET",
            prefix,
            page_num + 1
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set("Contents", Object::Reference(content_id));
        if let MediaBoxOn::Page = media_box_on {
            page_dict.set("MediaBox", media_box.clone());
        }

        let page_id = doc.add_object(Object::Dictionary(page_dict));
        kids.push(Object::Reference(page_id));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(num_pages as i64));
    pages_dict.set("Kids", Object::Array(kids));
    if let MediaBoxOn::PageTree = media_box_on {
        pages_dict.set("MediaBox", media_box);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog_dict = Dictionary::new();
    catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog_dict.set("Pages", Object::Reference(pages_id));
    doc.objects.insert(catalog_id, Object::Dictionary(catalog_dict));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    if let Some(title) = title {
        let mut info = Dictionary::new();
        info.set(
            "Title",
            Object::String(title.as_bytes().to_vec(), StringFormat::Literal),
        );
        let info_id = doc.add_object(Object::Dictionary(info));
        doc.trailer.set("Info", Object::Reference(info_id));
    }

    let path = dir.join(name);
    doc.save(&path).expect("Failed to write test PDF");
    path
}

/// Decoded content stream bytes of one page
fn page_content(doc: &Document, page_id: ObjectId) -> String {
    let page = doc.get_dictionary(page_id).expect("page dictionary");
    let contents = page.get(b"Contents").expect("page contents");
    let ids: Vec<ObjectId> = match contents {
        Object::Reference(id) => vec![*id],
        Object::Array(items) => items.iter().filter_map(|o| o.as_reference().ok()).collect(),
        other => panic!("unexpected Contents: {:?}", other),
    };

    let mut text = String::new();
    for id in ids {
        let stream = doc.get_object(id).and_then(Object::as_stream).expect("content stream");
        let bytes = if stream.dict.has(b"Filter") {
            stream.decompressed_content().expect("decompress")
        } else {
            stream.content.clone()
        };
        text.push_str(&String::from_utf8_lossy(&bytes));
    }
    text
}

/// The "{prefix}-Page-{n}" label of every page, in page order
fn page_labels(path: &Path) -> Vec<String> {
    let doc = Document::load(path).expect("Failed to load output PDF");
    doc.get_pages()
        .values()
        .map(|&id| {
            let content = page_content(&doc, id);
            let start = content.find('(').expect("label start") + 1;
            let end = content.find(')').expect("label end");
            content[start..end].to_string()
        })
        .collect()
}

fn labels(prefix: &str, pages: std::ops::RangeInclusive<u32>) -> Vec<String> {
    pages.map(|n| format!("{}-Page-{}", prefix, n)).collect()
}

fn page_dictionaries(path: &Path) -> Vec<Dictionary> {
    let doc = Document::load(path).expect("Failed to load output PDF");
    doc.get_pages()
        .values()
        .map(|&id| doc.get_dictionary(id).expect("page").clone())
        .collect()
}

#[test]
fn test_multi_merge_page_count_and_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let a = create_test_pdf(temp_dir.path(), "a.pdf", 2, "A");
    let b = create_test_pdf(temp_dir.path(), "b.pdf", 1, "B");
    let c = create_test_pdf(temp_dir.path(), "c.pdf", 3, "C");
    let output_path = temp_dir.path().join("merged.pdf");

    let sources = vec![
        SourceDocument::new(&a),
        SourceDocument::new(&b),
        SourceDocument::new(&c),
    ];
    let plan = multi_merge_plan(&sources);
    assert_eq!(plan.page_count().unwrap(), 6);

    let output = assemble(&plan).expect("Failed to assemble");
    assert_eq!(output.page_count(), 6);
    output.save(&output_path).expect("Failed to save");

    assert_eq!(count_pages(&output_path).unwrap(), 6);

    let mut expected = labels("A", 1..=2);
    expected.extend(labels("B", 1..=1));
    expected.extend(labels("C", 1..=3));
    assert_eq!(page_labels(&output_path), expected);
}

#[test]
fn test_signed_merge_drops_first_report_page() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let signature_path = create_test_pdf(temp_dir.path(), "signature.pdf", 2, "Sig");
    let report_path = create_test_pdf(temp_dir.path(), "report.pdf", 4, "Report");
    let output_path = temp_dir.path().join("signed.pdf");

    let signature = SourceDocument::new(&signature_path);
    let report = SourceDocument::new(&report_path);
    let plan = signed_merge_plan(&signature, &report, Rotation::NONE, Rotation::NONE)
        .expect("Failed to build plan");

    let output = assemble(&plan).expect("Failed to assemble");
    // S + R - 1
    assert_eq!(output.page_count(), 5);
    output.save(&output_path).expect("Failed to save");

    let mut expected = labels("Sig", 1..=2);
    expected.extend(labels("Report", 2..=4));
    assert_eq!(page_labels(&output_path), expected);
}

#[test]
fn test_signed_merge_single_page_report_fails_without_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let signature = create_test_pdf(temp_dir.path(), "signature.pdf", 1, "Sig");
    let report = create_test_pdf(temp_dir.path(), "report.pdf", 1, "Report");
    let output_path = temp_dir.path().join("signed.pdf");

    let config = MergeConfig {
        mode: MergeMode::Signed {
            signature,
            report,
            signature_rotation: Rotation::NONE,
            report_rotation: Rotation::NONE,
        },
        output_path: output_path.clone(),
        overwrite: OverwritePolicy::Overwrite,
    };

    let result = run(&config);
    assert!(
        matches!(result, Err(Error::InsufficientPages { pages: 1, .. })),
        "expected InsufficientPages, got {:?}",
        result
    );
    assert!(!output_path.exists(), "No output should be written");
}

#[test]
fn test_reordered_list_assembles_in_new_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let mut files = MergeList::new();
    files.push(create_test_pdf(temp_dir.path(), "1.pdf", 1, "One"));
    files.push(create_test_pdf(temp_dir.path(), "2.pdf", 2, "Two"));
    files.push(create_test_pdf(temp_dir.path(), "3.pdf", 1, "Three"));

    // [1, 2, 3] -> [1, 3, 2] -> [3, 1, 2]
    files.move_up(2);
    files.move_up(1);
    // Boundary moves leave the order alone
    files.move_up(0);
    files.move_down(2);

    let output_path = temp_dir.path().join("reordered.pdf");
    let config = MergeConfig {
        mode: MergeMode::Multi { files },
        output_path: output_path.clone(),
        overwrite: OverwritePolicy::Overwrite,
    };

    let report = run(&config).expect("Failed to merge");
    assert_eq!(report.page_count, 4);
    assert_eq!(report.output_path, output_path);

    let mut expected = labels("Three", 1..=1);
    expected.extend(labels("One", 1..=1));
    expected.extend(labels("Two", 1..=2));
    assert_eq!(page_labels(&output_path), expected);
}

#[test]
fn test_empty_plan_fails() {
    let plan = MergePlan::new();
    let result = assemble(&plan);
    assert!(matches!(result, Err(Error::EmptyPlan)));
}

#[test]
fn test_plan_over_zero_page_document_is_empty() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let empty = create_test_pdf(temp_dir.path(), "empty.pdf", 0, "E");

    let sources = vec![SourceDocument::new(&empty)];
    let result = assemble(&multi_merge_plan(&sources));
    assert!(matches!(result, Err(Error::EmptyPlan)));

    // Starting right after the last page selects nothing either
    let a = create_test_pdf(temp_dir.path(), "a.pdf", 2, "A");
    let source = SourceDocument::new(&a);
    let mut plan = MergePlan::new();
    plan.push(PageSelection::from_page(&source, 2));
    assert!(matches!(assemble(&plan), Err(Error::EmptyPlan)));
}

#[test]
fn test_zero_page_document_contributes_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let empty = create_test_pdf(temp_dir.path(), "empty.pdf", 0, "E");
    let a = create_test_pdf(temp_dir.path(), "a.pdf", 2, "A");

    let sources = vec![SourceDocument::new(&empty), SourceDocument::new(&a)];
    let plan = multi_merge_plan(&sources);
    assert_eq!(plan.page_count().unwrap(), 2);

    let output_path = temp_dir.path().join("merged.pdf");
    let output = assemble(&plan).expect("Failed to assemble");
    assert_eq!(output.page_count(), 2);
    output.save(&output_path).expect("Failed to save");
    assert_eq!(page_labels(&output_path), labels("A", 1..=2));
}

#[test]
fn test_reassembly_produces_identical_pages() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let a = create_test_pdf(temp_dir.path(), "a.pdf", 3, "A");
    let b = create_test_pdf(temp_dir.path(), "b.pdf", 2, "B");
    let output_path = temp_dir.path().join("merged.pdf");

    let config = MergeConfig {
        mode: MergeMode::Multi {
            files: [a, b].into_iter().collect(),
        },
        output_path: output_path.clone(),
        overwrite: OverwritePolicy::Overwrite,
    };

    run(&config).expect("First run failed");
    let first_labels = page_labels(&output_path);
    let first_pages = page_dictionaries(&output_path).len();

    run(&config).expect("Second run failed");
    assert_eq!(page_labels(&output_path), first_labels);
    assert_eq!(page_dictionaries(&output_path).len(), first_pages);
}

#[test]
fn test_selections_share_one_open_source() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = create_test_pdf(temp_dir.path(), "doc.pdf", 4, "Doc");
    let output_path = temp_dir.path().join("picked.pdf");

    let source = SourceDocument::new(&path);
    assert!(!source.is_open());

    let mut plan = MergePlan::new();
    plan.push(PageSelection::range(&source, 2, 4).unwrap());
    plan.push(PageSelection::range(&source, 0, 1).unwrap());
    plan.push(PageSelection::range(&source, 0, 1).unwrap());
    assert_eq!(plan.page_count().unwrap(), 4);
    assert!(source.is_open());

    let output = assemble(&plan).expect("Failed to assemble");
    output.save(&output_path).expect("Failed to save");

    let expected: Vec<String> = ["Doc-Page-3", "Doc-Page-4", "Doc-Page-1", "Doc-Page-1"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(page_labels(&output_path), expected);
}

#[test]
fn test_selection_past_last_page_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = create_test_pdf(temp_dir.path(), "doc.pdf", 2, "Doc");
    let source = SourceDocument::new(&path);

    let mut plan = MergePlan::new();
    plan.push(PageSelection::range(&source, 1, 3).unwrap());

    let result = assemble(&plan);
    assert!(matches!(
        result,
        Err(Error::InvalidSelection {
            start: 1,
            end: Some(3),
            page_count: 2,
            ..
        })
    ));

    let mut plan = MergePlan::new();
    plan.push(PageSelection::from_page(&source, 3));
    assert!(matches!(
        assemble(&plan),
        Err(Error::InvalidSelection { .. })
    ));
}

#[test]
fn test_inherited_media_box_survives_assembly() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let inherited = create_test_pdf_with(
        temp_dir.path(),
        "inherited.pdf",
        2,
        "Inh",
        MediaBoxOn::PageTree,
        None,
    );
    let direct = create_test_pdf(temp_dir.path(), "direct.pdf", 1, "Dir");
    let output_path = temp_dir.path().join("merged.pdf");

    let sources = vec![SourceDocument::new(&inherited), SourceDocument::new(&direct)];
    assemble(&multi_merge_plan(&sources))
        .expect("Failed to assemble")
        .save(&output_path)
        .expect("Failed to save");

    for page in page_dictionaries(&output_path) {
        let media_box = page
            .get(b"MediaBox")
            .and_then(Object::as_array)
            .expect("every page keeps a MediaBox");
        assert_eq!(media_box[2].as_i64().unwrap(), 595);
        assert_eq!(media_box[3].as_i64().unwrap(), 842);
    }
}

#[test]
fn test_rotation_applies_to_selected_pages_only() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let signature_path = create_test_pdf(temp_dir.path(), "signature.pdf", 1, "Sig");
    let report_path = create_test_pdf(temp_dir.path(), "report.pdf", 3, "Report");
    let output_path = temp_dir.path().join("rotated.pdf");

    let signature = SourceDocument::new(&signature_path);
    let report = SourceDocument::new(&report_path);
    let plan = signed_merge_plan(
        &signature,
        &report,
        Rotation::NONE.rotate_left(),
        Rotation::NONE,
    )
    .unwrap();
    assemble(&plan).unwrap().save(&output_path).unwrap();

    let rotations: Vec<i64> = page_dictionaries(&output_path)
        .iter()
        .map(|page| page.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0))
        .collect();
    assert_eq!(rotations, vec![270, 0, 0]);

    // Rotation changes orientation only, never the content
    let mut expected = labels("Sig", 1..=1);
    expected.extend(labels("Report", 2..=3));
    assert_eq!(page_labels(&output_path), expected);
}

#[test]
fn test_unreadable_source_names_path_and_writes_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let good = create_test_pdf(temp_dir.path(), "good.pdf", 1, "Good");
    let bad = temp_dir.path().join("bad.pdf");
    fs::write(&bad, b"this is not a pdf").unwrap();
    let output_path = temp_dir.path().join("out.pdf");

    let config = MergeConfig {
        mode: MergeMode::Multi {
            files: [good, bad.clone()].into_iter().collect(),
        },
        output_path: output_path.clone(),
        overwrite: OverwritePolicy::Overwrite,
    };

    match run(&config) {
        Err(Error::SourceUnreadable { path, .. }) => assert_eq!(path, bad),
        other => panic!("expected SourceUnreadable, got {:?}", other),
    }
    assert!(!output_path.exists());
}

#[test]
fn test_nonexistent_source_is_unreadable() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let good = create_test_pdf(temp_dir.path(), "good.pdf", 1, "Good");
    let missing = temp_dir.path().join("nonexistent.pdf");

    let sources = vec![SourceDocument::new(&good), SourceDocument::new(&missing)];
    let result = assemble(&multi_merge_plan(&sources));

    let err = result.expect_err("Should fail with nonexistent file");
    assert!(matches!(err, Error::SourceUnreadable { .. }));
    assert!(
        err.to_string().contains("nonexistent"),
        "Error should mention the file: {}",
        err
    );
}

#[test]
fn test_unwritable_destination_is_write_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let a = create_test_pdf(temp_dir.path(), "a.pdf", 1, "A");
    let output_path = temp_dir.path().join("no-such-dir").join("out.pdf");

    let sources = vec![SourceDocument::new(&a)];
    let output = assemble(&multi_merge_plan(&sources)).expect("Failed to assemble");
    let result = output.save(&output_path);

    assert!(matches!(result, Err(Error::Write { .. })));
    assert!(!output_path.exists());
}

#[test]
fn test_save_new_keeps_file_created_after_check() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let a = create_test_pdf(temp_dir.path(), "a.pdf", 1, "A");
    let output_path = temp_dir.path().join("merged.pdf");

    let sources = vec![SourceDocument::new(&a)];
    let output = assemble(&multi_merge_plan(&sources)).expect("Failed to assemble");

    // Someone else takes the name while the output is held in memory
    fs::write(&output_path, b"theirs").unwrap();

    let result = output.save_new(&output_path);
    assert!(matches!(result, Err(Error::TargetExists(ref p)) if p == &output_path));
    assert_eq!(fs::read(&output_path).unwrap(), b"theirs");
}

#[test]
fn test_fail_policy_writes_missing_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let a = create_test_pdf(temp_dir.path(), "a.pdf", 1, "A");
    let b = create_test_pdf(temp_dir.path(), "b.pdf", 2, "B");
    let output_path = temp_dir.path().join("merged.pdf");

    let config = MergeConfig {
        mode: MergeMode::Multi {
            files: [a, b].into_iter().collect(),
        },
        output_path: output_path.clone(),
        overwrite: OverwritePolicy::Fail,
    };

    let report = run(&config).expect("Failed to merge");
    assert_eq!(report.output_path, output_path);
    assert_eq!(report.page_count, 3);
    assert!(matches!(run(&config), Err(Error::TargetExists(_))));
}

#[test]
fn test_versioned_policy_keeps_existing_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let a = create_test_pdf(temp_dir.path(), "a.pdf", 1, "A");
    let b = create_test_pdf(temp_dir.path(), "b.pdf", 1, "B");
    let output_path = temp_dir.path().join("merged.pdf");
    fs::write(&output_path, b"keep me").unwrap();

    let config = MergeConfig {
        mode: MergeMode::Multi {
            files: [a, b].into_iter().collect(),
        },
        output_path: output_path.clone(),
        overwrite: OverwritePolicy::Version,
    };

    let report = run(&config).expect("Failed to merge");
    assert_eq!(report.output_path, temp_dir.path().join("merged_V2.pdf"));
    assert_eq!(fs::read(&output_path).unwrap(), b"keep me");
    assert_eq!(count_pages(&report.output_path).unwrap(), 2);
}

#[test]
fn test_extract_metadata_reads_title_and_pages() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = create_test_pdf_with(
        temp_dir.path(),
        "titled.pdf",
        3,
        "T",
        MediaBoxOn::Page,
        Some("Quarterly Report"),
    );

    let metadata = extract_metadata(&path).expect("Failed to read metadata");
    assert_eq!(metadata.page_count, 3);
    assert_eq!(metadata.title.as_deref(), Some("Quarterly Report"));
    assert!(metadata.author.is_none());
}
