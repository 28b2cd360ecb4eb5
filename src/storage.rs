//! Storing merged reports in a test's report folder
//!
//! Signed reports live under `<main_path>/report files/5 Report PDF`, or
//! directly in `report files` when the numbered folder does not exist. File
//! names are derived from the test number, with `_V2`, `_V3`, ... suffixes
//! when earlier versions are already present.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Directory under `main_path` holding report files (compared case-insensitively)
const REPORT_FILES_DIR: &str = "report files";

/// Normalized name of the preferred sub-folder for final report PDFs
const REPORT_PDF_DIR: &str = "5reportpdf";

const SIGNED_SUFFIX: &str = "_Report_Signed";

/// Keep ASCII letters and digits only, lowercased
///
/// `"5 Report PDF"` and `"5-ReportPdf"` both become `"5reportpdf"`.
pub fn normalize_folder_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Find the folder a signed report for the test at `main_path` belongs in
pub fn resolve_report_pdf_folder(main_path: &Path) -> Result<PathBuf> {
    if !main_path.is_dir() {
        return Err(Error::ReportFolder(format!(
            "main path is missing or not a directory: {}",
            main_path.display()
        )));
    }

    let report_files = child_dirs(main_path)?
        .into_iter()
        .find(|dir| {
            dir.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_lowercase() == REPORT_FILES_DIR)
        })
        .ok_or_else(|| {
            Error::ReportFolder(format!(
                "no '{}' folder under {}",
                REPORT_FILES_DIR,
                main_path.display()
            ))
        })?;

    let special = child_dirs(&report_files)?.into_iter().find(|dir| {
        dir.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| normalize_folder_name(n) == REPORT_PDF_DIR)
    });

    let resolved = special.unwrap_or(report_files);
    debug!(folder = %resolved.display(), "resolved report folder");
    Ok(resolved)
}

/// Child directories of `dir`, sorted by name so lookups are deterministic
fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Make a test number safe to embed in a file name
///
/// `"2026/077"` becomes `"2026_077"`.
pub fn sanitize_test_no_for_filename(test_no: &str) -> String {
    test_no
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Default file name of the signed report for `test_no`
pub fn build_default_signed_filename(test_no: &str) -> String {
    format!(
        "{}{}.pdf",
        sanitize_test_no_for_filename(test_no),
        SIGNED_SUFFIX
    )
}

/// `dir/filename` if free, otherwise the first free `stem_V{n}.ext` for n >= 2
pub fn resolve_versioned_target_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(filename);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (2u32..)
        .map(|version| dir.join(format!("{stem}_V{version}{extension}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Signed reports already stored in `dir` for `test_no`
///
/// The unversioned file comes first, then `_V2`, `_V3`, ... in version order.
pub fn find_existing_signed_pdfs(dir: &Path, test_no: &str) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}{}", sanitize_test_no_for_filename(test_no), SIGNED_SUFFIX);

    let mut found: Vec<(u32, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(version) = signed_version(name, &prefix) {
            found.push((version, path));
        }
    }

    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Version of a stored signed report name: 1 for the base name, n for `_V{n}`
fn signed_version(name: &str, prefix: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let rest = lower.strip_suffix(".pdf")?;
    let rest = name[..rest.len()].strip_prefix(prefix)?;

    if rest.is_empty() {
        return Some(1);
    }
    rest.strip_prefix("_V")?.parse().ok().filter(|v| *v >= 2)
}

/// Copy a merged PDF into `target_dir` under `filename`
///
/// An empty `filename` keeps the merged file's own name, and `.pdf` is
/// appended when missing. With `overwrite` false an existing target is an
/// error. The copy is written next to the target and renamed into place.
pub fn move_or_copy_merged_pdf(
    merged_pdf: &Path,
    target_dir: &Path,
    filename: &str,
    overwrite: bool,
) -> Result<PathBuf> {
    if !merged_pdf.is_file() {
        return Err(Error::unreadable(merged_pdf, "merged PDF not found"));
    }
    if !target_dir.is_dir() {
        return Err(Error::ReportFolder(format!(
            "target folder not found: {}",
            target_dir.display()
        )));
    }

    let mut name = match filename.trim() {
        "" => merged_pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        trimmed => trimmed.to_string(),
    };
    if !name.to_ascii_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }

    let target = target_dir.join(name);
    if target.exists() && !overwrite {
        return Err(Error::TargetExists(target));
    }

    let bytes = fs::read(merged_pdf).map_err(|e| Error::unreadable(merged_pdf, e))?;
    if overwrite {
        write_file_atomically(&target, &bytes)?;
    } else {
        write_new_file_atomically(&target, &bytes)?;
    }

    info!(from = %merged_pdf.display(), to = %target.display(), "stored merged PDF");
    Ok(target)
}

/// Write `bytes` to `path` through a temporary file in the same directory
///
/// The temporary file is renamed over `path` only after every byte has been
/// written and flushed; on failure it is removed and `path` is untouched.
pub fn write_file_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    staged_temp_file(path, bytes)?
        .persist(path)
        .map_err(|e| Error::write(path, e.error))?;
    Ok(())
}

/// Like [`write_file_atomically`], but never replaces an existing file
///
/// The final rename itself refuses an existing `path`, so a file that shows up
/// after the caller checked for it is kept and reported as
/// [`Error::TargetExists`].
pub fn write_new_file_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    staged_temp_file(path, bytes)?
        .persist_noclobber(path)
        .map_err(|e| match e.error.kind() {
            io::ErrorKind::AlreadyExists => Error::TargetExists(path.to_path_buf()),
            _ => Error::write(path, e.error),
        })?;
    Ok(())
}

/// Fully written and synced temporary file next to `path`
fn staged_temp_file(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::write(path, e))?;
    temp.write_all(bytes).map_err(|e| Error::write(path, e))?;
    temp.as_file().sync_all().map_err(|e| Error::write(path, e))?;
    Ok(temp)
}
