//! Caller-owned merge configuration
//!
//! Everything a front end collects from the user (mode, files, order,
//! rotations, destination) goes into a [`MergeConfig`], which [`run`] turns
//! into a plan, assembles and writes. The library keeps no state of its own
//! between runs.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::order::MergeList;
use crate::pdf::assemble;
use crate::plan::{multi_merge_plan, signed_merge_plan, MergePlan, Rotation, SourceDocument};
use crate::storage::resolve_versioned_target_path;

/// Which of the two merge modes to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeMode {
    /// Signature pages, then the report without its first page
    Signed {
        signature: PathBuf,
        report: PathBuf,
        signature_rotation: Rotation,
        report_rotation: Rotation,
    },
    /// Every page of every listed file, in list order
    Multi { files: MergeList },
}

/// What to do when the destination already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Replace the existing file
    #[default]
    Overwrite,
    /// Refuse with [`Error::TargetExists`] before reading any input, and
    /// again if the file appears while the output is being assembled
    Fail,
    /// Write next to it as `name_V2.pdf`, `name_V3.pdf`, ...; a version
    /// taken in the meantime is reported as [`Error::TargetExists`]
    Version,
}

/// Options for one assembly run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    pub mode: MergeMode,
    /// Output PDF file path
    pub output_path: PathBuf,
    pub overwrite: OverwritePolicy,
}

/// What a successful run wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Where the PDF was written; differs from the requested path under
    /// [`OverwritePolicy::Version`]
    pub output_path: PathBuf,
    pub page_count: usize,
}

impl MergeConfig {
    /// Destination after applying the overwrite policy
    pub fn resolve_output_path(&self) -> Result<PathBuf> {
        let path = &self.output_path;
        if !path.exists() {
            return Ok(path.clone());
        }

        match self.overwrite {
            OverwritePolicy::Overwrite => Ok(path.clone()),
            OverwritePolicy::Fail => Err(Error::TargetExists(path.clone())),
            OverwritePolicy::Version => {
                let dir = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(resolve_versioned_target_path(&dir, &filename))
            }
        }
    }
}

/// Build the plan described by `config`, assemble it and write the output
///
/// Sources are opened for the duration of the call and closed on every exit
/// path when they go out of scope.
pub fn run(config: &MergeConfig) -> Result<AssemblyReport> {
    let output_path = config.resolve_output_path()?;
    debug!(output = %output_path.display(), "resolved destination");

    let page_count = match &config.mode {
        MergeMode::Signed {
            signature,
            report,
            signature_rotation,
            report_rotation,
        } => {
            let signature = SourceDocument::new(signature);
            let report = SourceDocument::new(report);
            let plan =
                signed_merge_plan(&signature, &report, *signature_rotation, *report_rotation)?;
            write_plan(&plan, &output_path, config.overwrite)?
        }
        MergeMode::Multi { files } => {
            let sources = files.open_all();
            let plan = multi_merge_plan(&sources);
            write_plan(&plan, &output_path, config.overwrite)?
        }
    };

    Ok(AssemblyReport {
        output_path,
        page_count,
    })
}

fn write_plan(plan: &MergePlan<'_>, output_path: &Path, policy: OverwritePolicy) -> Result<usize> {
    match policy {
        OverwritePolicy::Overwrite => assemble::assemble_to(plan, output_path),
        OverwritePolicy::Fail | OverwritePolicy::Version => {
            let output = assemble::assemble(plan)?;
            let page_count = output.page_count();
            output.save_new(output_path)?;
            Ok(page_count)
        }
    }
}
