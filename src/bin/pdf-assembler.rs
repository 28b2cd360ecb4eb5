//! PDF Assembler CLI tool
//!
//! A command-line tool for putting signature pages in front of reports and
//! for merging ordered lists of PDFs.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use glob::glob;
use tracing::Level;

use pdf_assembler::config::{run, AssemblyReport, MergeConfig, MergeMode, OverwritePolicy};
use pdf_assembler::order::MergeList;
use pdf_assembler::pdf::extract_metadata;
use pdf_assembler::plan::Rotation;
use pdf_assembler::storage::{
    build_default_signed_filename, find_existing_signed_pdfs, move_or_copy_merged_pdf,
    resolve_report_pdf_folder, resolve_versioned_target_path,
};

/// PDF Assembler - Combine signature pages with reports and merge PDFs
#[derive(Parser)]
#[command(name = "pdf-assembler")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Signature page(s) followed by the report minus its cover page
    pdf-assembler signed --signature sign.pdf --report report.pdf -o signed.pdf

    # Merge files in the given order, moving the third one up by one place
    pdf-assembler merge -o all.pdf a.pdf b.pdf c.pdf --move-up 2

    # Merge numbered PDFs in order without replacing an existing output
    pdf-assembler merge -o handout.pdf \"[0-9]*.pdf\" --versioned

    # Store a signed report in the test's report folder
    pdf-assembler store signed.pdf --main-path /tests/2026-077 --test-no 2026/077")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Destination options shared by the merging commands
#[derive(Args)]
struct OutputArgs {
    /// Output PDF file path
    #[arg(short, long)]
    output: PathBuf,

    /// Fail instead of replacing an existing output file
    #[arg(long, conflicts_with = "versioned")]
    no_overwrite: bool,

    /// Write name_V2.pdf, name_V3.pdf, ... when the output file exists
    #[arg(long)]
    versioned: bool,

    /// Open the output file after creation
    #[arg(long)]
    open: bool,
}

impl OutputArgs {
    fn policy(&self) -> OverwritePolicy {
        overwrite_policy(self.no_overwrite, self.versioned)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Put a signature PDF in front of a report, dropping the report's first page
    Signed {
        /// Signature page PDF (all of its pages are kept)
        #[arg(long)]
        signature: PathBuf,

        /// Report PDF (needs at least 2 pages; page 1 is dropped)
        #[arg(long)]
        report: PathBuf,

        /// Rotate the signature pages clockwise by this many degrees (multiple of 90)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        rotate_signature: i32,

        /// Rotate the report pages clockwise by this many degrees (multiple of 90)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        rotate_report: i32,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Merge multiple PDF files into one, in the given order
    Merge {
        /// Input PDF files (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Remove the entry at this 0-based index of the input list (applied
        /// first, repeatable; every index refers to the list before removal)
        #[arg(long, value_name = "INDEX")]
        remove: Vec<usize>,

        /// Swap the entry at this 0-based index with the one before it (repeatable)
        #[arg(long, value_name = "INDEX")]
        move_up: Vec<usize>,

        /// Swap the entry at this 0-based index with the one after it (repeatable)
        #[arg(long, value_name = "INDEX")]
        move_down: Vec<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },

    /// Copy a merged PDF into a test's report folder
    Store {
        /// Merged PDF to store
        merged: PathBuf,

        /// Test main path containing the "report files" folder
        #[arg(long)]
        main_path: PathBuf,

        /// Test number used for the default file name (e.g. 2026/077)
        #[arg(long)]
        test_no: String,

        /// File name to store under (defaults to <test_no>_Report_Signed.pdf)
        #[arg(long)]
        filename: Option<String>,

        /// Fail instead of replacing an existing file
        #[arg(long, conflicts_with = "versioned")]
        no_overwrite: bool,

        /// Store as _V2, _V3, ... when the file name is taken
        #[arg(long)]
        versioned: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Signed {
            signature,
            report,
            rotate_signature,
            rotate_report,
            output,
        } => cmd_signed(signature, report, rotate_signature, rotate_report, output),
        Commands::Merge {
            inputs,
            remove,
            move_up,
            move_down,
            output,
        } => cmd_merge(inputs, remove, move_up, move_down, output),
        Commands::Info { input } => cmd_info(&input),
        Commands::Store {
            merged,
            main_path,
            test_no,
            filename,
            no_overwrite,
            versioned,
        } => cmd_store(&merged, &main_path, &test_no, filename, no_overwrite, versioned),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn overwrite_policy(no_overwrite: bool, versioned: bool) -> OverwritePolicy {
    if versioned {
        OverwritePolicy::Version
    } else if no_overwrite {
        OverwritePolicy::Fail
    } else {
        OverwritePolicy::Overwrite
    }
}

/// Expand glob patterns in input paths
///
/// Matches of one pattern are sorted; the patterns themselves keep the order
/// they were given in.
fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched = Vec::new();
            let entries =
                glob(&pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))?;
            for entry in entries {
                match entry {
                    Ok(path) => matched.push(path),
                    Err(e) => tracing::warn!("glob error for {}: {}", pattern, e),
                }
            }
            if matched.is_empty() {
                bail!("No PDF files found matching pattern: {}", pattern);
            }
            matched.sort();
            paths.extend(matched);
        } else {
            // No glob characters, treat as literal path
            paths.push(PathBuf::from(pattern));
        }
    }

    Ok(paths)
}

/// Open a file with the system default application
fn open_file(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

fn finish(report: AssemblyReport, open: bool) -> Result<()> {
    eprintln!(
        "Wrote {} pages to: {}",
        report.page_count,
        report.output_path.display()
    );

    if open {
        open_file(&report.output_path)?;
    }

    Ok(())
}

/// Signature pages followed by the report minus its first page
fn cmd_signed(
    signature: PathBuf,
    report: PathBuf,
    rotate_signature: i32,
    rotate_report: i32,
    output: OutputArgs,
) -> Result<()> {
    let signature_rotation =
        Rotation::from_degrees(rotate_signature).context("Invalid --rotate-signature")?;
    let report_rotation =
        Rotation::from_degrees(rotate_report).context("Invalid --rotate-report")?;

    eprintln!(
        "Merging signature {} with report {}...",
        signature.display(),
        report.display()
    );

    let config = MergeConfig {
        overwrite: output.policy(),
        output_path: output.output,
        mode: MergeMode::Signed {
            signature,
            report,
            signature_rotation,
            report_rotation,
        },
    };

    let report = run(&config).context("Signed merge failed")?;
    finish(report, output.open)
}

/// Merge multiple PDFs into one
fn cmd_merge(
    inputs: Vec<String>,
    remove: Vec<usize>,
    move_up: Vec<usize>,
    move_down: Vec<usize>,
    output: OutputArgs,
) -> Result<()> {
    let mut files: MergeList = expand_globs(inputs)?.into_iter().collect();

    if let Err(index) = files.remove_many(&remove) {
        bail!("--remove {} is out of range ({} files)", index, files.len());
    }
    for index in move_up {
        files.move_up(index);
    }
    for index in move_down {
        files.move_down(index);
    }

    if files.len() < 2 {
        bail!("Select at least 2 PDF files to merge ({} given)", files.len());
    }

    eprintln!("Merging {} PDF files:", files.len());
    for (position, path) in files.paths().iter().enumerate() {
        eprintln!("  {}. {}", position + 1, path.display());
    }

    let config = MergeConfig {
        mode: MergeMode::Multi { files },
        overwrite: output.policy(),
        output_path: output.output,
    };

    let report = run(&config).context("Merge failed")?;
    finish(report, output.open)
}

/// Show information about a PDF
fn cmd_info(input: &Path) -> Result<()> {
    let metadata = extract_metadata(input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);
    println!("PDF version: {}", metadata.version);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }

    Ok(())
}

/// Copy a merged PDF into the report folder of a test
fn cmd_store(
    merged: &Path,
    main_path: &Path,
    test_no: &str,
    filename: Option<String>,
    no_overwrite: bool,
    versioned: bool,
) -> Result<()> {
    let folder = resolve_report_pdf_folder(main_path)?;

    let existing = find_existing_signed_pdfs(&folder, test_no)?;
    if !existing.is_empty() {
        eprintln!("Existing signed reports for {}:", test_no);
        for path in &existing {
            eprintln!("  {}", path.display());
        }
    }

    let mut filename = filename.unwrap_or_else(|| build_default_signed_filename(test_no));
    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        filename.push_str(".pdf");
    }

    let stored = match overwrite_policy(no_overwrite, versioned) {
        OverwritePolicy::Version => {
            let target = resolve_versioned_target_path(&folder, &filename);
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(filename);
            move_or_copy_merged_pdf(merged, &folder, &name, false)?
        }
        OverwritePolicy::Fail => move_or_copy_merged_pdf(merged, &folder, &filename, false)?,
        OverwritePolicy::Overwrite => move_or_copy_merged_pdf(merged, &folder, &filename, true)?,
    };

    eprintln!("Stored: {}", stored.display());
    Ok(())
}
