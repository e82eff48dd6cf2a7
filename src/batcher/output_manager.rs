use crate::batcher::BatchSummary;
use crate::error::{FitBatchError, Result};
use crate::filter::CutoffPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const METADATA_DIR: &str = ".fitbatch";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub files_scanned: usize,
    pub archives_scanned: usize,
    pub with_timestamp: usize,
    pub parse_errors: usize,
    pub selected: usize,
    pub copied: usize,
    pub batched: usize,
    pub batches: usize,
    pub bytes_copied: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub output_csv: PathBuf,
    pub cutoff: DateTime<Utc>,
    pub policy: CutoffPolicy,
    pub batch_size: usize,
    pub counts: RunCounts,
    pub batches: Vec<BatchSummary>,
    pub errors: Vec<String>,
    pub duration: Duration,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// What a dry run would produce, without touching the disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunPlan {
    pub files_scanned: usize,
    pub csv_rows: usize,
    pub parse_errors: usize,
    pub selected: usize,
    pub batch_size: usize,
    pub batches: Vec<PlannedBatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedBatch {
    pub name: String,
    pub files: Vec<String>,
}

/// Owns the output folder: checks it before a run and writes the run report into it.
pub struct OutputManager {
    output_directory: PathBuf,
    force_overwrite: bool,
}

impl OutputManager {
    pub fn new<P: Into<PathBuf>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.into(),
            force_overwrite: false,
        }
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn get_metadata_dir(&self) -> PathBuf {
        self.output_directory.join(METADATA_DIR)
    }

    /// A missing or empty folder is fine. A non-empty one needs `force`.
    pub fn check(&self) -> Result<()> {
        if !self.output_directory.exists() {
            return Ok(());
        }

        if !self.output_directory.is_dir() {
            return Err(FitBatchError::InvalidPath {
                path: format!("{} is not a directory", self.output_directory.display()),
            });
        }

        let is_empty = fs::read_dir(&self.output_directory)?.next().is_none();
        if !is_empty && !self.force_overwrite {
            return Err(FitBatchError::OutputDirectoryExists {
                path: self.output_directory.display().to_string(),
            });
        }

        Ok(())
    }

    /// Creates the folder, emptying it first when forced.
    pub fn initialize(&self) -> Result<()> {
        self.check()?;

        if self.output_directory.exists() && self.force_overwrite {
            crate::batcher::clear_directory(&self.output_directory)?;
        }

        fs::create_dir_all(&self.output_directory).map_err(|e| FitBatchError::Permission {
            path: format!(
                "Cannot create output directory {}: {}",
                self.output_directory.display(),
                e
            ),
        })?;

        self.validate_writable()
    }

    fn validate_writable(&self) -> Result<()> {
        let test_file = self.output_directory.join(".fitbatch_write_test");
        match fs::File::create(&test_file) {
            Ok(_) => {
                let _ = fs::remove_file(&test_file);
                Ok(())
            }
            Err(e) => Err(FitBatchError::Permission {
                path: format!(
                    "No write permission for directory {}: {}",
                    self.output_directory.display(),
                    e
                ),
            }),
        }
    }

    pub fn write_report(&self, report: &RunReport) -> Result<()> {
        fs::create_dir_all(self.get_metadata_dir())?;
        self.save_report_json(report)?;
        self.save_report_text(report)
    }

    fn save_report_json(&self, report: &RunReport) -> Result<()> {
        let report_path = self.get_metadata_dir().join("report.json");
        let json_content =
            serde_json::to_string_pretty(report).map_err(|e| FitBatchError::Config {
                message: format!("Failed to serialize report to JSON: {}", e),
            })?;

        fs::write(&report_path, json_content)?;
        Ok(())
    }

    fn save_report_text(&self, report: &RunReport) -> Result<()> {
        let report_path = self.get_metadata_dir().join("report.txt");
        let mut file = fs::File::create(&report_path)?;
        let counts = &report.counts;

        writeln!(file, "fitbatch Run Report")?;
        writeln!(file, "===================")?;
        writeln!(file)?;
        writeln!(file, "Input folder: {}", report.input_folder.display())?;
        writeln!(file, "Output folder: {}", report.output_folder.display())?;
        writeln!(file, "CSV report: {}", report.output_csv.display())?;
        writeln!(
            file,
            "Cutoff: {} ({:?})",
            report.cutoff.format("%Y-%m-%d"),
            report.policy
        )?;
        writeln!(file, "Batch size: {}", report.batch_size)?;
        writeln!(
            file,
            "Finished at: {}",
            report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(file, "Duration: {:?}", report.duration)?;
        writeln!(file)?;

        writeln!(file, "Counts:")?;
        writeln!(file, "  Files scanned: {}", counts.files_scanned)?;
        writeln!(file, "  Archives opened: {}", counts.archives_scanned)?;
        writeln!(file, "  With timestamp: {}", counts.with_timestamp)?;
        writeln!(file, "  Parse errors: {}", counts.parse_errors)?;
        writeln!(file, "  Selected: {}", counts.selected)?;
        writeln!(
            file,
            "  Copied: {} ({})",
            counts.copied,
            format_bytes(counts.bytes_copied)
        )?;
        writeln!(file, "  Batched: {} in {} batches", counts.batched, counts.batches)?;
        writeln!(file)?;

        if !report.batches.is_empty() {
            writeln!(file, "Batches:")?;
            for batch in &report.batches {
                writeln!(file, "  {} ({} files)", batch.name, batch.files.len())?;
                for name in &batch.files {
                    writeln!(file, "    {}", name)?;
                }
            }
            writeln!(file)?;
        }

        if report.has_errors() {
            writeln!(file, "Errors encountered:")?;
            for error in &report.errors {
                writeln!(file, "  - {}", error)?;
            }
        }

        Ok(())
    }
}

/// Fails when clearing `folder` would delete any part of `input`.
pub fn ensure_outside_input(folder: &Path, input: &Path) -> Result<()> {
    let folder_abs = resolve_path(folder)?;
    let input_abs = resolve_path(input)?;

    if input_abs.starts_with(&folder_abs) {
        return Err(FitBatchError::OverlapsInput {
            folder: folder.display().to_string(),
            input: input.display().to_string(),
        });
    }

    Ok(())
}

/// Canonicalizes the longest existing prefix of `path` so that folders
/// which do not exist yet still compare correctly.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return Ok(missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
