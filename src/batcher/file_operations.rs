use crate::batcher::BatchPlan;
use crate::error::{FitBatchError, Result};
use crate::extractor::FileRecord;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CopyProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub bytes_processed: u64,
    pub current_file: Option<String>,
    pub start_time: Instant,
    pub errors: Vec<String>,
}

impl CopyProgress {
    pub fn new(total_files: usize) -> Self {
        Self {
            files_processed: 0,
            total_files,
            bytes_processed: 0,
            current_file: None,
            start_time: Instant::now(),
            errors: Vec::new(),
        }
    }

    pub fn update_file(&mut self, filename: String, bytes: u64) {
        self.files_processed += 1;
        self.bytes_processed += bytes;
        self.current_file = Some(filename);
    }

    pub fn add_error<S: Into<String>>(&mut self, error: S) {
        self.errors.push(error.into());
    }

    pub fn percentage(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.files_processed as f64 / self.total_files as f64) * 100.0
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// A selected file after it landed in the flat output folder.
#[derive(Debug, Clone, PartialEq)]
pub struct CopiedFile {
    pub display_name: String,
    pub dest_path: PathBuf,
    pub min_timestamp: Option<DateTime<Utc>>,
    pub bytes: u64,
}

impl CopiedFile {
    pub fn file_name(&self) -> String {
        self.dest_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string()
    }
}

#[derive(Debug)]
pub struct CopyOutcome {
    pub copied: Vec<CopiedFile>,
    pub progress: CopyProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub name: String,
    pub path: PathBuf,
    pub files: Vec<String>,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub batches: Vec<BatchSummary>,
    pub errors: Vec<String>,
}

impl BatchOutcome {
    pub fn files_batched(&self) -> usize {
        self.batches.iter().map(|b| b.files.len()).sum()
    }
}

pub struct FileOperations {
    buffer_size: usize,
}

impl FileOperations {
    pub fn new() -> Self {
        Self {
            buffer_size: 64 * 1024,
        }
    }

    /// Copies every selected record into `output_dir` without subfolders.
    /// A failed copy is recorded in the progress and the rest continue.
    pub fn copy_flat(
        &self,
        records: &[&FileRecord],
        output_dir: &Path,
        progress_callback: Option<&dyn Fn(&CopyProgress)>,
    ) -> Result<CopyOutcome> {
        let mut progress = CopyProgress::new(records.len());
        let mut copied = Vec::with_capacity(records.len());

        fs::create_dir_all(output_dir)?;

        for record in records {
            if let Some(callback) = progress_callback {
                callback(&progress);
            }

            match self.copy_record(record, output_dir) {
                Ok(file) => {
                    debug!("Copied {} -> {}", record.display_name, file.dest_path.display());
                    progress.update_file(file.file_name(), file.bytes);
                    copied.push(file);
                }
                Err(e) => {
                    let message = format!("Failed to copy {}: {}", record.display_name, e);
                    error!("{}", message);
                    progress.add_error(message);
                }
            }
        }

        if let Some(callback) = progress_callback {
            callback(&progress);
        }

        Ok(CopyOutcome { copied, progress })
    }

    fn copy_record(&self, record: &FileRecord, output_dir: &Path) -> Result<CopiedFile> {
        let file_name = record
            .source_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(sanitize_filename)
            .ok_or_else(|| FitBatchError::InvalidPath {
                path: record.source_path.display().to_string(),
            })?;

        let dest_path = unique_destination(output_dir, &file_name);
        let bytes = self.secure_copy(&record.source_path, &dest_path)?;

        Ok(CopiedFile {
            display_name: record.display_name.clone(),
            dest_path,
            min_timestamp: record.min_timestamp,
            bytes,
        })
    }

    /// Places the flat copies into numbered batch folders under `output_dir`.
    /// Files are moved unless `keep_flat` is set, in which case they are copied.
    pub fn move_into_batches(
        &self,
        plan: &BatchPlan<CopiedFile>,
        output_dir: &Path,
        prefix: &str,
        keep_flat: bool,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (name, files) in plan.named_batches(prefix) {
            let batch_dir = output_dir.join(&name);
            if let Err(e) = fs::create_dir_all(&batch_dir) {
                let message = format!("Failed to create {}: {}", batch_dir.display(), e);
                error!("{}", message);
                outcome.errors.push(message);
                continue;
            }

            let mut summary = BatchSummary {
                name,
                path: batch_dir.clone(),
                files: Vec::with_capacity(files.len()),
            };

            for file in files {
                let dest = batch_dir.join(file.file_name());
                let placed = if keep_flat {
                    self.copy_file_with_buffer(&file.dest_path, &dest).map(|_| ())
                } else {
                    move_file(&file.dest_path, &dest)
                };

                match placed {
                    Ok(()) => summary.files.push(file.file_name()),
                    Err(e) => {
                        let message = format!(
                            "Failed to place {} in {}: {}",
                            file.dest_path.display(),
                            summary.name,
                            e
                        );
                        warn!("{}", message);
                        outcome.errors.push(message);
                    }
                }
            }

            debug!("{}: {} files", summary.name, summary.files.len());
            outcome.batches.push(summary);
        }

        outcome
    }

    /// Copies each path into `dir`, returning one message per failure.
    pub fn copy_into_dir(&self, sources: &[&Path], dir: &Path) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = fs::create_dir_all(dir) {
            errors.push(format!("Failed to create {}: {}", dir.display(), e));
            return errors;
        }

        for source in sources {
            let Some(file_name) = source.file_name().and_then(|n| n.to_str()) else {
                errors.push(format!("Invalid file name: {}", source.display()));
                continue;
            };

            let dest = unique_destination(dir, &sanitize_filename(file_name));
            if let Err(e) = self.secure_copy(source, &dest) {
                let message = format!("Failed to copy {} to {}: {}", source.display(), dir.display(), e);
                warn!("{}", message);
                errors.push(message);
            }
        }

        errors
    }

    fn secure_copy(&self, source: &Path, dest: &Path) -> Result<u64> {
        if !source.is_file() {
            return Err(FitBatchError::InvalidPath {
                path: format!("Source is not a file: {}", source.display()),
            });
        }

        if dest.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(FitBatchError::InvalidPath {
                path: format!("Directory traversal not allowed: {}", dest.display()),
            });
        }

        if dest.exists() {
            return Err(FitBatchError::InvalidPath {
                path: format!("Destination already exists: {}", dest.display()),
            });
        }

        self.copy_file_with_buffer(source, dest)
    }

    fn copy_file_with_buffer(&self, source: &Path, dest: &Path) -> Result<u64> {
        let source_file = fs::File::open(source)?;
        let dest_file = fs::File::create(dest)?;

        let mut reader = BufReader::with_capacity(self.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.buffer_size, dest_file);

        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; 8192];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            writer.write_all(&buffer[..bytes_read])?;
            total_bytes += bytes_read as u64;
        }

        writer.flush()?;

        // Keep the source's mtime on the copy
        if let Ok(modified_time) = fs::metadata(source).and_then(|m| m.modified()) {
            let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(modified_time));
        }

        Ok(total_bytes)
    }
}

impl Default for FileOperations {
    fn default() -> Self {
        Self::new()
    }
}

fn move_file(source: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Err(FitBatchError::InvalidPath {
            path: format!("Destination already exists: {}", dest.display()),
        });
    }

    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            // rename fails across filesystems
            fs::copy(source, dest)?;
            fs::remove_file(source)?;
            Ok(())
        }
    }
}

/// Returns `dir/file_name`, or `dir/stem_N.ext` with the first free `N`.
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(file_name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(file_name);
    let extension = path.extension().and_then(|e| e.to_str());

    (1..)
        .map(|n| match extension {
            Some(ext) => dir.join(format!("{}_{}.{}", stem, n, ext)),
            None => dir.join(format!("{}_{}", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Removes everything inside `dir`, creating it when missing.
pub fn clear_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }

    Ok(())
}

pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|ch| match ch {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim_end_matches(&['.', ' '][..]);
    if sanitized.is_empty() {
        "unnamed_file".to_string()
    } else {
        sanitized.to_string()
    }
}
