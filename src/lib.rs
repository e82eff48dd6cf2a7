pub mod batcher;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod report;
pub mod scanner;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{BatchConfig, CliOverrides, Config, FilterConfig, OutputConfig, ScanConfig};
pub use error::{FitBatchError, Result, UserFriendlyError};

pub use batcher::{
    BatchPlan, BatchSummary, DryRunPlan, FileOperations, OutputManager, PlannedBatch, RunCounts,
    RunReport,
};
pub use extractor::{FileRecord, TimestampExtractor, TimestampScope};
pub use filter::{parse_cutoff_date, CutoffFilter, CutoffPolicy};
pub use scanner::{ActivityScanner, ActivitySource, ScanResult};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task;

/// Where a run reads from and writes to.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input_folder: PathBuf,
    pub output_csv: PathBuf,
    pub output_folder: PathBuf,
    pub cutoff: DateTime<Utc>,
    pub force: bool,
}

impl RunRequest {
    pub fn new<P: Into<PathBuf>>(
        input_folder: P,
        output_csv: P,
        output_folder: P,
        cutoff_date: &str,
    ) -> Result<Self> {
        Ok(Self {
            input_folder: input_folder.into(),
            output_csv: output_csv.into(),
            output_folder: output_folder.into(),
            cutoff: parse_cutoff_date(cutoff_date)?,
            force: false,
        })
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Main library interface: scan, extract, report, filter and batch.
pub struct FitBatch {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl FitBatch {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let shutdown = GracefulShutdown::new()?;
        Ok(Self::with_shutdown(config, output_mode, verbose, quiet, shutdown))
    }

    /// Same as [`FitBatch::new`] but without installing a Ctrl+C handler,
    /// which can only be registered once per process.
    pub fn without_signal_handler(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
    ) -> Self {
        Self::with_shutdown(config, output_mode, verbose, quiet, GracefulShutdown::detached())
    }

    fn with_shutdown(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        // Progress bars would corrupt machine-readable output
        let show_progress = !quiet && output_mode == OutputMode::Human;

        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(show_progress),
            shutdown,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Self::new(config, cli_args.output_mode(), cli_args.verbose, cli_args.quiet)
    }

    pub async fn run(&self, request: &RunRequest) -> Result<RunReport> {
        let start_time = Instant::now();

        self.config.validate()?;
        self.shutdown.check_shutdown()?;
        ActivityScanner::validate_root(&request.input_folder)?;
        self.ensure_writable_folders_outside_input(request)?;

        let output_manager =
            OutputManager::new(&request.output_folder).with_force_overwrite(request.force);
        output_manager.initialize()?;

        if let Some(ref error_dir) = self.config.output.error_dir {
            batcher::clear_directory(error_dir)?;
        }

        self.output_formatter.start_operation("Scanning for activity files");
        let scan = self.scan(&request.input_folder).await?;
        self.shutdown.check_shutdown()?;

        self.output_formatter.start_operation("Extracting minimum timestamps");
        let records = self.extract(&scan.sources).await?;
        self.shutdown.check_shutdown()?;

        report::write_csv(&request.output_csv, &records)?;
        self.output_formatter.info(&format!(
            "Wrote {} rows to {}",
            records.len(),
            request.output_csv.display()
        ));

        if let Some(ref summary_csv) = self.config.output.summary_csv {
            let rows = report::write_summary_csv(summary_csv, &records)?;
            self.output_formatter.info(&format!(
                "Wrote {} session rows to {}",
                rows,
                summary_csv.display()
            ));
        }

        let mut errors = scan.errors.clone();
        errors.extend(record_errors(&records));

        if let Some(ref error_dir) = self.config.output.error_dir {
            errors.extend(self.copy_failed_files(&records, error_dir));
        }

        let filter = CutoffFilter::new(request.cutoff, self.config.filter.policy);
        let selected = filter.select(&records);
        info!(
            "{} of {} files selected ({:?} {})",
            selected.len(),
            records.len(),
            filter.policy(),
            filter.cutoff()
        );
        self.shutdown.check_shutdown()?;

        self.output_formatter.start_operation("Copying selected files");
        let file_ops = FileOperations::new();
        let copy_bar = self.progress_manager.create_copy_progress(selected.len() as u64);
        let progress_callback = {
            let pb = copy_bar.clone();
            move |progress: &batcher::CopyProgress| ui::progress::update_copy_progress(&pb, progress)
        };
        let copy_outcome =
            file_ops.copy_flat(&selected, &request.output_folder, Some(&progress_callback))?;
        ui::progress::finish_progress_with_summary(
            &copy_bar,
            &format!("Copied {} files", copy_outcome.copied.len()),
            copy_outcome.progress.elapsed(),
        );
        errors.extend(copy_outcome.progress.errors.iter().cloned());
        self.shutdown.check_shutdown()?;

        let plan = BatchPlan::build(&copy_outcome.copied, self.config.batch.batch_size)?;
        let batch_outcome = file_ops.move_into_batches(
            &plan,
            &request.output_folder,
            &self.config.batch.folder_prefix,
            self.config.batch.keep_flat_copies,
        );
        errors.extend(batch_outcome.errors.iter().cloned());

        let counts = RunCounts {
            files_scanned: records.len(),
            archives_scanned: scan.archives_scanned,
            with_timestamp: records.iter().filter(|r| r.has_timestamp()).count(),
            parse_errors: records.iter().filter(|r| r.is_error()).count(),
            selected: selected.len(),
            copied: copy_outcome.copied.len(),
            batched: batch_outcome.files_batched(),
            batches: batch_outcome.batches.len(),
            bytes_copied: copy_outcome.progress.bytes_processed,
        };

        let report = RunReport {
            input_folder: request.input_folder.clone(),
            output_folder: request.output_folder.clone(),
            output_csv: request.output_csv.clone(),
            cutoff: request.cutoff,
            policy: self.config.filter.policy,
            batch_size: self.config.batch.batch_size,
            counts,
            batches: batch_outcome.batches,
            errors,
            duration: start_time.elapsed(),
            finished_at: Utc::now(),
        };

        if self.config.output.generate_report {
            output_manager.write_report(&report)?;
        }

        self.progress_manager.clear();
        self.output_formatter.print_run_summary(&report);

        // Extracted archive entries are removed only now that copying is done
        drop(scan);

        Ok(report)
    }

    /// Scans, extracts and filters, then returns the batch plan without
    /// writing the CSV or copying anything.
    pub async fn dry_run(&self, request: &RunRequest) -> Result<DryRunPlan> {
        self.config.validate()?;
        ActivityScanner::validate_root(&request.input_folder)?;

        let output_manager =
            OutputManager::new(&request.output_folder).with_force_overwrite(request.force);
        if let Err(e) = self
            .ensure_writable_folders_outside_input(request)
            .and_then(|_| output_manager.check())
        {
            self.output_formatter
                .warning(&format!("A real run would fail: {}", e.user_message()));
        }

        let scan = self.scan(&request.input_folder).await?;
        let records = self.extract(&scan.sources).await?;

        let filter = CutoffFilter::new(request.cutoff, self.config.filter.policy);
        let selected = filter.select(&records);
        let plan = BatchPlan::build(&selected, self.config.batch.batch_size)?;

        let dry_run_plan = DryRunPlan {
            files_scanned: records.len(),
            csv_rows: records.len(),
            parse_errors: records.iter().filter(|r| r.is_error()).count(),
            selected: selected.len(),
            batch_size: plan.batch_size(),
            batches: plan
                .named_batches(&self.config.batch.folder_prefix)
                .map(|(name, files)| PlannedBatch {
                    name,
                    files: files.iter().map(|r| r.display_name.clone()).collect(),
                })
                .collect(),
        };

        self.progress_manager.clear();
        self.output_formatter.print_dry_run_plan(&dry_run_plan);

        Ok(dry_run_plan)
    }

    async fn scan(&self, root: &Path) -> Result<ScanResult> {
        let spinner = self.progress_manager.create_spinner("Scanning input folder...");
        let scanner = ActivityScanner::new(&self.config.scan);
        let root = root.to_path_buf();

        let scan = task::spawn_blocking(move || scanner.scan_directory(root))
            .await
            .map_err(|e| FitBatchError::Task {
                message: format!("scan: {}", e),
            })??;

        spinner.finish_and_clear();
        if !scan.errors.is_empty() {
            warn!("{} entries could not be scanned", scan.errors.len());
        }
        self.output_formatter.info(&scan.display_summary());

        Ok(scan)
    }

    async fn extract(&self, sources: &[ActivitySource]) -> Result<Vec<FileRecord>> {
        let decode_bar = self.progress_manager.create_decode_progress(sources.len() as u64);
        let extractor = TimestampExtractor::new(&self.config.scan);
        let sources = sources.to_vec();
        let started = Instant::now();

        let pb = decode_bar.clone();
        let records = task::spawn_blocking(move || {
            let on_record = move |_: &FileRecord| pb.inc(1);
            extractor.extract_all(&sources, Some(&on_record))
        })
        .await
        .map_err(|e| FitBatchError::Task {
            message: format!("decode: {}", e),
        })?;

        let failed = records.iter().filter(|r| r.is_error()).count();
        info!("Total files processed: {}", records.len());
        info!("Successfully processed: {}", records.len() - failed);
        info!("Files with errors: {}", failed);

        ui::progress::finish_progress_with_summary(
            &decode_bar,
            &format!("Decoded {} files", records.len()),
            started.elapsed(),
        );

        Ok(records)
    }

    /// `--force` and the error folder both clear a directory before the
    /// scan, so neither may contain the input.
    fn ensure_writable_folders_outside_input(&self, request: &RunRequest) -> Result<()> {
        batcher::ensure_outside_input(&request.output_folder, &request.input_folder)?;
        if let Some(ref error_dir) = self.config.output.error_dir {
            batcher::ensure_outside_input(error_dir, &request.input_folder)?;
        }
        Ok(())
    }

    fn copy_failed_files(&self, records: &[FileRecord], error_dir: &Path) -> Vec<String> {
        let failed: Vec<&Path> = records
            .iter()
            .filter(|r| r.is_error())
            .map(|r| r.source_path.as_path())
            .collect();

        if failed.is_empty() {
            return Vec::new();
        }

        info!("Copying {} failed files to {}", failed.len(), error_dir.display());
        FileOperations::new().copy_into_dir(&failed, error_dir)
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        std::fs::write(output_path.as_ref(), Config::create_sample_config())?;
        Ok(())
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &FitBatchError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

fn record_errors(records: &[FileRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| {
            r.error
                .as_ref()
                .map(|e| format!("Error processing {}: {}", r.display_name, e))
        })
        .collect()
}
