use crate::config::{CliOverrides, Config};
use crate::error::{FitBatchError, Result};
use crate::extractor::TimestampScope;
use crate::filter::CutoffPolicy;
use crate::ui::OutputMode;
use crate::RunRequest;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fitbatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sort Garmin FIT activity files into upload batches by start date")]
#[command(
    long_about = "fitbatch reads every FIT file in a folder (including FIT files inside zip \
                  archives), records the earliest timestamp of each one in a CSV, and copies \
                  the files older than a cutoff date into numbered batch folders."
)]
#[command(after_help = "EXAMPLES:\n  \
    fitbatch --input-folder ~/garmin-export --output-csv times.csv \\\n    \
    --output-folder upload --cutoff-date 2014-01-13\n  \
    fitbatch --input-folder export --output-csv t.csv --output-folder out \\\n    \
    --cutoff-date 2020-06-01 --policy after --batch-size 50 --force\n  \
    fitbatch --generate-config --config fitbatch.toml")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Folder holding FIT files and zip archives (searched recursively)
    #[arg(long, required_unless_present = "generate_config")]
    pub input_folder: Option<PathBuf>,

    /// CSV file receiving one row per scanned file
    #[arg(long, required_unless_present = "generate_config")]
    pub output_csv: Option<PathBuf>,

    /// Folder receiving the selected files and batch subfolders
    #[arg(long, required_unless_present = "generate_config")]
    pub output_folder: Option<PathBuf>,

    /// Cutoff date in YYYY-MM-DD form (midnight UTC)
    #[arg(long, required_unless_present = "generate_config")]
    pub cutoff_date: Option<String>,

    /// Maximum number of files per batch folder [default: 25]
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Which side of the cutoff to keep
    #[arg(long, value_enum)]
    pub policy: Option<CutoffPolicy>,

    /// Which timestamp fields count toward a file's minimum
    #[arg(long, value_enum)]
    pub scope: Option<TimestampScope>,

    /// Worker threads for decoding (defaults to the CPU count)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Folder receiving copies of files that failed to decode
    #[arg(long)]
    pub error_dir: Option<PathBuf>,

    /// Also write a CSV with one row per activity session
    #[arg(long)]
    pub summary_csv: Option<PathBuf>,

    /// Leave the flat copies next to the batch folders
    #[arg(long)]
    pub keep_flat_copies: bool,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Empty a non-empty output folder before copying
    #[arg(long)]
    pub force: bool,

    /// Scan and plan batches without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl From<&OutputFormat> for OutputMode {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        config.merge_with_cli_args(&self.create_cli_overrides());
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_batch_size(self.batch_size)
            .with_policy(self.policy)
            .with_timestamp_scope(self.scope)
            .with_workers(self.workers)
            .with_error_dir(self.error_dir.clone())
            .with_summary_csv(self.summary_csv.clone())
            .with_keep_flat_copies(self.keep_flat_copies)
    }

    /// Paths and cutoff of a run. The cutoff date is validated here.
    pub fn run_request(&self) -> Result<RunRequest> {
        let input_folder = required(&self.input_folder, "--input-folder")?;
        let output_csv = required(&self.output_csv, "--output-csv")?;
        let output_folder = required(&self.output_folder, "--output-folder")?;
        let cutoff_date = required(&self.cutoff_date, "--cutoff-date")?;

        Ok(RunRequest::new(input_folder, output_csv, output_folder, &cutoff_date)?
            .with_force(self.force))
    }

    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(&self.output_format)
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

fn required<T: Clone>(value: &Option<T>, flag: &str) -> Result<T> {
    value.clone().ok_or_else(|| FitBatchError::Config {
        message: format!("{} is required", flag),
    })
}
