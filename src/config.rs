use crate::error::{FitBatchError, Result};
use crate::extractor::TimestampScope;
use crate::filter::CutoffPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_SIZE: usize = 25;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub filter: FilterConfig,
    pub batch: BatchConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub extensions: Vec<String>,
    pub archive_extensions: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub skip_hidden: bool,
    pub max_depth: usize,
    pub timestamp_scope: TimestampScope,
    pub verify_crc: bool,
    /// Worker threads for FIT decoding (0 = one per CPU)
    pub workers: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    pub policy: CutoffPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub folder_prefix: String,
    pub keep_flat_copies: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub generate_report: bool,
    pub error_dir: Option<PathBuf>,
    /// Per-session summary CSV (start time, duration, distance, heart rate, sport)
    pub summary_csv: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["fit".to_string()],
            archive_extensions: vec!["zip".to_string()],
            exclude_dirs: vec!["__MACOSX".to_string()],
            exclude_patterns: vec![],
            skip_hidden: true,
            max_depth: 10,
            timestamp_scope: TimestampScope::default(),
            verify_crc: false,
            workers: 0,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            folder_prefix: "batch".to_string(),
            keep_flat_copies: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            generate_report: true,
            error_dir: None,
            summary_csv: None,
        }
    }
}

impl ScanConfig {
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(FitBatchError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| FitBatchError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| FitBatchError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["fitbatch.toml", ".fitbatch.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(batch_size) = cli_args.batch_size {
            self.batch.batch_size = batch_size;
        }

        if let Some(policy) = cli_args.policy {
            self.filter.policy = policy;
        }

        if let Some(scope) = cli_args.timestamp_scope {
            self.scan.timestamp_scope = scope;
        }

        if let Some(workers) = cli_args.workers {
            self.scan.workers = workers;
        }

        if let Some(ref error_dir) = cli_args.error_dir {
            self.output.error_dir = Some(error_dir.clone());
        }

        if let Some(ref summary_csv) = cli_args.summary_csv {
            self.output.summary_csv = Some(summary_csv.clone());
        }

        if cli_args.keep_flat_copies {
            self.batch.keep_flat_copies = true;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| FitBatchError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| FitBatchError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.batch_size == 0 {
            return Err(FitBatchError::Config {
                message: "Batch size must be greater than 0".to_string(),
            });
        }

        if self.scan.extensions.is_empty() {
            return Err(FitBatchError::Config {
                message: "At least one activity file extension must be specified".to_string(),
            });
        }

        if self.scan.max_depth == 0 {
            return Err(FitBatchError::Config {
                message: "Maximum directory depth must be greater than 0".to_string(),
            });
        }

        let prefix = self.batch.folder_prefix.trim();
        if prefix.is_empty() || prefix.contains(['/', '\\']) || prefix.starts_with('.') {
            return Err(FitBatchError::Config {
                message: format!("Invalid batch folder prefix: '{}'", self.batch.folder_prefix),
            });
        }

        for pattern in &self.scan.exclude_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(FitBatchError::Config {
                    message: format!("Invalid exclude pattern '{}': {}", pattern, e),
                });
            }
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub batch_size: Option<usize>,
    pub policy: Option<CutoffPolicy>,
    pub timestamp_scope: Option<TimestampScope>,
    pub workers: Option<usize>,
    pub error_dir: Option<PathBuf>,
    pub summary_csv: Option<PathBuf>,
    pub keep_flat_copies: bool,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_policy(mut self, policy: Option<CutoffPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timestamp_scope(mut self, scope: Option<TimestampScope>) -> Self {
        self.timestamp_scope = scope;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_error_dir(mut self, error_dir: Option<PathBuf>) -> Self {
        self.error_dir = error_dir;
        self
    }

    pub fn with_summary_csv(mut self, summary_csv: Option<PathBuf>) -> Self {
        self.summary_csv = summary_csv;
        self
    }

    pub fn with_keep_flat_copies(mut self, keep: bool) -> Self {
        self.keep_flat_copies = keep;
        self
    }
}
