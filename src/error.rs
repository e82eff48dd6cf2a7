use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitBatchError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cutoff date: {value}")]
    InvalidCutoffDate { value: String },

    #[error("Input folder is not readable: {path}")]
    InputNotReadable { path: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Zip archive error in {archive}: {message}")]
    Archive { archive: String, message: String },

    #[error("Failed to decode FIT data: {message}")]
    FitParse { message: String },

    #[error("CSV report error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Permission denied: {path}")]
    Permission { path: String },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("Output folder is not empty: {path}")]
    OutputDirectoryExists { path: String },

    #[error("{folder} contains the input folder {input}")]
    OverlapsInput { folder: String, input: String },

    #[error("Background task failed: {message}")]
    Task { message: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for FitBatchError {
    fn user_message(&self) -> String {
        match self {
            FitBatchError::InvalidCutoffDate { value } => {
                format!("Invalid cutoff date: '{}'", value)
            }
            FitBatchError::InputNotReadable { path } => {
                format!("Cannot read input folder: {}", path)
            }
            FitBatchError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            FitBatchError::Archive { archive, message } => {
                format!("Could not read archive {}: {}", archive, message)
            }
            FitBatchError::Permission { path } => {
                format!("Permission denied accessing: {}", path)
            }
            FitBatchError::Cancelled => "Operation was cancelled by user".to_string(),
            FitBatchError::InvalidPath { path } => {
                format!("Invalid file path: {}", path)
            }
            FitBatchError::OutputDirectoryExists { path } => {
                format!("Output folder already contains files: {}", path)
            }
            FitBatchError::OverlapsInput { folder, input } => {
                format!("Refusing to clear {}: it contains the input folder {}", folder, input)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            FitBatchError::InvalidCutoffDate { .. } => Some(
                "Pass the cutoff as a calendar date in YYYY-MM-DD form (e.g., --cutoff-date 2020-01-01).".to_string()
            ),
            FitBatchError::InputNotReadable { .. } => Some(
                "Check that --input-folder points to an existing directory you can read.".to_string()
            ),
            FitBatchError::Config { .. } => Some(
                "Check your configuration file syntax and the values passed on the command line.".to_string()
            ),
            FitBatchError::Permission { .. } => Some(
                "Ensure you have the necessary read/write permissions for the target directory.".to_string()
            ),
            FitBatchError::OutputDirectoryExists { .. } => Some(
                "Empty the output folder, choose a different one with --output-folder, or use --force to clear it.".to_string()
            ),
            FitBatchError::OverlapsInput { .. } => Some(
                "Pick an output or error folder outside the input folder.".to_string()
            ),
            FitBatchError::Task { .. } => Some(
                "This is an internal failure; rerun with -vv and report the log.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for FitBatchError {
    fn from(error: toml::de::Error) -> Self {
        FitBatchError::Config {
            message: error.to_string(),
        }
    }
}

impl From<fitparser::Error> for FitBatchError {
    fn from(error: fitparser::Error) -> Self {
        FitBatchError::FitParse {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FitBatchError>;
