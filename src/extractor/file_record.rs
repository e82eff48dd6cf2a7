use crate::extractor::SessionSummary;
use crate::scanner::ActivitySource;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of decoding one activity file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub source_path: PathBuf,
    pub display_name: String,
    pub min_timestamp: Option<DateTime<Utc>>,
    /// Set when decoding failed or stopped early. A damaged file may still
    /// carry the timestamps read before the damage.
    pub error: Option<String>,
    pub sessions: Vec<SessionSummary>,
}

impl FileRecord {
    pub fn with_timestamp(source: &ActivitySource, timestamp: DateTime<Utc>) -> Self {
        Self {
            source_path: source.path.clone(),
            display_name: source.display_name.clone(),
            min_timestamp: Some(timestamp),
            error: None,
            sessions: Vec::new(),
        }
    }

    pub fn without_timestamp(source: &ActivitySource) -> Self {
        Self {
            source_path: source.path.clone(),
            display_name: source.display_name.clone(),
            min_timestamp: None,
            error: None,
            sessions: Vec::new(),
        }
    }

    pub fn failed<S: Into<String>>(source: &ActivitySource, error: S) -> Self {
        Self {
            source_path: source.path.clone(),
            display_name: source.display_name.clone(),
            min_timestamp: None,
            error: Some(error.into()),
            sessions: Vec::new(),
        }
    }

    pub fn with_sessions(mut self, sessions: Vec<SessionSummary>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_error<S: Into<String>>(mut self, error: S) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn has_timestamp(&self) -> bool {
        self.min_timestamp.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// ISO 8601 rendering used in the CSV report; empty when no timestamp was found.
    pub fn timestamp_field(&self) -> String {
        self.min_timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default()
    }
}
