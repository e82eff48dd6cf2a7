use crate::config::ScanConfig;
use crate::error::{FitBatchError, Result};
use crate::extractor::{FileRecord, SessionSummary};
use crate::scanner::ActivitySource;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use fitparser::de::{DecodeOption, FitObject, FitStreamProcessor};
use fitparser::profile::field_types::MesgNum;
use fitparser::{FitDataRecord, Value};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Which timestamp fields take part in the minimum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampScope {
    /// The `timestamp` field of `record` messages
    #[default]
    Records,
    /// Every timestamp-typed field of every message
    AllMessages,
}

/// What one FIT file yielded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedActivity {
    pub min_timestamp: Option<DateTime<Utc>>,
    pub sessions: Vec<SessionSummary>,
    /// Why decoding stopped before the end of the data, if it did.
    pub error: Option<String>,
}

pub struct TimestampExtractor {
    scope: TimestampScope,
    verify_crc: bool,
    workers: usize,
}

impl TimestampExtractor {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            scope: config.timestamp_scope,
            verify_crc: config.verify_crc,
            workers: config.worker_count(),
        }
    }

    pub fn with_scope(mut self, scope: TimestampScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    fn processor(&self) -> FitStreamProcessor {
        let mut processor = FitStreamProcessor::new();
        if !self.verify_crc {
            processor.add_option(DecodeOption::SkipHeaderCrcValidation);
            processor.add_option(DecodeOption::SkipDataCrcValidation);
        }
        processor
    }

    /// Decodes messages until the end of the data or the first malformed
    /// object. Messages decoded before a failure are kept.
    fn decode_messages(&self, mut buffer: &[u8]) -> (Vec<FitDataRecord>, Option<fitparser::Error>) {
        let mut processor = self.processor();
        let mut records = Vec::new();

        while !buffer.is_empty() {
            let (rest, object) = match processor.deserialize_next(buffer) {
                Ok(next) => next,
                Err(e) => return (records, Some(e)),
            };

            match object {
                FitObject::Crc(..) => processor.reset(),
                FitObject::DataMessage(message) => match processor.decode_message(message) {
                    Ok(record) => records.push(record),
                    Err(e) => return (records, Some(e)),
                },
                FitObject::Header(..) | FitObject::DefinitionMessage(..) => {}
            }

            buffer = rest;
        }

        (records, None)
    }

    /// Only reading the bytes can fail here; decoding problems are reported
    /// in [`DecodedActivity::error`].
    pub fn decode_reader<R: Read>(&self, reader: &mut R) -> Result<DecodedActivity> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;

        let (records, error) = self.decode_messages(&buffer);

        Ok(DecodedActivity {
            min_timestamp: min_timestamp(&records, self.scope),
            sessions: sessions(&records),
            error: error.map(|e| FitBatchError::from(e).to_string()),
        })
    }

    pub fn decode_path(&self, path: &Path) -> Result<DecodedActivity> {
        let mut reader = BufReader::new(File::open(path)?);
        self.decode_reader(&mut reader)
    }

    /// Decodes one source. Failures end up in the returned record, never as an `Err`.
    pub fn extract(&self, source: &ActivitySource) -> FileRecord {
        let decoded = match self.decode_path(&source.path) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!("Error processing {}: {}", source.display_name, e);
                return FileRecord::failed(source, e.to_string());
            }
        };

        let record = match decoded.min_timestamp {
            Some(timestamp) => {
                debug!("{}: minimum timestamp {}", source.display_name, timestamp);
                FileRecord::with_timestamp(source, timestamp)
            }
            None => FileRecord::without_timestamp(source),
        }
        .with_sessions(decoded.sessions);

        match decoded.error {
            Some(e) if record.has_timestamp() => {
                warn!(
                    "{} is damaged, keeping timestamps read before the damage: {}",
                    source.display_name, e
                );
                record.with_error(e)
            }
            Some(e) => {
                error!("Error processing {}: {}", source.display_name, e);
                record.with_error(e)
            }
            None => {
                if !record.has_timestamp() {
                    warn!("No timestamp records found in {}", source.display_name);
                }
                record
            }
        }
    }

    /// Decodes every source and returns the records in input order.
    pub fn extract_all(
        &self,
        sources: &[ActivitySource],
        on_record: Option<&(dyn Fn(&FileRecord) + Sync)>,
    ) -> Vec<FileRecord> {
        let process = |source: &ActivitySource| {
            let record = self.extract(source);
            if let Some(callback) = on_record {
                callback(&record);
            }
            record
        };

        self.run_pool(sources, &process)
    }

    #[cfg(feature = "parallel")]
    fn run_pool(
        &self,
        sources: &[ActivitySource],
        process: &(dyn Fn(&ActivitySource) -> FileRecord + Sync),
    ) -> Vec<FileRecord> {
        use rayon::prelude::*;

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
        {
            Ok(pool) => pool.install(|| sources.par_iter().map(process).collect()),
            Err(e) => {
                warn!("Could not start worker pool, decoding sequentially: {}", e);
                sources.iter().map(process).collect()
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run_pool(
        &self,
        sources: &[ActivitySource],
        process: &(dyn Fn(&ActivitySource) -> FileRecord + Sync),
    ) -> Vec<FileRecord> {
        sources.iter().map(process).collect()
    }
}

fn sessions(records: &[FitDataRecord]) -> Vec<SessionSummary> {
    records
        .iter()
        .filter(|record| matches!(record.kind(), MesgNum::Session))
        .map(|record| SessionSummary::from_fields(record.fields()))
        .collect()
}

fn min_timestamp(records: &[FitDataRecord], scope: TimestampScope) -> Option<DateTime<Utc>> {
    records
        .iter()
        .filter(|record| match scope {
            TimestampScope::Records => matches!(record.kind(), MesgNum::Record),
            TimestampScope::AllMessages => true,
        })
        .flat_map(|record| record.fields().iter())
        .filter_map(|field| match (scope, field.value()) {
            (TimestampScope::Records, Value::Timestamp(ts)) if field.name() == "timestamp" => {
                Some(ts.with_timezone(&Utc))
            }
            (TimestampScope::AllMessages, Value::Timestamp(ts)) => Some(ts.with_timezone(&Utc)),
            _ => None,
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::SourceOrigin;
    use crate::test_support::{
        fit_datetime, fit_file_bytes, fit_file_with_creation_time, fit_file_with_session,
        TestSession,
    };
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn extractor() -> TimestampExtractor {
        TimestampExtractor::new(&ScanConfig::default()).with_workers(2)
    }

    fn source_for(path: &Path) -> ActivitySource {
        ActivitySource {
            path: path.to_path_buf(),
            display_name: path.file_name().unwrap().to_string_lossy().to_string(),
            origin: SourceOrigin::File,
        }
    }

    #[test]
    fn test_minimum_over_unordered_records() {
        let bytes = fit_file_bytes(&[900_000_300, 900_000_100, 900_000_200]);
        let min = extractor()
            .decode_reader(&mut Cursor::new(bytes))
            .unwrap()
            .min_timestamp;

        assert_eq!(min, Some(fit_datetime(900_000_100)));
    }

    #[test]
    fn test_file_without_records_has_no_timestamp() {
        let bytes = fit_file_bytes(&[]);
        let min = extractor()
            .decode_reader(&mut Cursor::new(bytes))
            .unwrap()
            .min_timestamp;

        assert_eq!(min, None);
    }

    #[test]
    fn test_scope_controls_which_fields_count() {
        // file_id.time_created is earlier than every record
        let bytes = fit_file_with_creation_time(800_000_000, &[900_000_000, 900_000_050]);

        let records_only = extractor()
            .decode_reader(&mut Cursor::new(bytes.clone()))
            .unwrap()
            .min_timestamp;
        assert_eq!(records_only, Some(fit_datetime(900_000_000)));

        let all = extractor()
            .with_scope(TimestampScope::AllMessages)
            .decode_reader(&mut Cursor::new(bytes))
            .unwrap()
            .min_timestamp;
        assert_eq!(all, Some(fit_datetime(800_000_000)));
    }

    #[test]
    fn test_truncated_file_keeps_earlier_timestamps() {
        let mut bytes = fit_file_bytes(&[900_000_300, 900_000_100, 900_000_050]);
        // Drop the trailing CRC and cut into the last record
        bytes.truncate(bytes.len() - 4);

        let decoded = extractor().decode_reader(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.min_timestamp, Some(fit_datetime(900_000_100)));
        assert!(decoded.error.is_some());
    }

    #[test]
    fn test_missing_crc_is_not_an_error() {
        let mut bytes = fit_file_bytes(&[900_000_300, 900_000_100]);
        bytes.truncate(bytes.len() - 2);

        let decoded = extractor().decode_reader(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.min_timestamp, Some(fit_datetime(900_000_100)));
        assert_eq!(decoded.error, None);
    }

    #[test]
    fn test_truncated_file_record_is_flagged_but_dated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cut.fit");
        let bytes = fit_file_bytes(&[900_000_000, 900_000_010, 900_000_020]);
        fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

        let record = extractor().extract(&source_for(&path));
        assert_eq!(record.min_timestamp, Some(fit_datetime(900_000_000)));
        assert!(record.is_error());
    }

    #[test]
    fn test_session_summaries_are_collected() {
        let session = TestSession {
            start_time: 900_000_000,
            elapsed_ms: 1_800_500,
            distance_cm: 512_340,
            avg_hr: 142,
            max_hr: 171,
            sport: 1,
            sub_sport: 0,
        };
        let bytes = fit_file_with_session(&[900_000_000, 900_001_800], &session);

        let decoded = extractor().decode_reader(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.min_timestamp, Some(fit_datetime(900_000_000)));
        assert_eq!(decoded.sessions.len(), 1);

        let summary = &decoded.sessions[0];
        assert_eq!(summary.start_time, Some(fit_datetime(900_000_000)));
        assert!((summary.total_time_sec.unwrap() - 1800.5).abs() < 1e-9);
        assert!((summary.distance_km.unwrap() - 5.1234).abs() < 1e-9);
        assert_eq!(summary.avg_hr, Some(142.0));
        assert_eq!(summary.max_hr, Some(171.0));
        assert_eq!(summary.sport.as_deref(), Some("running"));
        assert_eq!(summary.sub_sport.as_deref(), Some("generic"));
    }

    #[test]
    fn test_corrupt_file_becomes_error_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("corrupt.fit");
        fs::write(&path, b"this is not a FIT file").unwrap();

        let record = extractor().extract(&source_for(&path));
        assert!(record.is_error());
        assert!(!record.has_timestamp());
    }

    #[test]
    fn test_extract_all_preserves_input_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut sources = Vec::new();

        for (i, base) in [500_000_000u32, 300_000_000, 700_000_000, 100_000_000]
            .iter()
            .enumerate()
        {
            let path = temp_dir.path().join(format!("activity_{}.fit", i));
            fs::write(&path, fit_file_bytes(&[base + 60, *base])).unwrap();
            sources.push(source_for(&path));
        }

        let seen = std::sync::atomic::AtomicUsize::new(0);
        let callback = |_: &FileRecord| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        };
        let records = extractor().extract_all(&sources, Some(&callback));

        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 4);
        let minima: Vec<_> = records.iter().map(|r| r.min_timestamp).collect();
        assert_eq!(
            minima,
            vec![
                Some(fit_datetime(500_000_000)),
                Some(fit_datetime(300_000_000)),
                Some(fit_datetime(700_000_000)),
                Some(fit_datetime(100_000_000)),
            ]
        );
        assert_eq!(records[2].display_name, "activity_2.fit");
    }
}
