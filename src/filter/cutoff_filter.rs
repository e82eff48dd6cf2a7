use crate::error::{FitBatchError, Result};
use crate::extractor::FileRecord;
use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const CUTOFF_DATE_FORMAT: &str = "%Y-%m-%d";

/// Which side of the cutoff is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CutoffPolicy {
    /// Keep activities that started strictly before the cutoff
    #[default]
    Before,
    /// Keep activities that started at or after the cutoff
    After,
}

/// Parses `YYYY-MM-DD` into midnight UTC of that day.
pub fn parse_cutoff_date(value: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value.trim(), CUTOFF_DATE_FORMAT).map_err(|_| {
        FitBatchError::InvalidCutoffDate {
            value: value.to_string(),
        }
    })?;

    date.and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| FitBatchError::InvalidCutoffDate {
            value: value.to_string(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffFilter {
    cutoff: DateTime<Utc>,
    policy: CutoffPolicy,
}

impl CutoffFilter {
    pub fn new(cutoff: DateTime<Utc>, policy: CutoffPolicy) -> Self {
        Self { cutoff, policy }
    }

    pub fn from_date_str(value: &str, policy: CutoffPolicy) -> Result<Self> {
        Ok(Self::new(parse_cutoff_date(value)?, policy))
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    pub fn policy(&self) -> CutoffPolicy {
        self.policy
    }

    /// Records without a timestamp never match.
    pub fn matches(&self, record: &FileRecord) -> bool {
        match (record.min_timestamp, self.policy) {
            (Some(ts), CutoffPolicy::Before) => ts < self.cutoff,
            (Some(ts), CutoffPolicy::After) => ts >= self.cutoff,
            (None, _) => false,
        }
    }

    /// Keeps matching records in their original order.
    pub fn select<'a>(&self, records: &'a [FileRecord]) -> Vec<&'a FileRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn record(name: &str, ts: Option<DateTime<Utc>>) -> FileRecord {
        FileRecord {
            source_path: PathBuf::from(name),
            display_name: name.to_string(),
            min_timestamp: ts,
            error: None,
            sessions: Vec::new(),
        }
    }

    #[test]
    fn test_parse_cutoff_date() {
        let cutoff = parse_cutoff_date("2014-01-13").unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2014, 1, 13, 0, 0, 0).unwrap());

        for bad in ["13/01/2014", "2014-13-01", "2014-02-30", "", "yesterday"] {
            assert!(
                matches!(parse_cutoff_date(bad), Err(FitBatchError::InvalidCutoffDate { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_before_policy_is_strict() {
        let filter = CutoffFilter::from_date_str("2014-01-13", CutoffPolicy::Before).unwrap();

        let earlier = record("a.fit", Some(Utc.with_ymd_and_hms(2014, 1, 12, 16, 0, 0).unwrap()));
        let at_midnight = record("b.fit", Some(Utc.with_ymd_and_hms(2014, 1, 13, 0, 0, 0).unwrap()));
        let later = record("c.fit", Some(Utc.with_ymd_and_hms(2014, 1, 13, 0, 0, 1).unwrap()));

        assert!(filter.matches(&earlier));
        assert!(!filter.matches(&at_midnight));
        assert!(!filter.matches(&later));
    }

    #[test]
    fn test_after_policy_includes_boundary() {
        let filter = CutoffFilter::from_date_str("2014-01-13", CutoffPolicy::After).unwrap();

        let earlier = record("a.fit", Some(Utc.with_ymd_and_hms(2014, 1, 12, 23, 59, 59).unwrap()));
        let at_midnight = record("b.fit", Some(Utc.with_ymd_and_hms(2014, 1, 13, 0, 0, 0).unwrap()));

        assert!(!filter.matches(&earlier));
        assert!(filter.matches(&at_midnight));
    }

    #[test]
    fn test_missing_timestamps_never_selected() {
        let before = CutoffFilter::from_date_str("2030-01-01", CutoffPolicy::Before).unwrap();
        let after = CutoffFilter::from_date_str("1990-01-01", CutoffPolicy::After).unwrap();
        let missing = record("empty.fit", None);

        assert!(!before.matches(&missing));
        assert!(!after.matches(&missing));
    }

    #[test]
    fn test_select_preserves_order() {
        let filter = CutoffFilter::from_date_str("2020-01-01", CutoffPolicy::Before).unwrap();
        let records = vec![
            record("z.fit", Some(Utc.with_ymd_and_hms(2019, 5, 1, 0, 0, 0).unwrap())),
            record("m.fit", Some(Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap())),
            record("a.fit", Some(Utc.with_ymd_and_hms(2018, 5, 1, 0, 0, 0).unwrap())),
            record("n.fit", None),
        ];

        let names: Vec<&str> = filter
            .select(&records)
            .iter()
            .map(|r| r.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["z.fit", "a.fit"]);
    }
}
