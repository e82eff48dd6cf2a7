use crate::error::Result;
use crate::extractor::FileRecord;
use log::{info, warn};
use std::fs;
use std::path::Path;

pub const CSV_HEADER: [&str; 2] = ["source_file", "min_timestamp"];

pub const SUMMARY_HEADER: [&str; 8] = [
    "file_name",
    "start_time",
    "total_time_sec",
    "distance_km",
    "avg_hr",
    "max_hr",
    "sport",
    "sub_sport",
];

fn create_writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(csv::Writer::from_path(path)?)
}

/// Writes one row per record, in the order given. Returns the row count.
pub fn write_csv(path: &Path, records: &[FileRecord]) -> Result<usize> {
    let mut writer = create_writer(path)?;
    writer.write_record(CSV_HEADER)?;

    for record in records {
        writer.write_record([record.display_name.as_str(), record.timestamp_field().as_str()])?;
    }

    writer.flush()?;
    info!("Wrote {} rows to {}", records.len(), path.display());

    Ok(records.len())
}

/// Writes one row per `session` message found, grouped by file in the order
/// given. Returns the row count.
pub fn write_summary_csv(path: &Path, records: &[FileRecord]) -> Result<usize> {
    let mut writer = create_writer(path)?;
    writer.write_record(SUMMARY_HEADER)?;

    let mut rows = 0;
    for record in records {
        for session in &record.sessions {
            let cells = session.csv_cells();
            writer.write_record(
                std::iter::once(record.display_name.as_str()).chain(cells.iter().map(String::as_str)),
            )?;
            rows += 1;
        }
    }

    writer.flush()?;
    if rows == 0 {
        warn!("No session data found in any file");
    } else {
        info!("Wrote {} session rows to {}", rows, path.display());
    }

    Ok(rows)
}
