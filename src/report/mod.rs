pub mod csv_report;

pub use csv_report::{write_csv, write_summary_csv, CSV_HEADER, SUMMARY_HEADER};
