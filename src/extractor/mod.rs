pub mod file_record;
pub mod session_summary;
pub mod timestamp_extractor;

pub use file_record::FileRecord;
pub use session_summary::SessionSummary;
pub use timestamp_extractor::{DecodedActivity, TimestampExtractor, TimestampScope};
