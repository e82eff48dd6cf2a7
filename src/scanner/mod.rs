pub mod activity_scanner;
pub mod archive;
pub mod file_filter;

pub use activity_scanner::{ActivityScanner, ActivitySource, ScanResult, SourceOrigin};
pub use archive::{ArchiveContents, ArchiveExtractor};
pub use file_filter::FileFilter;
