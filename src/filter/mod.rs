pub mod cutoff_filter;

pub use cutoff_filter::{parse_cutoff_date, CutoffFilter, CutoffPolicy};
