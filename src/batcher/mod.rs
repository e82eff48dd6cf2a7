pub mod batch_plan;
pub mod file_operations;
pub mod output_manager;

pub use batch_plan::{batch_folder_name, BatchPlan};
pub use file_operations::{
    clear_directory, BatchOutcome, BatchSummary, CopiedFile, CopyOutcome, CopyProgress,
    FileOperations,
};
pub use output_manager::{
    ensure_outside_input, format_bytes, DryRunPlan, OutputManager, PlannedBatch, RunCounts,
    RunReport,
};
