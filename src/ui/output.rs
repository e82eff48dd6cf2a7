use crate::batcher::{format_bytes, DryRunPlan, RunReport};
use crate::error::{FitBatchError, UserFriendlyError};
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &FitBatchError) {
        if self.mode == OutputMode::Json {
            self.print_json_object(&serde_json::json!({
                "type": "error",
                "message": error.user_message(),
                "suggestion": error.suggestion(),
            }));
            return;
        }

        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        eprintln!("{}{}", INFO, style(format!("Suggestion: {}", suggestion)).cyan());
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {}
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Final counts after a run. JSON mode prints the whole report, which is
    /// then the only thing on stdout.
    pub fn print_run_summary(&self, report: &RunReport) {
        match self.mode {
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            _ if self.quiet => {}
            OutputMode::Human => self.print_human_summary(report),
            OutputMode::Plain => self.print_plain_summary(report),
        }
    }

    pub fn print_dry_run_plan(&self, plan: &DryRunPlan) {
        match self.mode {
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(plan).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Human | OutputMode::Plain => {
                self.print_header("Dry Run");
                println!("Files scanned:      {}", plan.files_scanned);
                println!("CSV rows:           {}", plan.csv_rows);
                println!("Parse errors:       {}", plan.parse_errors);
                println!("Files selected:     {}", plan.selected);
                println!(
                    "Batches:            {} (at most {} files each)",
                    plan.batches.len(),
                    plan.batch_size
                );
                println!();

                for batch in &plan.batches {
                    println!("{} ({} files)", batch.name, batch.files.len());
                    if self.verbose_level >= 1 {
                        for name in &batch.files {
                            println!("  {}", name);
                        }
                    }
                }
            }
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "header",
                "title": title
            })),
            OutputMode::Plain => println!("=== {} ===", title),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn highlight<T: ToString>(&self, value: T) -> String {
        if self.use_colors {
            style(value.to_string()).cyan().bold().to_string()
        } else {
            value.to_string()
        }
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            let (emoji, styled) = match msg_type {
                MessageType::Error => (CROSS, style(message).red().bold()),
                MessageType::Warning => (WARNING, style(message).yellow().bold()),
                MessageType::Info => (INFO, style(message).cyan()),
            };

            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, styled),
                _ => println!("{}{}", emoji, styled),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    // Stdout is reserved for the final report in JSON mode
    fn print_json_object(&self, obj: &serde_json::Value) {
        eprintln!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_human_summary(&self, report: &RunReport) {
        let counts = &report.counts;

        println!();
        self.print_separator();

        if self.use_colors {
            println!("{} {}", style("Batching completed!").green().bold(), CHECKMARK);
        } else {
            println!("✓ Batching completed!");
        }

        println!();
        println!("  Files processed: {}", self.highlight(counts.files_scanned));
        println!("  With timestamp:  {}", self.highlight(counts.with_timestamp));
        println!("  Files filtered:  {}", self.highlight(counts.selected));
        println!(
            "  Files batched:   {} in {} batches",
            self.highlight(counts.batched),
            self.highlight(counts.batches)
        );
        println!("  Bytes copied:    {}", self.highlight(format_bytes(counts.bytes_copied)));
        println!("  Time taken:      {}", self.highlight(format_duration(report.duration)));

        if report.has_errors() {
            println!("  Errors:          {}", report.errors.len());
            if self.verbose_level >= 1 {
                for error in &report.errors {
                    println!("    - {}", error);
                }
            }
        }

        self.print_separator();
    }

    fn print_plain_summary(&self, report: &RunReport) {
        let counts = &report.counts;

        println!("COMPLETED: Batching");
        println!("Files processed: {}", counts.files_scanned);
        println!("Files filtered: {}", counts.selected);
        println!("Files batched: {}", counts.batched);
        println!("Batches: {}", counts.batches);
        println!("Duration: {:?}", report.duration);
        if report.has_errors() {
            println!("Errors: {}", report.errors.len());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Error,
    Warning,
    Info,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_mode() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert_eq!(formatter.verbose_level, 0);
        assert!(!formatter.use_colors);
    }

    #[test]
    fn test_should_show_message() {
        let formatter = OutputFormatter::new(OutputMode::Plain, 1, false);
        assert!(formatter.should_show_message(0));
        assert!(formatter.should_show_message(1));
        assert!(!formatter.should_show_message(2));

        let quiet_formatter = OutputFormatter::new(OutputMode::Plain, 2, true);
        assert!(!quiet_formatter.should_show_message(0));
    }

    #[test]
    fn test_highlight_without_colors() {
        let formatter = OutputFormatter::new(OutputMode::Plain, 0, false);
        assert_eq!(formatter.highlight(42), "42");
    }
}
