use clap::Parser;
use fitbatch::{Cli, FitBatch, FitBatchError, OutputFormatter, UserFriendlyError};
use std::process;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    setup_logging(cli.verbosity_level());

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let fitbatch = match FitBatch::from_cli(&cli) {
        Ok(fitbatch) => fitbatch,
        Err(e) => {
            print_startup_error(&cli, &e);
            return 1;
        }
    };

    // Bad paths or cutoff dates are rejected before any processing
    let request = match cli.run_request() {
        Ok(request) => request,
        Err(e) => {
            fitbatch.handle_error(&e);
            return 1;
        }
    };

    let outcome = if cli.dry_run {
        fitbatch.dry_run(&request).await.map(|_| ())
    } else {
        fitbatch.run(&request).await.map(|_| ())
    };

    match outcome {
        Ok(()) => 0,
        Err(e) => {
            fitbatch.handle_error(&e);
            1
        }
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "fitbatch.toml".to_string());

    match FitBatch::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!(
                "  fitbatch --config {} --input-folder <DIR> --output-csv <FILE> \\\n    --output-folder <DIR> --cutoff-date <YYYY-MM-DD>",
                config_path
            );
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn print_startup_error(cli: &Cli, error: &FitBatchError) {
    let formatter = OutputFormatter::new(cli.output_mode(), 0, false);
    formatter.print_user_friendly_error(error);
}

/// `RUST_LOG` wins when set; otherwise `-v` and `-vv` raise the default level.
fn setup_logging(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "fitbatch=warn",
        1 => "fitbatch=info",
        _ => "fitbatch=debug",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let cli = Cli::try_parse_from([
            "fitbatch",
            "--generate-config",
            "--config",
            config_path.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(handle_generate_config(&cli), 0);

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[batch]"));
    }
}
