use crate::error::{FitBatchError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stop flag the pipeline checks between phases. The first Ctrl+C sets it;
/// a second one exits the process.
pub struct GracefulShutdown {
    stop_requested: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Result<Self> {
        let shutdown = Self::detached();
        let stop_requested = Arc::clone(&shutdown.stop_requested);

        ctrlc::set_handler(move || {
            if stop_requested.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce stopping...");
                std::process::exit(1);
            }
            eprintln!("\nStopping after the current phase (press Ctrl+C again to quit now)");
        })
        .map_err(|e| FitBatchError::Task {
            message: format!("cannot install Ctrl+C handler: {}", e),
        })?;

        Ok(shutdown)
    }

    /// A flag with no signal handler behind it.
    pub fn detached() -> Self {
        Self {
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn check_shutdown(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(FitBatchError::Cancelled)
        }
    }

    pub fn request_shutdown(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_request_cancels() {
        let shutdown = GracefulShutdown::detached();
        assert!(shutdown.check_shutdown().is_ok());

        shutdown.request_shutdown();
        assert!(!shutdown.is_running());
        assert!(matches!(shutdown.check_shutdown(), Err(FitBatchError::Cancelled)));
    }
}
