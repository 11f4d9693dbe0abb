use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Progress tracker for guardian operations
pub struct ProgressTracker {
    multi: Arc<MultiProgress>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            multi: Arc::new(MultiProgress::new()),
        }
    }

    /// Bar across a batch of videos
    pub fn create_progress_bar(&self, total: u64, message: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        pb.set_message(message.to_string());
        pb
    }

    /// Create an indeterminate spinner for unknown-duration operations
    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper for operations with progress tracking
pub struct ProgressOperation {
    pub tracker: ProgressTracker,
    pub enabled: bool,
}

impl ProgressOperation {
    pub fn new(enabled: bool) -> Self {
        Self {
            tracker: ProgressTracker::new(),
            enabled,
        }
    }

    /// Batch bar, or `None` when progress display is off
    pub fn batch(&self, total: usize, message: &str) -> Option<ProgressBar> {
        self.enabled
            .then(|| self.tracker.create_progress_bar(total as u64, message))
    }

    /// Await `operation` behind a spinner if enabled; the spinner ends with
    /// a check mark or a cross depending on the result.
    pub async fn with_spinner<F, T, E>(&self, message: &str, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.enabled {
            return operation.await;
        }

        let pb = self.tracker.create_spinner(message);
        let result = operation.await;
        match result {
            Ok(_) => pb.finish_with_message(format!("✓ {}", message)),
            Err(_) => pb.abandon_with_message(format!("✗ {}", message)),
        }
        result
    }
}
