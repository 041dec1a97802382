use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files";

/// Progress counter for the scan, optionally drawn as a bar on stderr
pub struct ScanProgress {
    total: AtomicU64,
    completed: AtomicU64,
    bar: ProgressBar,
}

impl ScanProgress {
    /// Creates a progress counter; `visible` controls whether a bar is drawn
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            total: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            bar,
        }
    }

    pub fn hidden() -> Self {
        Self::new(false)
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.bar.set_length(total);
    }

    /// Advances the counter by one finished task
    pub fn advance(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish();
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::hidden()
    }
}
