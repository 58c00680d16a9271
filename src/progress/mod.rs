use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

#[derive(Debug)]
pub struct TransferProgress {
    pub start_time: Instant,
    pub progress_bar: ProgressBar,
}

impl TransferProgress {
    pub fn new(total_keys: u64, silent: bool) -> Self {
        let progress_bar = if silent {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total_keys)
        };
        progress_bar.set_length(total_keys);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} | {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        progress_bar.set_style(style);
        progress_bar.set_message("Starting...");

        Self {
            start_time: Instant::now(),
            progress_bar,
        }
    }

    /// Marks one key as handled. The key count from `INFO keyspace` is only
    /// approximate, so the bar grows when it is exceeded.
    pub fn increment(&self) {
        let position = self.progress_bar.position() + 1;
        if position > self.progress_bar.length().unwrap_or(0) {
            self.progress_bar.set_length(position);
        }
        self.progress_bar.set_position(position);
    }

    pub fn update_stage(&self, stage: &str) {
        self.progress_bar.set_message(format!("Stage: {stage}"));
    }

    /// Runs `f` with the bar cleared so log lines do not interleave with it.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.progress_bar.suspend(f)
    }

    pub fn finish(&self, message: &str) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let processed = self.progress_bar.position();
        let rate = if elapsed > 0.0 {
            processed as f64 / elapsed
        } else {
            0.0
        };
        self.progress_bar.finish_with_message(format!(
            "{message} | Total time: {elapsed:.2}s | Avg rate: {rate:.0} keys/s"
        ));
    }

    /// Stops the bar where it is, for runs ended by a fatal error.
    pub fn abandon(&self, message: &str) {
        self.progress_bar
            .abandon_with_message(format!("{message} after {} keys", self.progress_bar.position()));
    }
}
