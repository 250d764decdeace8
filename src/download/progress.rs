//! Download progress reporting
//!
//! Transfers report to a [`ProgressObserver`]. [`TransferProgress`] sits between
//! the copy loop and the observer and batches small reads so the observer is
//! called at most once per [`PROGRESS_BATCH_BYTES`].

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Minimum number of bytes between two `advance` calls
pub const PROGRESS_BATCH_BYTES: u64 = 256 * 1024;

/// Standard spinner characters
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard tick interval for spinners
const TICK_INTERVAL_MS: u64 = 80;

/// Receives progress of a single transfer.
pub trait ProgressObserver: Send + Sync {
    /// Transfer of `name` started; `total` is the expected size when known.
    fn start(&self, name: &str, total: Option<u64>);

    /// `bytes` more bytes were written.
    fn advance(&self, bytes: u64);

    /// Transfer ended, successfully or not.
    fn finish(&self);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn start(&self, _name: &str, _total: Option<u64>) {}
    fn advance(&self, _bytes: u64) {}
    fn finish(&self) {}
}

/// Terminal progress bar on stderr; invisible when stderr is not a terminal.
#[derive(Default)]
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressObserver for BarProgress {
    fn start(&self, name: &str, total: Option<u64>) {
        let pb = match total {
            Some(len) => create_byte_progress(len),
            None => create_spinner(&format!("downloading {}", name)),
        };
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(pb);
        }
    }

    fn advance(&self, bytes: u64) {
        if let Ok(slot) = self.bar.lock()
            && let Some(pb) = slot.as_ref()
        {
            pb.inc(bytes);
        }
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock()
            && let Some(pb) = slot.take()
        {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar with standard styling.
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("     {spinner:.cyan} {msg} {bytes}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(SPINNER_CHARS),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(TICK_INTERVAL_MS));
    pb
}

/// Create a progress bar with byte tracking.
fn create_byte_progress(total_bytes: u64) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(total_bytes), ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("     {spinner:.cyan} [{bar:30.cyan/dim}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸━"),
    );
    pb.enable_steady_tick(Duration::from_millis(TICK_INTERVAL_MS));
    pb
}

/// Batches byte counts for one transfer and always calls `finish` on drop.
pub(crate) struct TransferProgress<'a> {
    observer: &'a dyn ProgressObserver,
    pending: u64,
    total: u64,
}

impl<'a> TransferProgress<'a> {
    pub(crate) fn start(observer: &'a dyn ProgressObserver, name: &str, total: Option<u64>) -> Self {
        observer.start(name, total);
        Self {
            observer,
            pending: 0,
            total: 0,
        }
    }

    pub(crate) fn record(&mut self, bytes: usize) {
        self.pending += bytes as u64;
        self.total += bytes as u64;
        if self.pending >= PROGRESS_BATCH_BYTES {
            self.flush();
        }
    }

    pub(crate) fn transferred(&self) -> u64 {
        self.total
    }

    fn flush(&mut self) {
        if self.pending > 0 {
            self.observer.advance(self.pending);
            self.pending = 0;
        }
    }
}

impl Drop for TransferProgress<'_> {
    fn drop(&mut self) {
        self.flush();
        self.observer.finish();
    }
}
