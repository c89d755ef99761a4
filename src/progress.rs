//! Progress reporting as an injectable observer.
//!
//! The walker and the single-file processor never talk to the terminal
//! directly; they call into a [`ProgressObserver`]. [`NoopObserver`] is used
//! by library callers and tests, [`TerminalProgress`] draws indicatif bars.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

use crate::compressor::{FileOutcome, FileTask};
use crate::error::Result;
use crate::walker::{SkipReason, WalkReport};

/// Hooks called during a walk. Every method defaults to doing nothing.
pub trait ProgressObserver: Send + Sync {
    fn walk_started(&self, _total_tasks: usize) {}

    fn task_started(&self, _task: &FileTask, _total_bytes: u64) {}

    /// Called after every chunk with the number of source bytes consumed so far.
    fn bytes_processed(&self, _task: &FileTask, _bytes_so_far: u64) {}

    fn task_finished(&self, _task: &FileTask, _result: &Result<FileOutcome>) {}

    fn entry_skipped(&self, _path: &Path, _reason: SkipReason) {}

    fn walk_finished(&self, _report: &WalkReport) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Overall files bar plus one byte bar per file in flight.
pub struct TerminalProgress {
    mp: MultiProgress,
    files_bar: Mutex<Option<ProgressBar>>,
    file_bars: Mutex<HashMap<PathBuf, ProgressBar>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            mp: MultiProgress::new(),
            files_bar: Mutex::new(None),
            file_bars: Mutex::new(HashMap::new()),
        }
    }

    /// Stderr writer for log lines that clears the bars while a line is
    /// printed and redraws them afterwards.
    pub fn log_writer(&self) -> LogWriter {
        LogWriter(self.mp.clone())
    }

    fn style(template: &str) -> ProgressStyle {
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }
}

#[derive(Clone)]
pub struct LogWriter(MultiProgress);

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for TerminalProgress {
    fn walk_started(&self, total_tasks: usize) {
        let bar = self.mp.add(ProgressBar::new(total_tasks as u64));
        bar.set_style(Self::style(
            "{msg:.bold} [{bar:40.green/black}] {pos}/{len} {percent:>3}%",
        ));
        bar.set_message("Processing files");
        if let Ok(mut slot) = self.files_bar.lock() {
            *slot = Some(bar);
        }
    }

    fn task_started(&self, task: &FileTask, total_bytes: u64) {
        let bar = self.mp.add(ProgressBar::new(total_bytes));
        bar.set_prefix(
            task.source
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned(),
        );
        bar.set_style(Self::style(
            "{prefix:.dim}  [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {percent:>3}%",
        ));
        if let Ok(mut bars) = self.file_bars.lock() {
            bars.insert(task.source.clone(), bar);
        }
    }

    fn bytes_processed(&self, task: &FileTask, bytes_so_far: u64) {
        if let Ok(bars) = self.file_bars.lock()
            && let Some(bar) = bars.get(&task.source)
        {
            bar.set_position(bytes_so_far);
        }
    }

    fn task_finished(&self, task: &FileTask, _result: &Result<FileOutcome>) {
        if let Ok(mut bars) = self.file_bars.lock()
            && let Some(bar) = bars.remove(&task.source)
        {
            bar.finish_and_clear();
            self.mp.remove(&bar);
        }
        if let Ok(slot) = self.files_bar.lock()
            && let Some(bar) = slot.as_ref()
        {
            bar.inc(1);
        }
    }

    fn walk_finished(&self, _report: &WalkReport) {
        if let Ok(mut slot) = self.files_bar.lock()
            && let Some(bar) = slot.take()
        {
            bar.finish_with_message("All files done");
        }
    }
}
