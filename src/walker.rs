//! Directory walker: mirrors a source tree under a destination root and
//! runs one [`FileTask`] per regular file.
//!
//! The tree is planned first, depth-first with entries sorted by file name,
//! so repeated runs over the same tree produce the same task order. Tasks
//! are then executed one after another, or on a rayon pool when more than
//! one job is requested; results are gathered in plan order either way.
//! A failing file is recorded and the walk moves on.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::codec::{Algorithm, Direction};
use crate::compressor::{self, CancelFlag, FileOutcome, FileTask};
use crate::config::ProcessOptions;
use crate::error::{ArchiveError, Result};
use crate::progress::{NoopObserver, ProgressObserver};

static NOOP: NoopObserver = NoopObserver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Symlink,
    NotRegularFile,
    /// Decompression only handles files carrying the algorithm suffix.
    MissingSuffix,
    /// The destination root sits inside the source tree.
    InsideDestination,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Symlink => "symbolic link",
            SkipReason::NotRegularFile => "not a regular file",
            SkipReason::MissingSuffix => "missing algorithm suffix",
            SkipReason::InsideDestination => "destination directory",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    pub error: ArchiveError,
}

/// Aggregate result of a walk.
#[derive(Debug, Default)]
pub struct WalkReport {
    pub succeeded: usize,
    pub failures: Vec<Failure>,
    pub skipped: Vec<Skipped>,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl WalkReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Everything a walk will do, in execution order.
#[derive(Debug, Default)]
pub struct Plan {
    /// Destination directories, parents before children.
    pub directories: Vec<PathBuf>,
    pub tasks: Vec<FileTask>,
    pub skipped: Vec<Skipped>,
    /// Entries that could not be listed.
    pub failures: Vec<Failure>,
}

/// Output path for a file at `rel` (relative to the source root), or `None`
/// when a file to decompress does not carry the algorithm suffix.
pub fn destination_for(rel: &Path, algorithm: Algorithm, direction: Direction) -> Option<PathBuf> {
    match direction {
        Direction::Compress => {
            let mut name = rel.as_os_str().to_os_string();
            name.push(algorithm.suffix());
            Some(PathBuf::from(name))
        }
        Direction::Decompress => {
            let ext = rel.extension()?;
            let stem = rel.file_stem()?;
            if ext != &algorithm.suffix()[1..] || stem.is_empty() {
                return None;
            }
            Some(rel.with_extension(""))
        }
    }
}

pub struct Walker<'a> {
    algorithm: Algorithm,
    direction: Direction,
    options: ProcessOptions,
    observer: &'a dyn ProgressObserver,
    cancel: CancelFlag,
}

impl Walker<'static> {
    pub fn new(algorithm: Algorithm, direction: Direction) -> Self {
        Walker {
            algorithm,
            direction,
            options: ProcessOptions::default(),
            observer: &NOOP,
            cancel: CancelFlag::new(),
        }
    }
}

impl<'a> Walker<'a> {
    pub fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer<'b>(self, observer: &'b dyn ProgressObserver) -> Walker<'b> {
        Walker {
            algorithm: self.algorithm,
            direction: self.direction,
            options: self.options,
            observer,
            cancel: self.cancel,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// List the work for `source_root` without touching the destination.
    pub fn plan(&self, source_root: &Path, dest_root: &Path) -> Result<Plan> {
        let meta = fs::metadata(source_root)
            .map_err(|e| ArchiveError::source_io(source_root, e))?;

        if !meta.is_dir() {
            return Ok(Plan {
                tasks: vec![self.task(source_root.to_path_buf(), dest_root.to_path_buf())],
                ..Plan::default()
            });
        }

        let excluded = nested_destination(source_root, dest_root);
        let mut plan = Plan::default();
        let mut entries = WalkDir::new(source_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(source_root).to_path_buf();
                    error!("Cannot list '{}': {}", path.display(), err);
                    plan.failures.push(Failure {
                        error: ArchiveError::SourceUnreadable {
                            path: path.clone(),
                            source: err.into(),
                        },
                        path,
                    });
                    continue;
                }
            };

            let Ok(rel) = entry.path().strip_prefix(source_root) else {
                continue;
            };
            let file_type = entry.file_type();

            if excluded.as_deref() == Some(rel) {
                if file_type.is_dir() {
                    entries.skip_current_dir();
                }
                plan.skip(entry.path(), SkipReason::InsideDestination);
                continue;
            }

            if file_type.is_dir() {
                if rel.as_os_str().is_empty() {
                    plan.directories.push(dest_root.to_path_buf());
                } else {
                    plan.directories.push(dest_root.join(rel));
                }
            } else if file_type.is_file() {
                match destination_for(rel, self.algorithm, self.direction) {
                    Some(dest_rel) => {
                        plan.tasks
                            .push(self.task(entry.path().to_path_buf(), dest_root.join(dest_rel)));
                    }
                    None => plan.skip(entry.path(), SkipReason::MissingSuffix),
                }
            } else if file_type.is_symlink() {
                plan.skip(entry.path(), SkipReason::Symlink);
            } else {
                plan.skip(entry.path(), SkipReason::NotRegularFile);
            }
        }

        Ok(plan)
    }

    /// Plan and execute the walk, collecting per-file failures.
    pub fn run(&self, source_root: &Path, dest_root: &Path) -> Result<WalkReport> {
        self.options.validate()?;
        let plan = self.plan(source_root, dest_root)?;

        let mut report = WalkReport {
            failures: plan.failures,
            skipped: plan.skipped,
            ..WalkReport::default()
        };
        for s in &report.skipped {
            self.observer.entry_skipped(&s.path, s.reason);
        }

        for dir in &plan.directories {
            if let Err(e) = fs::create_dir_all(dir) {
                error!("Cannot create directory '{}': {}", dir.display(), e);
                report.failures.push(Failure {
                    path: dir.clone(),
                    error: ArchiveError::dest_io(dir, e),
                });
            }
        }

        self.observer.walk_started(plan.tasks.len());
        let results = self.execute(&plan.tasks)?;

        for (task, result) in plan.tasks.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    report.succeeded += 1;
                    report.bytes_in += outcome.bytes_in;
                    report.bytes_out += outcome.bytes_out;
                }
                Err(err) => {
                    error!("Failed on '{}': {}", task.source.display(), err);
                    report.failures.push(Failure {
                        path: task.source.clone(),
                        error: err,
                    });
                }
            }
        }

        let verb = match self.direction {
            Direction::Compress => "compressed",
            Direction::Decompress => "decompressed",
        };
        info!(
            succeeded = report.succeeded,
            failed = report.failed(),
            skipped = report.skipped.len(),
            "'{}' {} to '{}' using {}",
            source_root.display(),
            verb,
            dest_root.display(),
            self.algorithm
        );
        self.observer.walk_finished(&report);
        Ok(report)
    }

    fn execute(&self, tasks: &[FileTask]) -> Result<Vec<Result<FileOutcome>>> {
        let run_one = |task: &FileTask| {
            compressor::process(task, &self.options, self.observer, &self.cancel)
        };

        if self.options.jobs <= 1 || tasks.len() <= 1 {
            return Ok(tasks.iter().map(run_one).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()
            .map_err(|e| ArchiveError::InvalidOption(e.to_string()))?;
        Ok(pool.install(|| tasks.par_iter().map(run_one).collect()))
    }

    fn task(&self, source: PathBuf, destination: PathBuf) -> FileTask {
        FileTask {
            source,
            destination,
            algorithm: self.algorithm,
            direction: self.direction,
        }
    }
}

impl Plan {
    fn skip(&mut self, path: &Path, reason: SkipReason) {
        warn!("Skipping '{}': {}", path.display(), reason);
        self.skipped.push(Skipped {
            path: path.to_path_buf(),
            reason,
        });
    }
}

/// Path of `dest_root` relative to `source_root` when the destination lives
/// strictly inside the source tree.
fn nested_destination(source_root: &Path, dest_root: &Path) -> Option<PathBuf> {
    let src = std::path::absolute(source_root).ok()?;
    let dst = std::path::absolute(dest_root).ok()?;
    let src = src.canonicalize().unwrap_or(src);
    let dst = canonicalize_existing(&dst);
    let rel = dst.strip_prefix(&src).ok()?;
    if rel.as_os_str().is_empty() {
        None
    } else {
        Some(rel.to_path_buf())
    }
}

/// Canonicalize the longest existing ancestor of `path` and re-append the rest.
fn canonicalize_existing(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        if let Ok(canon) = existing.canonicalize() {
            return rest.iter().rev().fold(canon, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Walk `source_root` into `dest_root` with default options and no progress.
pub fn walk(
    source_root: &Path,
    dest_root: &Path,
    algorithm: Algorithm,
    direction: Direction,
) -> Result<WalkReport> {
    Walker::new(algorithm, direction).run(source_root, dest_root)
}
