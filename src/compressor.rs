use std::cell::Cell;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

use crate::codec::{Algorithm, Direction, SIGNATURE_LEN};
use crate::config::ProcessOptions;
use crate::error::{ArchiveError, Result};
use crate::progress::{NoopObserver, ProgressObserver};

/// One file to compress or decompress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub algorithm: Algorithm,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOutcome {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Shared flag flipped on user interrupt; checked once per chunk.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run a single task through its codec.
///
/// Output goes to a temporary file next to the destination and is renamed
/// into place only once the stream completed, so a failed or interrupted
/// task never leaves a partial destination behind.
pub fn process(
    task: &FileTask,
    options: &ProcessOptions,
    observer: &dyn ProgressObserver,
    cancel: &CancelFlag,
) -> Result<FileOutcome> {
    let result = process_inner(task, options, observer, cancel);
    observer.task_finished(task, &result);
    result
}

fn process_inner(
    task: &FileTask,
    options: &ProcessOptions,
    observer: &dyn ProgressObserver,
    cancel: &CancelFlag,
) -> Result<FileOutcome> {
    if cancel.is_cancelled() {
        return Err(ArchiveError::Interrupted(task.source.clone()));
    }

    let source = File::open(&task.source).map_err(|e| ArchiveError::source_io(&task.source, e))?;
    let total = source
        .metadata()
        .map_err(|e| ArchiveError::source_io(&task.source, e))?
        .len();

    let parent = match task.destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| ArchiveError::dest_io(parent, e))?;
    let tmp = staging_file(parent).map_err(|e| ArchiveError::dest_io(parent, e))?;

    observer.task_started(task, total);
    debug!(
        source = %task.source.display(),
        tmp = %tmp.path().display(),
        "streaming through {}", task.algorithm
    );

    let bytes_in = match task.direction {
        Direction::Compress => compress_stream(task, source, tmp.as_file(), options, observer, cancel)?,
        Direction::Decompress => {
            decompress_stream(task, source, tmp.as_file(), options, observer, cancel)?
        }
    };

    let bytes_out = tmp
        .as_file()
        .metadata()
        .map_err(|e| ArchiveError::dest_io(tmp.path(), e))?
        .len();
    tmp.persist(&task.destination)
        .map_err(|e| ArchiveError::dest_io(&task.destination, e.error))?;

    let verb = match task.direction {
        Direction::Compress => "compressed",
        Direction::Decompress => "decompressed",
    };
    info!(
        bytes_in,
        bytes_out,
        "File '{}' {} to '{}' using {}",
        task.source.display(),
        verb,
        task.destination.display(),
        task.algorithm
    );

    Ok(FileOutcome { bytes_in, bytes_out })
}

fn compress_stream(
    task: &FileTask,
    mut source: File,
    out: &File,
    options: &ProcessOptions,
    observer: &dyn ProgressObserver,
    cancel: &CancelFlag,
) -> Result<u64> {
    let dest_err = |e| ArchiveError::dest_io(&task.destination, e);
    let mut encoder = task
        .algorithm
        .encoder(BufWriter::with_capacity(options.chunk_size, out), options.level);
    let mut buf = vec![0u8; options.chunk_size];
    let mut done = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(ArchiveError::Interrupted(task.source.clone()));
        }
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ArchiveError::source_io(&task.source, e)),
        };
        encoder.write_all(&buf[..n]).map_err(dest_err)?;
        done += n as u64;
        observer.bytes_processed(task, done);
    }

    let mut writer = encoder.finish().map_err(dest_err)?;
    writer.flush().map_err(dest_err)?;
    Ok(done)
}

fn decompress_stream(
    task: &FileTask,
    source: File,
    out: &File,
    options: &ProcessOptions,
    observer: &dyn ProgressObserver,
    cancel: &CancelFlag,
) -> Result<u64> {
    let dest_err = |e| ArchiveError::dest_io(&task.destination, e);
    let stats = Rc::new(ReadStats::default());
    let tracked = TrackedReader {
        inner: source,
        stats: Rc::clone(&stats),
    };
    let mut reader = BufReader::with_capacity(options.chunk_size.max(SIGNATURE_LEN), tracked);

    let head = reader
        .fill_buf()
        .map_err(|e| ArchiveError::source_io(&task.source, e))?;
    task.algorithm
        .check_signature(&head[..head.len().min(SIGNATURE_LEN)])
        .map_err(|reason| ArchiveError::CorruptOrMismatchedStream {
            path: task.source.clone(),
            algorithm: task.algorithm,
            reason,
        })?;

    let mut decoder = task.algorithm.decoder(reader);
    let mut writer = BufWriter::with_capacity(options.chunk_size, out);
    let mut buf = vec![0u8; options.chunk_size];

    loop {
        if cancel.is_cancelled() {
            return Err(ArchiveError::Interrupted(task.source.clone()));
        }
        let n = match decoder.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if stats.failed.get() => return Err(ArchiveError::source_io(&task.source, e)),
            Err(e) => {
                return Err(ArchiveError::CorruptOrMismatchedStream {
                    path: task.source.clone(),
                    algorithm: task.algorithm,
                    reason: e.to_string(),
                });
            }
        };
        writer.write_all(&buf[..n]).map_err(dest_err)?;
        observer.bytes_processed(task, stats.bytes.get());
    }

    writer.flush().map_err(dest_err)?;
    Ok(stats.bytes.get())
}

/// Temporary output file in `dir`. Created with mode 0666 on unix so the
/// umask decides the final permissions, the same as a plain `File::create`.
pub(crate) fn staging_file(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

#[derive(Default)]
struct ReadStats {
    bytes: Cell<u64>,
    failed: Cell<bool>,
}

/// Source reader that remembers whether the file itself failed, so decoder
/// errors can be told apart from plain I/O errors.
struct TrackedReader<R> {
    inner: R,
    stats: Rc<ReadStats>,
}

impl<R: Read> Read for TrackedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(n) => {
                self.stats.bytes.set(self.stats.bytes.get() + n as u64);
                Ok(n)
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::Interrupted {
                    self.stats.failed.set(true);
                }
                Err(e)
            }
        }
    }
}

/// Compress one file with default options and no progress reporting.
pub fn compress_file(input: &Path, output: &Path, algorithm: Algorithm) -> Result<FileOutcome> {
    let task = FileTask {
        source: input.to_path_buf(),
        destination: output.to_path_buf(),
        algorithm,
        direction: Direction::Compress,
    };
    process(&task, &ProcessOptions::default(), &NoopObserver, &CancelFlag::new())
}

/// Decompress one file with default options and no progress reporting.
pub fn decompress_file(input: &Path, output: &Path, algorithm: Algorithm) -> Result<FileOutcome> {
    let task = FileTask {
        source: input.to_path_buf(),
        destination: output.to_path_buf(),
        algorithm,
        direction: Direction::Decompress,
    };
    process(&task, &ProcessOptions::default(), &NoopObserver, &CancelFlag::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<u64>>,
    }

    impl ProgressObserver for Recorder {
        fn bytes_processed(&self, _task: &FileTask, bytes_so_far: u64) {
            self.progress.lock().unwrap().push(bytes_so_far);
        }
    }

    fn task(src: &Path, dst: &Path, algorithm: Algorithm, direction: Direction) -> FileTask {
        FileTask {
            source: src.to_path_buf(),
            destination: dst.to_path_buf(),
            algorithm,
            direction,
        }
    }

    #[test]
    fn reports_progress_per_chunk() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("data.bin");
        fs::write(&src, vec![7u8; 10_000]).unwrap();
        let dst = dir.path().join("data.bin.gz");

        let opts = ProcessOptions {
            chunk_size: 4096,
            ..Default::default()
        };
        let rec = Recorder::default();
        let t = task(&src, &dst, Algorithm::Gzip, Direction::Compress);
        let outcome = process(&t, &opts, &rec, &CancelFlag::new()).unwrap();

        assert_eq!(outcome.bytes_in, 10_000);
        assert_eq!(*rec.progress.lock().unwrap(), vec![4096, 8192, 10_000]);
        assert_eq!(outcome.bytes_out, fs::metadata(&dst).unwrap().len());
    }

    #[test]
    fn missing_source_is_source_not_found() {
        let dir = tempdir().unwrap();
        let err = compress_file(
            &dir.path().join("nope.txt"),
            &dir.path().join("nope.txt.gz"),
            Algorithm::Gzip,
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::SourceNotFound(_)));
        assert!(!dir.path().join("nope.txt.gz").exists());
    }

    #[test]
    fn mismatched_stream_leaves_no_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"hello hello hello").unwrap();
        let packed = dir.path().join("a.txt.bz2");
        compress_file(&src, &packed, Algorithm::Bz2).unwrap();

        let out = dir.path().join("a.out");
        let err = decompress_file(&packed, &out, Algorithm::Lzma).unwrap_err();
        assert!(matches!(err, ArchiveError::CorruptOrMismatchedStream { .. }));
        assert!(!out.exists());
        // only the source and the packed file remain, no stray temp files
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn cancelled_before_start_is_interrupted() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"abc").unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let t = task(&src, &dir.path().join("a.txt.gz"), Algorithm::Gzip, Direction::Compress);
        let err = process(&t, &ProcessOptions::default(), &NoopObserver, &cancel).unwrap_err();
        assert!(matches!(err, ArchiveError::Interrupted(_)));
    }

    #[test]
    fn overwrites_existing_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"fresh contents").unwrap();
        let packed = dir.path().join("a.txt.zz");
        fs::write(&packed, b"stale").unwrap();

        compress_file(&src, &packed, Algorithm::Zlib).unwrap();
        let out = dir.path().join("a.round");
        decompress_file(&packed, &out, Algorithm::Zlib).unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"fresh contents");
    }

    #[cfg(unix)]
    #[test]
    fn output_permissions_follow_umask() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"shared").unwrap();
        let plain = dir.path().join("plain.txt");
        fs::write(&plain, b"reference").unwrap();
        let expected = fs::metadata(&plain).unwrap().permissions().mode() & 0o777;

        let packed = dir.path().join("a.txt.gz");
        compress_file(&src, &packed, Algorithm::Gzip).unwrap();
        assert_eq!(fs::metadata(&packed).unwrap().permissions().mode() & 0o777, expected);

        // replacing an existing destination does not narrow it either
        let back = dir.path().join("plain.txt");
        decompress_file(&packed, &back, Algorithm::Gzip).unwrap();
        assert_eq!(fs::metadata(&back).unwrap().permissions().mode() & 0o777, expected);
        assert_eq!(fs::read(&back).unwrap(), b"shared");
    }

    #[test]
    fn cancel_mid_file_discards_output() {
        struct CancelAfterFirstChunk(CancelFlag);

        impl ProgressObserver for CancelAfterFirstChunk {
            fn bytes_processed(&self, _task: &FileTask, _bytes_so_far: u64) {
                self.0.cancel();
            }
        }

        for direction in [Direction::Compress, Direction::Decompress] {
            let dir = tempdir().unwrap();
            let plain = dir.path().join("a.bin");
            fs::write(&plain, vec![3u8; 10_000]).unwrap();
            let packed = dir.path().join("a.bin.gz");
            compress_file(&plain, &packed, Algorithm::Gzip).unwrap();
            let (src, dst) = match direction {
                Direction::Compress => (plain.clone(), dir.path().join("fresh.gz")),
                Direction::Decompress => (packed.clone(), dir.path().join("fresh.bin")),
            };

            let cancel = CancelFlag::new();
            let observer = CancelAfterFirstChunk(cancel.clone());
            let opts = ProcessOptions {
                chunk_size: 16,
                ..Default::default()
            };
            let t = task(&src, &dst, Algorithm::Gzip, direction);
            let err = process(&t, &opts, &observer, &cancel).unwrap_err();
            assert!(matches!(err, ArchiveError::Interrupted(_)), "{direction:?}");
            assert!(!dst.exists());
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
        }
    }

    #[test]
    fn creates_missing_destination_parent() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"nested").unwrap();
        let dst = dir.path().join("x/y/z/a.txt.xz");
        compress_file(&src, &dst, Algorithm::Lzma).unwrap();
        assert!(dst.is_file());
    }
}
