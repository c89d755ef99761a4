//! File and folder compression with gzip, zlib, bz2 and lzma, plus plain
//! upload/download of files to Amazon S3 and Google Cloud Storage.
//!
//! The pieces, leaf first: [`codec`] maps an [`Algorithm`] to a streaming
//! encoder/decoder, [`compressor`] runs one file through it, and [`walker`]
//! mirrors a directory tree while dispatching one task per file.

pub mod cloud;
pub mod codec;
pub mod compressor;
pub mod config;
pub mod error;
pub mod progress;
pub mod summary;
pub mod walker;

pub use codec::{Algorithm, Direction};
pub use compressor::{CancelFlag, FileOutcome, FileTask, compress_file, decompress_file};
pub use config::ProcessOptions;
pub use error::{ArchiveError, Result};
pub use progress::{NoopObserver, ProgressObserver, TerminalProgress};
pub use walker::{WalkReport, Walker, walk};
