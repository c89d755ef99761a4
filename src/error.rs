use std::path::PathBuf;

use thiserror::Error;

use crate::codec::Algorithm;

/// Errors produced by the codec, the single-file processor, the walker and
/// the cloud backends.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unsupported algorithm '{0}' (expected one of gzip, zlib, bz2, lzma)")]
    UnsupportedAlgorithm(String),

    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("cannot read {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid {algorithm} stream: {reason}", path.display())]
    CorruptOrMismatchedStream {
        path: PathBuf,
        algorithm: Algorithm,
        reason: String,
    },

    #[error("{provider} transfer failed for {bucket}/{key}: {cause}")]
    CloudTransferError {
        provider: &'static str,
        bucket: String,
        key: String,
        cause: String,
    },

    #[error("interrupted while processing {}", .0.display())]
    Interrupted(PathBuf),

    #[error("invalid option: {0}")]
    InvalidOption(String),
}

impl ArchiveError {
    /// Short stable name used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            ArchiveError::UnsupportedAlgorithm(_) => "UnsupportedAlgorithm",
            ArchiveError::SourceNotFound(_) => "SourceNotFound",
            ArchiveError::SourceUnreadable { .. } => "SourceUnreadable",
            ArchiveError::DestinationUnwritable { .. } => "DestinationUnwritable",
            ArchiveError::CorruptOrMismatchedStream { .. } => "CorruptOrMismatchedStream",
            ArchiveError::CloudTransferError { .. } => "CloudTransferError",
            ArchiveError::Interrupted(_) => "Interrupted",
            ArchiveError::InvalidOption(_) => "InvalidOption",
        }
    }

    /// Argument and configuration errors, reported before any processing.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ArchiveError::UnsupportedAlgorithm(_)
                | ArchiveError::SourceNotFound(_)
                | ArchiveError::InvalidOption(_)
        )
    }

    pub(crate) fn source_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            ArchiveError::SourceNotFound(path)
        } else {
            ArchiveError::SourceUnreadable { path, source: err }
        }
    }

    pub(crate) fn dest_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        ArchiveError::DestinationUnwritable {
            path: path.into(),
            source: err,
        }
    }
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;
