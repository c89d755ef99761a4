use crate::error::{ArchiveError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20; // 1 MiB

/// Knobs shared by the single-file processor and the walker.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Bytes read per step; bounds memory use per file.
    pub chunk_size: usize,
    /// Compression level; `None` uses the algorithm default.
    pub level: Option<u32>,
    /// Files processed at once. `1` keeps everything on the calling thread.
    pub jobs: usize,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            level: None,
            jobs: 1,
        }
    }
}

impl ProcessOptions {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ArchiveError::InvalidOption(
                "chunk size must be greater than zero".into(),
            ));
        }
        if self.jobs == 0 {
            return Err(ArchiveError::InvalidOption(
                "jobs must be at least 1".into(),
            ));
        }
        if let Some(level) = self.level
            && level > 9
        {
            return Err(ArchiveError::InvalidOption(format!(
                "level {level} is out of range 0..=9"
            )));
        }
        Ok(())
    }
}
