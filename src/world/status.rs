use crate::error::{MpiError, Result};
use crate::types::{DataType, Rank, Tag};

/// Outcome of a receive or probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Rank the matched message came from.
    pub source: Rank,
    pub tag: Tag,
    /// Bytes copied into the caller's buffer. For a probe, the full length
    /// of the pending message.
    pub bytes: usize,
}

impl Status {
    pub fn new(source: Rank, tag: Tag, bytes: usize) -> Self {
        Self { source, tag, bytes }
    }

    /// Number of whole `dtype` elements transferred.
    ///
    /// Fails with `SizeMismatch` when `bytes` does not divide evenly.
    pub fn get_count(&self, dtype: DataType) -> Result<usize> {
        let elem_size = dtype.size_in_bytes();
        if self.bytes % elem_size != 0 {
            return Err(MpiError::SizeMismatch {
                bytes: self.bytes,
                dtype,
                elem_size,
            });
        }
        Ok(self.bytes / elem_size)
    }
}
