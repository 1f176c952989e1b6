//! Reusable CPU scratch memory for the readback path.

use crate::error::BlitError;

/// Provides a temporary byte buffer of at least `len` bytes.
///
/// The contents of the returned slice are unspecified.
pub trait ScratchMemory {
    fn scratch(&mut self, len: usize) -> Result<&mut [u8], BlitError>;
}

/// Growable scratch buffer, optionally capped at a byte limit.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    bytes: Vec<u8>,
    limit: Option<usize>,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests above `limit` bytes fail with [`BlitError::ScratchAllocation`].
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit: Some(limit),
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }
}

impl ScratchMemory for ScratchBuffer {
    fn scratch(&mut self, len: usize) -> Result<&mut [u8], BlitError> {
        if self.limit.is_some_and(|limit| len > limit) {
            return Err(BlitError::ScratchAllocation { requested: len });
        }
        if self.bytes.len() < len {
            self.bytes
                .try_reserve(len - self.bytes.len())
                .map_err(|_| BlitError::ScratchAllocation { requested: len })?;
            self.bytes.resize(len, 0);
        }
        Ok(&mut self.bytes[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_and_reuses() {
        let mut buf = ScratchBuffer::new();
        assert_eq!(buf.scratch(16).unwrap().len(), 16);
        let cap = buf.capacity();
        assert_eq!(buf.scratch(8).unwrap().len(), 8);
        assert_eq!(buf.capacity(), cap);
    }

    #[test]
    fn limit_is_enforced() {
        let mut buf = ScratchBuffer::with_limit(64);
        assert!(buf.scratch(64).is_ok());
        assert!(matches!(
            buf.scratch(65),
            Err(BlitError::ScratchAllocation { requested: 65 })
        ));
    }
}
