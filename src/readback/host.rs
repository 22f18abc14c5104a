use std::collections::BTreeMap;

use thiserror::Error;

/// Pixel buffers currently lent to the host, keyed by the address the host received.
///
/// The registry keeps ownership of every buffer, the host only holds a raw pointer into it. This
/// turns freeing into a lookup: unknown addresses, including ones that were already freed, are
/// simply not found.
#[derive(Debug, Default)]
pub struct PixelBufferRegistry {
    buffers: BTreeMap<usize, Box<[u8]>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PixelBufferError {
    #[error("refusing to hand out an empty pixel buffer")]
    Empty,
}

impl PixelBufferRegistry {
    pub const fn new() -> Self {
        Self {
            buffers: BTreeMap::new(),
        }
    }

    /// Takes ownership of `pixels` and returns the address to give to the host.
    pub fn lend(&mut self, mut pixels: Box<[u8]>) -> Result<*mut u8, PixelBufferError> {
        // empty boxes share a dangling address, they could not be told apart
        if pixels.is_empty() {
            return Err(PixelBufferError::Empty);
        }

        let ptr = pixels.as_mut_ptr();
        self.buffers.insert(ptr as usize, pixels);

        Ok(ptr)
    }

    /// Drops the buffer lent at `ptr` and returns its length, or `None` if nothing is lent there.
    pub fn reclaim(&mut self, ptr: *const u8) -> Option<usize> {
        if ptr.is_null() {
            return None;
        }

        self.buffers.remove(&(ptr as usize)).map(|pixels| pixels.len())
    }

    pub fn len_of(&self, ptr: *const u8) -> Option<usize> {
        self.buffers.get(&(ptr as usize)).map(|pixels| pixels.len())
    }

    /// Number of buffers the host has not freed yet.
    pub fn outstanding(&self) -> usize {
        self.buffers.len()
    }

    pub fn outstanding_bytes(&self) -> usize {
        self.buffers.values().map(|pixels| pixels.len()).sum()
    }
}
