//! Buffer management for packet payloads

use bytes::{Bytes, BytesMut};

/// A reference-counted, immutable payload buffer
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    data: Bytes,
}

impl Buffer {
    /// Create a new buffer from bytes
    pub fn new(data: Bytes) -> Self {
        Buffer { data }
    }

    /// Create a buffer from a vector
    pub fn from_vec(vec: Vec<u8>) -> Self {
        Buffer {
            data: Bytes::from(vec),
        }
    }

    /// Create an empty buffer
    pub fn empty() -> Self {
        Buffer { data: Bytes::new() }
    }

    /// Get the length of the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a slice of the buffer data
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Clone the underlying bytes (cheap, reference counted)
    pub fn clone_bytes(&self) -> Bytes {
        self.data.clone()
    }
}

/// A growable buffer used while a packet is being assembled
#[derive(Debug, Default)]
pub struct BufferRef {
    data: BytesMut,
}

impl BufferRef {
    /// Create a new mutable buffer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        BufferRef {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the length of the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append data to the buffer
    pub fn extend_from_slice(&mut self, slice: &[u8]) {
        self.data.extend_from_slice(slice);
    }

    /// Freeze the buffer into an immutable Buffer
    pub fn freeze(self) -> Buffer {
        Buffer {
            data: self.data.freeze(),
        }
    }
}
