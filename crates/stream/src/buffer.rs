//! Bounded FIFO buffer for outbound chunks held during reconnects.

use std::collections::VecDeque;

/// Holds chunks that arrive while the channel is not `Connected`.
///
/// Capacity is fixed at construction. When full, pushing drops the OLDEST
/// chunk: for audio-like payloads, losing the stalest data is preferable
/// to losing the freshest.
pub struct ChunkBuffer {
    chunks: VecDeque<Vec<u8>>,
    capacity: usize,
}

impl ChunkBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Enqueues a chunk, returning the dropped oldest chunk if the buffer
    /// was full.
    pub fn push(&mut self, chunk: Vec<u8>) -> Option<Vec<u8>> {
        let dropped = if self.chunks.len() >= self.capacity {
            self.chunks.pop_front()
        } else {
            None
        };
        self.chunks.push_back(chunk);
        dropped
    }

    /// Removes and returns all buffered chunks in insertion order.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        self.chunks.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
