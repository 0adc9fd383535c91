//! Chunked float staging buffer
//!
//! Vertex attribute data is accumulated here before upload so a draw with
//! many instances does not reallocate per push. Growth is amortized: when a
//! chunk fills up the next one is three times as large, and chunks are only
//! coalesced into a single contiguous slice when the data is read back.

/// Amortized-growth float storage.
#[derive(Debug)]
pub struct GrowableFloatBuffer {
    chunks: Vec<Vec<f32>>,
    len: usize,
}

const DEFAULT_CAPACITY: usize = 1000;

impl Default for GrowableFloatBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl GrowableFloatBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            chunks: vec![Vec::with_capacity(capacity.max(1))],
            len: 0,
        }
    }

    /// Number of floats written since the last `reset`.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clear contents, retaining the coalesced capacity for reuse.
    pub fn reset(&mut self) {
        self.coalesce();
        self.chunks[0].clear();
        self.len = 0;
    }

    pub fn push(&mut self, value: f32) {
        self.push_slice(&[value]);
    }

    pub fn push_slice(&mut self, mut src: &[f32]) {
        while !src.is_empty() {
            let full = self
                .chunks
                .last()
                .map_or(true, |c| c.len() == c.capacity());
            if full {
                let grown = self
                    .chunks
                    .last()
                    .map_or(DEFAULT_CAPACITY, |c| c.capacity() * 3)
                    .max(src.len());
                self.chunks.push(Vec::with_capacity(grown));
            }
            let last = self.chunks.len() - 1;
            let tail = &mut self.chunks[last];
            let avail = tail.capacity() - tail.len();
            let take = avail.min(src.len());
            tail.extend_from_slice(&src[..take]);
            self.len += take;
            src = &src[take..];
        }
    }

    /// Contiguous view of everything written. Coalesces chunks if needed.
    pub fn data(&mut self) -> &[f32] {
        self.coalesce();
        &self.chunks[0]
    }

    fn coalesce(&mut self) {
        if self.chunks.len() <= 1 {
            return;
        }
        let mut merged = Vec::with_capacity(self.len.max(DEFAULT_CAPACITY));
        for chunk in &self.chunks {
            merged.extend_from_slice(chunk);
        }
        self.chunks = vec![merged];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read() {
        let mut buf = GrowableFloatBuffer::with_capacity(4);
        buf.push_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.data(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_growth_across_chunks() {
        let mut buf = GrowableFloatBuffer::with_capacity(2);
        let src: Vec<f32> = (0..17).map(|i| i as f32).collect();
        buf.push_slice(&src);
        buf.push(17.0);
        let expected: Vec<f32> = (0..18).map(|i| i as f32).collect();
        assert_eq!(buf.data(), expected.as_slice());
    }

    #[test]
    fn test_reset_keeps_capacity_and_clears() {
        let mut buf = GrowableFloatBuffer::with_capacity(2);
        buf.push_slice(&[1.0; 50]);
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.data(), &[] as &[f32]);
        buf.push_slice(&[2.0; 3]);
        assert_eq!(buf.data(), &[2.0, 2.0, 2.0]);
    }
}
