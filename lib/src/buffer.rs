//! Chained-chunk byte buffer used for the accept-side request and response
//! bodies. Chunks are kept as received so appending never copies; callers
//! flatten only when a contiguous view is needed.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

#[derive(Debug, Default)]
pub struct BufferList {
    bufs: VecDeque<Bytes>,
    size: usize,
}

impl BufferList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn append(&mut self, buf: Bytes) {
        if buf.is_empty() {
            return;
        }
        self.size += buf.len();
        self.bufs.push_back(buf);
    }

    pub fn clear(&mut self) {
        self.bufs.clear();
        self.size = 0;
    }

    /// Contiguous copy of the buffered bytes, leaving the list intact.
    pub fn to_bytes(&self) -> Bytes {
        if self.bufs.len() == 1 {
            return self.bufs[0].clone();
        }
        let mut out = BytesMut::with_capacity(self.size);
        for buf in &self.bufs {
            out.extend_from_slice(buf);
        }
        out.freeze()
    }

    /// Drains the list, returning everything buffered so far.
    pub fn take(&mut self) -> Bytes {
        let out = self.to_bytes();
        self.clear();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_len() {
        let mut list = BufferList::new();
        assert!(list.is_empty());

        list.append(Bytes::from_static(b"hello"));
        list.append(Bytes::new());
        list.append(Bytes::from_static(b" world"));
        assert_eq!(list.len(), 11);
        assert_eq!(list.to_bytes(), Bytes::from_static(b"hello world"));
        // to_bytes leaves the contents in place
        assert_eq!(list.len(), 11);
    }

    #[test]
    fn single_chunk_is_not_copied() {
        let mut list = BufferList::new();
        let chunk = Bytes::from_static(b"only");
        list.append(chunk.clone());
        let out = list.to_bytes();
        assert_eq!(out, chunk);
    }

    #[test]
    fn take_drains() {
        let mut list = BufferList::new();
        list.append(Bytes::from_static(b"abc"));
        list.append(Bytes::from_static(b"def"));
        assert_eq!(list.take(), Bytes::from_static(b"abcdef"));
        assert!(list.is_empty());
        assert_eq!(list.take(), Bytes::new());
    }

    #[test]
    fn clear_resets() {
        let mut list = BufferList::new();
        list.append(Bytes::from_static(b"abc"));
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.to_bytes(), Bytes::new());
    }
}
