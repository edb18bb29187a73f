//! Fixed-capacity byte ring buffer shared between the Producer and Consumer.
//!
//! All mutating operations (`write`, `advance`, `grow`) serialize on one
//! `tokio::sync::Mutex`: growth is observed atomically by subsequent
//! operations, and the two-slice read view handed to the Consumer is only
//! valid because the Consumer is the sole caller of `advance`/`grow` between
//! snapshotting a view and consuming it -- growth never runs while a view is
//! borrowed.

use crate::errors::{UploadError, UploadResult};
use bytes::Bytes;
use tokio::sync::Mutex;

struct Inner {
    storage: Vec<u8>,
    capacity: usize,
    /// Index of the first readable byte.
    read_pos: usize,
    /// Number of valid, unconsumed bytes currently stored.
    readable: usize,
}

impl Inner {
    fn write_pos(&self) -> usize {
        (self.read_pos + self.readable) % self.capacity
    }

    fn free(&self) -> usize {
        self.capacity - self.readable
    }
}

/// A fixed-capacity (until grown) byte queue with write/read/advance
/// primitives and a two-slice read view that avoids copying across the wrap
/// boundary into one contiguous buffer.
pub struct RingBuffer {
    inner: Mutex<Inner>,
}

impl RingBuffer {
    /// Allocates a new ring buffer with the given initial capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                storage: vec![0u8; capacity],
                capacity,
                read_pos: 0,
                readable: 0,
            }),
        }
    }

    /// Copies as many bytes as fit from `bytes` into the buffer. Returns the
    /// number of bytes actually written; the caller must retry the remainder
    /// once more room is available.
    pub async fn write(&self, bytes: &[u8]) -> usize {
        let mut inner = self.inner.lock().await;
        let n = bytes.len().min(inner.free());
        if n == 0 {
            return 0;
        }

        let capacity = inner.capacity;
        let start = inner.write_pos();
        let first_len = (capacity - start).min(n);
        let second_len = n - first_len;

        inner.storage[start..start + first_len].copy_from_slice(&bytes[..first_len]);
        if second_len > 0 {
            inner.storage[..second_len].copy_from_slice(&bytes[first_len..first_len + second_len]);
        }
        inner.readable += n;
        n
    }

    /// Returns the number of readable (unconsumed) bytes.
    pub async fn readable(&self) -> usize {
        self.inner.lock().await.readable
    }

    /// Returns the current capacity.
    pub async fn capacity(&self) -> usize {
        self.inner.lock().await.capacity
    }

    /// Lends a read-only, non-consuming view over the first `len` readable
    /// bytes as (prefix, suffix), where `prefix` is contiguous from the read
    /// cursor and `suffix` is the wrapped remainder. `prefix.len() +
    /// suffix.len() == len`.
    ///
    /// `len` must not exceed the currently readable byte count.
    pub async fn view_two(&self, len: usize) -> UploadResult<(Bytes, Bytes)> {
        let inner = self.inner.lock().await;
        if len > inner.readable {
            return Err(UploadError::Internal(format!(
                "view_two({len}) exceeds readable ({})",
                inner.readable
            )));
        }

        let first_len = (inner.capacity - inner.read_pos).min(len);
        let second_len = len - first_len;

        let prefix = Bytes::copy_from_slice(
            &inner.storage[inner.read_pos..inner.read_pos + first_len],
        );
        let suffix = if second_len > 0 {
            Bytes::copy_from_slice(&inner.storage[..second_len])
        } else {
            Bytes::new()
        };

        Ok((prefix, suffix))
    }

    /// Marks `n` bytes as consumed, advancing the read cursor.
    pub async fn advance(&self, n: usize) -> UploadResult<()> {
        let mut inner = self.inner.lock().await;
        if n > inner.readable {
            return Err(UploadError::Internal(format!(
                "advance({n}) exceeds readable ({})",
                inner.readable
            )));
        }
        inner.read_pos = (inner.read_pos + n) % inner.capacity;
        inner.readable -= n;
        Ok(())
    }

    /// Grows the buffer to `new_cap`, preserving the logical readable region
    /// exactly. A no-op (returning `Ok(false)`) if `new_cap` does not exceed
    /// the current capacity.
    pub async fn grow(&self, new_cap: usize) -> UploadResult<bool> {
        let mut inner = self.inner.lock().await;
        if new_cap <= inner.capacity {
            return Ok(false);
        }
        if new_cap < inner.readable {
            return Err(UploadError::Internal(format!(
                "grow({new_cap}) would be smaller than readable ({})",
                inner.readable
            )));
        }

        let readable_before = inner.readable;
        let mut new_storage = vec![0u8; new_cap];

        let first_len = (inner.capacity - inner.read_pos).min(inner.readable);
        let second_len = inner.readable - first_len;
        new_storage[..first_len]
            .copy_from_slice(&inner.storage[inner.read_pos..inner.read_pos + first_len]);
        if second_len > 0 {
            new_storage[first_len..first_len + second_len].copy_from_slice(&inner.storage[..second_len]);
        }

        inner.storage = new_storage;
        inner.capacity = new_cap;
        inner.read_pos = 0;
        debug_assert_eq!(
            inner.readable, readable_before,
            "grow must preserve the readable byte count exactly"
        );

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_and_view_round_trip() {
        let buf = RingBuffer::new(16);
        assert_eq!(buf.write(b"hello world").await, 11);
        assert_eq!(buf.readable().await, 11);

        let (prefix, suffix) = buf.view_two(11).await.unwrap();
        let mut combined = Vec::new();
        combined.extend_from_slice(&prefix);
        combined.extend_from_slice(&suffix);
        assert_eq!(combined, b"hello world");
    }

    #[tokio::test]
    async fn write_reports_short_count_when_full() {
        let buf = RingBuffer::new(4);
        let n = buf.write(b"hello").await;
        assert_eq!(n, 4);
        assert_eq!(buf.readable().await, 4);
    }

    #[tokio::test]
    async fn advance_then_write_wraps_around() {
        let buf = RingBuffer::new(8);
        assert_eq!(buf.write(b"abcdef").await, 6);
        buf.advance(4).await.unwrap();
        assert_eq!(buf.readable().await, 2);

        // write_pos is now at (0 + 6) % 8 = 6, so this wraps.
        assert_eq!(buf.write(b"ghij").await, 4);
        assert_eq!(buf.readable().await, 6);

        let (prefix, suffix) = buf.view_two(6).await.unwrap();
        let mut combined = Vec::new();
        combined.extend_from_slice(&prefix);
        combined.extend_from_slice(&suffix);
        assert_eq!(combined, b"efghij");
    }

    #[tokio::test]
    async fn advance_beyond_readable_errors() {
        let buf = RingBuffer::new(8);
        buf.write(b"abc").await;
        assert!(buf.advance(4).await.is_err());
    }

    #[tokio::test]
    async fn grow_preserves_readable_bytes_across_the_wrap() {
        let buf = RingBuffer::new(8);
        buf.write(b"abcdef").await;
        buf.advance(4).await.unwrap();
        buf.write(b"ghij").await; // wraps: readable region is now "efghij"

        assert!(buf.grow(16).await.unwrap());
        assert_eq!(buf.capacity().await, 16);
        assert_eq!(buf.readable().await, 6);

        let (prefix, suffix) = buf.view_two(6).await.unwrap();
        let mut combined = Vec::new();
        combined.extend_from_slice(&prefix);
        combined.extend_from_slice(&suffix);
        assert_eq!(combined, b"efghij");
    }

    #[tokio::test]
    async fn grow_to_smaller_capacity_is_a_no_op() {
        let buf = RingBuffer::new(16);
        buf.write(b"abc").await;
        assert!(!buf.grow(8).await.unwrap());
        assert_eq!(buf.capacity().await, 16);
    }

    #[tokio::test]
    async fn view_two_beyond_readable_errors() {
        let buf = RingBuffer::new(8);
        buf.write(b"ab").await;
        assert!(buf.view_two(3).await.is_err());
    }
}
