//! The opaque input abstraction read by the Producer.
//!
//! The Producer never knows or cares what backs the bytes it reads, only
//! that it can pull up to a buffer's worth at a time and will eventually see
//! EOF. Modeled as a narrow async trait rather than requiring
//! `tokio::io::AsyncRead` directly, so callers backed by non-file-like
//! sources (e.g. an in-memory `Bytes`, a channel) don't need to implement
//! the full `AsyncRead` contract.

use crate::errors::UploadResult;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A byte source the Producer drains in small fixed-size reads.
///
/// A `Ok(0)` return means EOF: the Producer then publishes the final size
/// and finishes the session.
#[async_trait]
pub trait Source: Send {
    /// Reads up to `buf.len()` bytes, returning the number of bytes placed
    /// into `buf`. Returns `Ok(0)` at end of stream.
    async fn read(&mut self, buf: &mut [u8]) -> UploadResult<usize>;
}

/// Adapts any [`tokio::io::AsyncRead`] into a [`Source`].
pub struct AsyncReadSource<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin + Send> AsyncReadSource<R> {
    /// Wraps an existing `AsyncRead` implementation.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Source for AsyncReadSource<R> {
    async fn read(&mut self, buf: &mut [u8]) -> UploadResult<usize> {
        self.inner
            .read(buf)
            .await
            .map_err(|e| crate::errors::UploadError::SourceRead(e.to_string()))
    }
}
