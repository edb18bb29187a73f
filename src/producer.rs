//! The Producer task: drains the source stream into the ring buffer.
//!
//! Runs as a plain async function inside its own `tokio::task`, reading
//! small fixed-size chunks from the source and writing them into the shared
//! ring buffer, retrying whatever doesn't fit after a short backpressure
//! sleep.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::errors::{UploadError, UploadResult};
use crate::ringbuffer::RingBuffer;
use crate::source::Source;

/// State shared between the Producer and Consumer that is safe to publish
/// without the ring buffer's mutex: the Producer writes it only after the
/// corresponding bytes have already landed in the buffer, so the Consumer
/// never observes `finished` before the bytes it announces are readable.
pub struct ProducerStatus {
    finished: AtomicBool,
    total_size: AtomicI64,
}

impl ProducerStatus {
    /// Creates a fresh status with `finished = false` and an unknown total size.
    pub fn new() -> Self {
        Self {
            finished: AtomicBool::new(false),
            total_size: AtomicI64::new(-1),
        }
    }

    /// True once the Producer has observed EOF (or a read error -- the
    /// Consumer should stop waiting on more bytes either way).
    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// The total object size, once known. Negative while still unknown.
    pub fn total_size(&self) -> i64 {
        self.total_size.load(Ordering::Acquire)
    }

    fn publish_finished(&self, total: i64) {
        self.total_size.store(total, Ordering::Release);
        self.finished.store(true, Ordering::Release);
    }
}

impl Default for ProducerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the Producer loop to completion: reads `config.small_read_unit`
/// bytes at a time from `source`, writes them into `buffer`, retrying
/// whatever doesn't fit after a backpressure sleep, and publishes
/// `status.finished`/`status.total_size` on EOF.
pub async fn run(
    mut source: Box<dyn Source>,
    buffer: Arc<RingBuffer>,
    status: Arc<ProducerStatus>,
    config: Config,
    cancel: CancellationToken,
) -> UploadResult<()> {
    let mut scratch = vec![0u8; config.small_read_unit];
    let mut position: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let n = match source.read(&mut scratch).await {
            Ok(n) => n,
            Err(e) => {
                // Publish finished/total even on a read error (not just a
                // clean EOF), so the Consumer stops waiting on bytes that
                // will never arrive instead of spinning on the minimum
                // non-terminal chunk threshold forever.
                status.publish_finished(position as i64);
                return Err(e);
            }
        };
        if n == 0 {
            status.publish_finished(position as i64);
            debug!(total_size = position, "producer observed EOF");
            return Ok(());
        }

        let mut remaining = &scratch[..n];
        while !remaining.is_empty() {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            let written = buffer.write(remaining).await;
            remaining = &remaining[written..];
            if !remaining.is_empty() {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
        position += n as u64;
    }
}
