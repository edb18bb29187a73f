//! The Consumer task: drains aligned chunks out of the ring buffer and PUTs
//! them through the Pacer.
//!
//! Each iteration watches the ring buffer for sustained backpressure and grows
//! it if needed, trims the next request to a 256 KiB-aligned window (the
//! remainder once the Producer has finished), and sends it through the Pacer,
//! which is configured to treat 308/200/201 as terminal (never retried) and
//! defer to the error's own retry classification otherwise.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chunk::{put_chunk, ChunkWindow};
use crate::config::{Config, CHUNK_ALIGNMENT};
use crate::errors::{UploadError, UploadResult};
use crate::producer::ProducerStatus;
use crate::resilience::{Attempt, Pacer};
use crate::ringbuffer::RingBuffer;
use crate::transport::HttpTransport;
use crate::types::UploadedObject;

/// Lower bound for the backpressure counter.
const OVERTIME_FLOOR: i32 = -5;
/// Threshold at which sustained pressure triggers a growth attempt.
const OVERTIME_GROWTH_THRESHOLD: i32 = 2;
/// Logged when a single PUT attempt takes at least this long.
const SLOW_ATTEMPT_THRESHOLD: Duration = Duration::from_secs(1);

/// Everything the Consumer needs to run its loop, grouped to keep
/// [`run`]'s signature manageable.
pub struct ConsumerArgs<'a> {
    /// Shared ring buffer.
    pub buffer: Arc<RingBuffer>,
    /// Producer completion status.
    pub producer_status: Arc<ProducerStatus>,
    /// HTTP transport used for chunk PUTs.
    pub transport: &'a dyn HttpTransport,
    /// Pacer governing per-chunk retries.
    pub pacer: &'a Pacer,
    /// Session URI to PUT against.
    pub session_uri: reqwest::Url,
    /// Media type echoed on every chunk request.
    pub media_type: String,
    /// Known total size at session-init time, or negative if unknown.
    pub initial_content_length: i64,
    /// Engine configuration.
    pub config: Config,
    /// Cancellation token propagated into every HTTP attempt.
    pub cancel: CancellationToken,
}

/// The Consumer's outcome: either a decoded terminal object, or a drained
/// stream that never saw one (the Coordinator turns the latter into an
/// [`UploadError::Incomplete`] after a status probe).
pub enum ConsumerOutcome {
    /// A terminal 2xx body was decoded.
    Completed(UploadedObject),
    /// The stream ended with only 308s observed; no terminal body parsed.
    DrainedIncomplete { last_status: u16 },
}

/// Runs the Consumer loop to completion.
pub async fn run(args: ConsumerArgs<'_>) -> UploadResult<ConsumerOutcome> {
    let ConsumerArgs {
        buffer,
        producer_status,
        transport,
        pacer,
        session_uri,
        media_type,
        initial_content_length,
        config,
        cancel,
    } = args;

    let mut start_offset: u64 = 0;
    let mut total_size: Option<u64> = if initial_content_length >= 0 {
        Some(initial_content_length as u64)
    } else {
        None
    };
    let overtime = AtomicI32::new(0);

    loop {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        maybe_grow(&buffer, &config, &overtime).await;

        let finished = producer_status.finished();
        let readable = buffer.readable().await;

        let req_size: u64 = if !finished {
            if readable < config.min_non_terminal_chunk {
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
            (readable - (readable % CHUNK_ALIGNMENT)) as u64
        } else {
            let producer_total = producer_status.total_size();
            if producer_total >= 0 {
                let mismatch = (start_offset as i64 + readable as i64) - producer_total;
                if mismatch.unsigned_abs() as usize > CHUNK_ALIGNMENT {
                    return Err(UploadError::Internal(format!(
                        "terminal size mismatch too large: start {} + readable {} != total {}",
                        start_offset, readable, producer_total
                    )));
                } else if mismatch != 0 {
                    warn!(
                        start_offset,
                        readable, producer_total, "terminal chunk size mismatch"
                    );
                }
                total_size = Some(producer_total as u64);
            }
            readable as u64
        };

        let (prefix, suffix) = buffer.view_two(req_size as usize).await?;
        let window = ChunkWindow {
            start_offset,
            size: req_size,
            total_size,
            prefix,
            suffix,
        };

        let attempt_started = Instant::now();
        let outcome = pacer
            .call(|| async {
                let outcome = put_chunk(transport, &session_uri, &media_type, &window).await;
                match (outcome.status, outcome.error) {
                    (308, _) | (200, _) | (201, _) => Attempt {
                        again: false,
                        result: Ok((outcome.status, outcome.result)),
                    },
                    (_, Some(e)) if e.is_retryable() => Attempt::retry(e),
                    (_, Some(e)) => Attempt::fatal(e),
                    (status, None) => Attempt::fatal(UploadError::Http {
                        status,
                        message: "unexpected status with no classified error".into(),
                    }),
                }
            })
            .await?;

        let elapsed = attempt_started.elapsed();
        if elapsed >= SLOW_ATTEMPT_THRESHOLD {
            info!(
                start_offset,
                req_size,
                status = outcome.0,
                ?elapsed,
                "chunk attempt was slow"
            );
        }

        let (status, result) = outcome;

        buffer.advance(req_size as usize).await?;
        start_offset += req_size;

        if let Some(object) = result {
            return Ok(ConsumerOutcome::Completed(object));
        }

        if finished && total_size.is_some_and(|t| start_offset >= t) {
            return Ok(ConsumerOutcome::DrainedIncomplete { last_status: status });
        }

        if !config.inter_chunk_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(config.inter_chunk_delay) => {}
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            }
        }
    }
}

/// Applies the backpressure heuristic and, if sustained pressure is
/// observed, grows the buffer.
async fn maybe_grow(buffer: &RingBuffer, config: &Config, overtime: &AtomicI32) {
    let readable = buffer.readable().await;
    let capacity = buffer.capacity().await;
    let threshold = config.growth_pressure_threshold(capacity);

    if readable > threshold {
        let previous = overtime.fetch_add(1, Ordering::Relaxed);
        if previous + 1 > OVERTIME_GROWTH_THRESHOLD {
            let proposed = (capacity + config.growth_step).min(config.chunk_size_max);
            if proposed > capacity {
                match buffer.grow(proposed).await {
                    Ok(true) => {
                        debug!(new_capacity = proposed, "ring buffer grown under sustained pressure");
                    }
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "ring buffer growth failed"),
                }
            }
            overtime.store(0, Ordering::Relaxed);
        }
    } else {
        let previous = overtime.load(Ordering::Relaxed);
        if previous > OVERTIME_FLOOR {
            overtime.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overtime_triggers_growth_under_sustained_pressure() {
        let buffer = RingBuffer::new(4 * CHUNK_ALIGNMENT);
        buffer.write(&vec![0u8; 4 * CHUNK_ALIGNMENT - 1]).await;
        let config = Config::builder()
            .chunk_size_max(8 * CHUNK_ALIGNMENT)
            .growth_step(2 * CHUNK_ALIGNMENT)
            .build()
            .unwrap();
        let overtime = AtomicI32::new(0);

        maybe_grow(&buffer, &config, &overtime).await;
        maybe_grow(&buffer, &config, &overtime).await;
        assert_eq!(buffer.capacity().await, 4 * CHUNK_ALIGNMENT);

        maybe_grow(&buffer, &config, &overtime).await;
        assert_eq!(buffer.capacity().await, 6 * CHUNK_ALIGNMENT);
        assert_eq!(overtime.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn growth_never_exceeds_chunk_size_max() {
        let buffer = RingBuffer::new(4 * CHUNK_ALIGNMENT);
        buffer.write(&vec![0u8; 4 * CHUNK_ALIGNMENT - 1]).await;
        let config = Config::builder()
            .chunk_size_max(5 * CHUNK_ALIGNMENT)
            .growth_step(8 * CHUNK_ALIGNMENT)
            .build()
            .unwrap();
        let overtime = AtomicI32::new(0);

        for _ in 0..4 {
            maybe_grow(&buffer, &config, &overtime).await;
        }
        assert_eq!(buffer.capacity().await, 5 * CHUNK_ALIGNMENT);
    }

    #[tokio::test]
    async fn low_pressure_decrements_overtime_down_to_floor() {
        let buffer = RingBuffer::new(4 * CHUNK_ALIGNMENT);
        let config = Config::builder().build().unwrap();
        let overtime = AtomicI32::new(-3);

        maybe_grow(&buffer, &config, &overtime).await;
        assert_eq!(overtime.load(Ordering::Relaxed), -4);
        maybe_grow(&buffer, &config, &overtime).await;
        assert_eq!(overtime.load(Ordering::Relaxed), -5);
        maybe_grow(&buffer, &config, &overtime).await;
        assert_eq!(overtime.load(Ordering::Relaxed), -5);
    }
}
