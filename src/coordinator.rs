//! The Coordinator: owns session lifecycle, spawns the Producer and
//! Consumer, and reconciles their outcomes into a single result.
//!
//! If both tasks report, the Producer's error takes precedence: a broken
//! source is the root cause of the Consumer ever seeing a short stream. If
//! the Consumer drains without ever parsing a terminal body, the Coordinator
//! issues one zero-length status probe before giving up, in case the upload
//! had in fact completed server-side and only the client's view is stale.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chunk::{put_chunk, ChunkWindow};
use crate::config::Config;
use crate::consumer::{self, ConsumerArgs, ConsumerOutcome};
use crate::errors::{UploadError, UploadResult};
use crate::producer::{self, ProducerStatus};
use crate::resilience::Pacer;
use crate::ringbuffer::RingBuffer;
use crate::session::{SessionInitiator, SessionState, UploadSession};
use crate::source::Source;
use crate::transport::HttpTransport;
use crate::types::{ObjectMetadata, UploadedObject};

/// Everything needed to run a single resumable upload end to end.
pub struct Coordinator<'a> {
    transport: &'a dyn HttpTransport,
    pacer: &'a Pacer,
    base_url: url::Url,
    config: Config,
}

impl<'a> Coordinator<'a> {
    /// Builds a coordinator against the given upload-endpoint base and
    /// configuration.
    pub fn new(
        transport: &'a dyn HttpTransport,
        pacer: &'a Pacer,
        base_url: url::Url,
        config: Config,
    ) -> Self {
        Self {
            transport,
            pacer,
            base_url,
            config,
        }
    }

    /// Runs a complete upload: opens a session, streams `source` through the
    /// ring buffer, and returns the server's decoded terminal metadata.
    ///
    /// `content_length` may be negative if the size of `source` is unknown
    /// up front; `file_id` distinguishes create-new (`None`) from
    /// update-existing (`Some`).
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        file_id: Option<&str>,
        metadata: &ObjectMetadata,
        media_type: &str,
        content_length: i64,
        remote_name: impl Into<String>,
        source: Box<dyn Source>,
        cancel: CancellationToken,
    ) -> UploadResult<UploadedObject> {
        let remote_name = remote_name.into();
        let initiator =
            SessionInitiator::new(self.transport, self.pacer, &self.base_url, &self.config);
        let mut session: UploadSession = initiator
            .initiate(file_id, metadata, media_type, content_length, &remote_name)
            .await
            .map_err(|e| {
                warn!(remote_name = %remote_name, error = %e, "session init failed");
                e
            })?;

        info!(
            remote_name = %remote_name,
            session_uri = %session.session_uri,
            content_length,
            "resumable upload session opened"
        );

        let buffer = Arc::new(RingBuffer::new(self.config.initial_buf_size));
        let producer_status = Arc::new(ProducerStatus::new());

        let producer_cancel = cancel.clone();
        let producer_buffer = buffer.clone();
        let producer_status_handle = producer_status.clone();
        let producer_config = self.config.clone();
        let producer_handle = tokio::spawn(async move {
            let result = producer::run(
                source,
                producer_buffer,
                producer_status_handle,
                producer_config,
                producer_cancel.clone(),
            )
            .await;
            if result.is_err() {
                // A dead Producer (a genuine read error, not a clean EOF)
                // publishes `finished` so the Consumer stops waiting on new
                // bytes, but it may still be blocked elsewhere (an
                // in-flight Pacer backoff, the inter-chunk delay). Cancel
                // the shared token so it unblocks promptly instead of
                // waiting out those timers.
                producer_cancel.cancel();
            }
            result
        });

        let consumer_args = ConsumerArgs {
            buffer,
            producer_status,
            transport: self.transport,
            pacer: self.pacer,
            session_uri: session.session_uri.clone(),
            media_type: session.media_type.clone(),
            initial_content_length: session.content_length,
            config: self.config.clone(),
            cancel: cancel.clone(),
        };
        let consumer_result = consumer::run(consumer_args).await;

        // The Producer never outlives the Consumer in a well-formed run, but
        // await it regardless so its error (if any) is available; it is
        // already finished or about to finish by the time the Consumer
        // returns. Its error takes precedence below when both report.
        let producer_result = producer_handle
            .await
            .unwrap_or_else(|e| Err(UploadError::Internal(format!("producer task panicked: {e}"))));

        match (producer_result, consumer_result) {
            (Err(producer_err), _) => {
                session.state = SessionState::FailedFatal;
                Err(producer_err)
            }
            (Ok(()), Err(consumer_err)) => {
                session.state = SessionState::FailedFatal;
                Err(consumer_err)
            }
            (Ok(()), Ok(ConsumerOutcome::Completed(object))) => {
                session.state = SessionState::FinishedOk;
                session.result = Some(object.clone());
                info!(remote_name = %remote_name, object_id = %object.id, "upload completed");
                Ok(object)
            }
            (Ok(()), Ok(ConsumerOutcome::DrainedIncomplete { last_status })) => {
                self.resolve_incomplete(&session, last_status, &cancel).await
            }
        }
    }

    /// Resolves an upload that drained without ever parsing a terminal
    /// body, by issuing one zero-length status probe. If the probe itself
    /// returns 200/201 the upload had in fact completed server-side;
    /// otherwise this surfaces the retryable [`UploadError::Incomplete`].
    async fn resolve_incomplete(
        &self,
        session: &UploadSession,
        last_status: u16,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadedObject> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        debug!(
            session_uri = %session.session_uri,
            last_status,
            "consumer drained without a terminal body; probing status"
        );

        let probe_total = if session.content_length >= 0 {
            Some(session.content_length as u64)
        } else {
            None
        };
        let probe = ChunkWindow {
            start_offset: 0,
            size: 0,
            total_size: probe_total,
            prefix: bytes::Bytes::new(),
            suffix: bytes::Bytes::new(),
        };
        let outcome = put_chunk(
            self.transport,
            &session.session_uri,
            &session.media_type,
            &probe,
        )
        .await;

        if let Some(object) = outcome.result {
            info!(
                session_uri = %session.session_uri,
                object_id = %object.id,
                "status probe found the upload already complete server-side"
            );
            return Ok(object);
        }

        Err(UploadError::Incomplete {
            last_status: outcome.status,
        })
    }
}
