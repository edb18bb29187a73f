//! A single chunk PUT attempt against a resumable session URI.
//!
//! # Protocol
//!
//! Every attempt sends `Content-Length`, `Content-Type`, and a `Content-Range`
//! header describing the byte window (or a zero-length status probe). The
//! response is classified into one of: `308 Resume Incomplete` (non-terminal
//! chunk accepted), a decodable 2xx (terminal chunk accepted, body carries the
//! final object), a transport failure (synthesized as status 599), or a
//! terminal body that failed to decode (synthesized as status 598).

use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::errors::UploadError;
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};
use crate::types::UploadedObject;

/// `308 Resume Incomplete`: a non-terminal chunk was accepted.
pub const STATUS_RESUME_INCOMPLETE: u16 = 308;

/// Synthetic status used when the transport itself failed (no real response).
pub const STATUS_TRANSPORT_ERROR: u16 = 599;

/// Synthetic status used when a terminal 2xx response body failed to decode.
pub const STATUS_DECODE_ERROR: u16 = 598;

/// A window of bytes to PUT in one chunk attempt.
///
/// Transient: constructed fresh for every attempt and never outlives it.
pub struct ChunkWindow {
    /// Absolute byte offset since the start of the object.
    pub start_offset: u64,
    /// Bytes to send. Zero only for a status probe.
    pub size: u64,
    /// Known total object size, or `None` while it is still unknown (`*`).
    pub total_size: Option<u64>,
    /// The bytes to send, as a two-slice view from the ring buffer.
    pub prefix: Bytes,
    /// The wrapped remainder of the view.
    pub suffix: Bytes,
}

impl ChunkWindow {
    fn content_range(&self) -> String {
        let total = self
            .total_size
            .map(|t| t.to_string())
            .unwrap_or_else(|| "*".to_string());
        if self.size == 0 {
            format!("bytes */{total}")
        } else {
            format!(
                "bytes {}-{}/{total}",
                self.start_offset,
                self.start_offset + self.size - 1
            )
        }
    }

    fn body(&self) -> Bytes {
        if self.suffix.is_empty() {
            self.prefix.clone()
        } else {
            let mut combined = BytesMut::with_capacity(self.prefix.len() + self.suffix.len());
            combined.extend_from_slice(&self.prefix);
            combined.extend_from_slice(&self.suffix);
            combined.freeze()
        }
    }
}

/// Outcome of one chunk PUT attempt.
pub struct ChunkOutcome {
    /// The observed (or synthetic) status code.
    pub status: u16,
    /// Non-fatal outcome error, if any (the caller decides whether to retry).
    pub error: Option<UploadError>,
    /// The decoded terminal body, present only on a successful 200/201.
    pub result: Option<UploadedObject>,
}

/// Sends one chunk PUT attempt and classifies the response.
///
/// This function never retries; it is meant to be invoked from inside a
/// [`crate::resilience::Pacer::call`] closure, which decides retry policy
/// from the returned [`ChunkOutcome`].
pub async fn put_chunk(
    transport: &dyn HttpTransport,
    session_uri: &reqwest::Url,
    media_type: &str,
    window: &ChunkWindow,
) -> ChunkOutcome {
    let mut request = HttpRequest::new(HttpMethod::Post, session_uri.clone());
    request.headers.insert(
        reqwest::header::CONTENT_LENGTH,
        HeaderValue::from(window.size),
    );
    if let Ok(value) = HeaderValue::from_str(media_type) {
        request
            .headers
            .insert(reqwest::header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&window.content_range()) {
        request
            .headers
            .insert(HeaderName::from_static("content-range"), value);
    }
    request.body = window.body();

    debug!(
        start = window.start_offset,
        size = window.size,
        content_range = %window.content_range(),
        "sending chunk"
    );

    let response = match transport.send(request).await {
        Ok(response) => response,
        Err(e) => {
            return ChunkOutcome {
                status: STATUS_TRANSPORT_ERROR,
                error: Some(e),
                result: None,
            };
        }
    };

    let status = response.status;
    if status == STATUS_RESUME_INCOMPLETE {
        return ChunkOutcome {
            status,
            error: None,
            result: None,
        };
    }

    if (200..300).contains(&status) {
        return match serde_json::from_slice::<UploadedObject>(&response.body) {
            Ok(object) => ChunkOutcome {
                status,
                error: None,
                result: Some(object),
            },
            Err(e) => {
                warn!(error = %e, "terminal response body failed to decode");
                ChunkOutcome {
                    status: STATUS_DECODE_ERROR,
                    error: Some(UploadError::Decode(e.to_string())),
                    result: None,
                }
            }
        };
    }

    ChunkOutcome {
        status,
        error: Some(UploadError::Http {
            status,
            message: String::from_utf8_lossy(&response.body).into_owned(),
        }),
        result: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: u64, size: u64, total: Option<u64>) -> ChunkWindow {
        ChunkWindow {
            start_offset: start,
            size,
            total_size: total,
            prefix: Bytes::from_static(b"hello "),
            suffix: Bytes::from_static(b"world"),
        }
    }

    #[test]
    fn content_range_uses_star_for_unknown_total() {
        let w = window(0, 11, None);
        assert_eq!(w.content_range(), "bytes 0-10/*");
    }

    #[test]
    fn content_range_uses_numeric_total_for_terminal_chunk() {
        let w = window(100, 11, Some(111));
        assert_eq!(w.content_range(), "bytes 100-110/111");
    }

    #[test]
    fn probe_content_range_has_no_byte_range() {
        let w = window(50, 0, Some(100));
        assert_eq!(w.content_range(), "bytes */100");
    }

    #[test]
    fn body_concatenates_prefix_and_suffix() {
        let w = window(0, 11, None);
        assert_eq!(&w.body()[..], b"hello world");
    }
}
