//! Session initiation and the upload session's lifecycle state.
//!
//! The handshake exchanges object metadata for a resumable session URI that
//! every subsequent chunk PUT targets.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::config::Config;
use crate::errors::{UploadError, UploadResult};
use crate::resilience::{Attempt, Pacer};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};
use crate::types::{ObjectMetadata, UploadedObject};

/// Where an [`UploadSession`] sits in its lifecycle. Tracked alongside the
/// session purely for assertions and structured logging; no code branches
/// on it directly (the Coordinator's return value is authoritative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The session URI has not yet been obtained.
    Init,
    /// Chunks are being transferred.
    Active,
    /// The server returned a terminal 2xx with a decodable body.
    FinishedOk,
    /// The session failed in a way that must not be retried.
    FailedFatal,
    /// The session failed in a way the caller should retry with a fresh
    /// session: resumable sessions do not survive a lost URI.
    FailedRetryable,
}

/// Everything the chunk loop needs once a session URI has been obtained.
#[derive(Debug, Clone)]
pub struct UploadSession {
    /// The resumable session URI returned in the init response's `Location`
    /// header.
    pub session_uri: Url,
    /// The media MIME type, echoed on every chunk request.
    pub media_type: String,
    /// Full object size in bytes, or a negative value if unknown at session
    /// start. An unknown size is carried through as `*` in `Content-Range`
    /// until the Producer observes EOF.
    pub content_length: i64,
    /// The object name being created or updated, for logging.
    pub remote_name: String,
    /// The decoded terminal response body, once the upload completes.
    pub result: Option<UploadedObject>,
    /// Current lifecycle state.
    pub state: SessionState,
}

impl UploadSession {
    /// True if `content_length` was not known at session-init time.
    pub fn size_unknown(&self) -> bool {
        self.content_length < 0
    }
}

/// Performs the session-init handshake: POSTs (or PATCHes, when updating an
/// existing object) the object metadata and returns the session URI captured
/// from the response's `Location` header.
pub struct SessionInitiator<'a> {
    transport: &'a dyn HttpTransport,
    pacer: &'a Pacer,
    base_url: &'a Url,
    config: &'a Config,
}

impl<'a> SessionInitiator<'a> {
    /// Builds an initiator against the given upload endpoint base (e.g.
    /// `https://www.googleapis.com/upload/drive/v3/files`).
    pub fn new(
        transport: &'a dyn HttpTransport,
        pacer: &'a Pacer,
        base_url: &'a Url,
        config: &'a Config,
    ) -> Self {
        Self {
            transport,
            pacer,
            base_url,
            config,
        }
    }

    /// Initiates a session for a new object (`file_id = None`) or an update
    /// to an existing one (`file_id = Some(id)`, which switches the method
    /// to PATCH and appends `setModifiedDate=true`, matching the original).
    pub async fn initiate(
        &self,
        file_id: Option<&str>,
        metadata: &ObjectMetadata,
        media_type: &str,
        content_length: i64,
        remote_name: impl Into<String>,
    ) -> UploadResult<UploadSession> {
        let remote_name = remote_name.into();
        let body = serde_json::to_vec(metadata)
            .map_err(|e| UploadError::SessionInit(format!("failed to encode metadata: {e}")))?;

        let mut url = self.base_url.clone();
        if let Some(id) = file_id {
            url.path_segments_mut()
                .map_err(|_| UploadError::SessionInit("upload base URL cannot be a base".into()))?
                .push(id);
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "json");
            query.append_pair("uploadType", "resumable");
            query.append_pair("fields", &self.config.fields);
            query.append_pair("supportsAllDrives", &self.config.supports_all_drives.to_string());
            if self.config.keep_revision_forever {
                query.append_pair("keepRevisionForever", "true");
            }
            if file_id.is_some() {
                query.append_pair("setModifiedDate", "true");
            }
        }

        let method = if file_id.is_some() {
            HttpMethod::Patch
        } else {
            HttpMethod::Post
        };

        let location = self
            .pacer
            .call(|| async {
                let mut headers = HeaderMap::new();
                headers.insert(
                    reqwest::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json; charset=UTF-8"),
                );
                if let Ok(value) = HeaderValue::from_str(media_type) {
                    headers.insert(
                        HeaderName::from_static("x-upload-content-type"),
                        value,
                    );
                }
                if content_length >= 0 {
                    if let Ok(value) = HeaderValue::from_str(&content_length.to_string()) {
                        headers.insert(
                            HeaderName::from_static("x-upload-content-length"),
                            value,
                        );
                    }
                }

                let mut request = HttpRequest::new(method, url.clone());
                request.headers = headers;
                request.body = body.clone().into();

                match self.transport.send(request).await {
                    Ok(response) if (200..300).contains(&response.status) => {
                        match response.headers.get(reqwest::header::LOCATION) {
                            Some(value) => match value.to_str().ok().and_then(|s| Url::parse(s).ok()) {
                                Some(url) => Attempt::done(url),
                                None => Attempt::fatal(UploadError::SessionInit(
                                    "Location header was not a valid URL".into(),
                                )),
                            },
                            None => Attempt::fatal(UploadError::SessionInit(
                                "session-init response carried no Location header".into(),
                            )),
                        }
                    }
                    Ok(response) if (500..600).contains(&response.status) => {
                        Attempt::retry(UploadError::Http {
                            status: response.status,
                            message: String::from_utf8_lossy(&response.body).into_owned(),
                        })
                    }
                    Ok(response) => Attempt::fatal(UploadError::Http {
                        status: response.status,
                        message: String::from_utf8_lossy(&response.body).into_owned(),
                    }),
                    Err(e) => Attempt::retry(e),
                }
            })
            .await?;

        Ok(UploadSession {
            session_uri: location,
            media_type: media_type.to_string(),
            content_length,
            remote_name,
            result: None,
            state: SessionState::Active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::RetryConfig;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex as StdMutex;

    struct FakeTransport {
        responses: StdMutex<Vec<crate::transport::HttpResponse>>,
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn send(
            &self,
            _request: HttpRequest,
        ) -> Result<crate::transport::HttpResponse, UploadError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("no more fake responses");
            }
            Ok(responses.remove(0))
        }
    }

    fn response_with_location(location: &str) -> crate::transport::HttpResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::LOCATION,
            HeaderValue::from_str(location).unwrap(),
        );
        crate::transport::HttpResponse {
            status: 200,
            headers,
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn initiate_captures_session_uri_from_location_header() {
        let transport = FakeTransport {
            responses: StdMutex::new(vec![response_with_location(
                "https://example.com/upload/session/abc123",
            )]),
        };
        let pacer = Pacer::new(RetryConfig::default());
        let base_url = Url::parse("https://example.com/upload/drive/v3/files").unwrap();
        let config = Config::builder().build().unwrap();
        let initiator = SessionInitiator::new(&transport, &pacer, &base_url, &config);

        let metadata = ObjectMetadata {
            name: "large_file.bin".to_string(),
            ..Default::default()
        };
        let session = initiator
            .initiate(None, &metadata, "application/octet-stream", 786432, "large_file.bin")
            .await
            .unwrap();

        assert_eq!(
            session.session_uri.as_str(),
            "https://example.com/upload/session/abc123"
        );
        assert_eq!(session.state, SessionState::Active);
        assert!(!session.size_unknown());
    }

    #[tokio::test]
    async fn initiate_fails_without_location_header() {
        let transport = FakeTransport {
            responses: StdMutex::new(vec![crate::transport::HttpResponse {
                status: 200,
                headers: HeaderMap::new(),
                body: Bytes::new(),
            }]),
        };
        let pacer = Pacer::new(RetryConfig::default());
        let base_url = Url::parse("https://example.com/upload/drive/v3/files").unwrap();
        let config = Config::builder().build().unwrap();
        let initiator = SessionInitiator::new(&transport, &pacer, &base_url, &config);
        let metadata = ObjectMetadata {
            name: "x".to_string(),
            ..Default::default()
        };

        let result = initiator.initiate(None, &metadata, "text/plain", -1, "x").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn initiate_retries_server_errors_then_succeeds() {
        let transport = FakeTransport {
            responses: StdMutex::new(vec![
                crate::transport::HttpResponse {
                    status: 503,
                    headers: HeaderMap::new(),
                    body: Bytes::new(),
                },
                response_with_location("https://example.com/upload/session/retried"),
            ]),
        };
        let pacer = Pacer::new(RetryConfig {
            initial_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(2),
            jitter: false,
            ..RetryConfig::default()
        });
        let base_url = Url::parse("https://example.com/upload/drive/v3/files").unwrap();
        let config = Config::builder().build().unwrap();
        let initiator = SessionInitiator::new(&transport, &pacer, &base_url, &config);
        let metadata = ObjectMetadata {
            name: "x".to_string(),
            ..Default::default()
        };

        let session = initiator
            .initiate(None, &metadata, "text/plain", -1, "x")
            .await
            .unwrap();
        assert_eq!(
            session.session_uri.as_str(),
            "https://example.com/upload/session/retried"
        );
    }
}
