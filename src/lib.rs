//! Streaming resumable-upload engine for Google Drive's resumable-upload
//! protocol.
//!
//! Adapts an open-ended byte stream of unknown or very large length into a
//! sequence of chunk-aligned HTTP PUTs, decoupling a slow/bursty producer
//! (the caller's [`Source`]) from a rate-limited, chunk-aligned consumer
//! (the cloud endpoint) via a bounded [`RingBuffer`] that grows adaptively
//! under backpressure, retrying individual chunks under an external
//! [`Pacer`].
//!
//! This crate implements only the upload engine itself. Credential
//! acquisition, the multi-backend storage abstraction, and the CLI frontend
//! that would normally surround it are out of scope: callers provide an
//! [`HttpTransport`] whose requests already carry a valid `Authorization`
//! header.
//!
//! # Example
//!
//! ```no_run
//! use integrations_google_drive::coordinator::Coordinator;
//! use integrations_google_drive::config::Config;
//! use integrations_google_drive::resilience::Pacer;
//! use integrations_google_drive::source::AsyncReadSource;
//! use integrations_google_drive::transport::ReqwestTransport;
//! use integrations_google_drive::types::ObjectMetadata;
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ReqwestTransport::default_client()?;
//! let config = Config::builder().build()?;
//! let pacer = Pacer::new(config.retry.clone());
//! let base_url = Url::parse("https://www.googleapis.com/upload/drive/v3/files")?;
//! let coordinator = Coordinator::new(&transport, &pacer, base_url, config);
//!
//! let file = tokio::fs::File::open("large_file.bin").await?;
//! let source = Box::new(AsyncReadSource::new(file));
//! let metadata = ObjectMetadata {
//!     name: "large_file.bin".to_string(),
//!     ..Default::default()
//! };
//!
//! let object = coordinator
//!     .run(
//!         None,
//!         &metadata,
//!         "application/octet-stream",
//!         -1,
//!         "large_file.bin",
//!         source,
//!         CancellationToken::new(),
//!     )
//!     .await?;
//! println!("uploaded {}", object.id);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// A single chunk PUT attempt and its response classification.
pub mod chunk;
/// Engine configuration and its builder.
pub mod config;
/// The Coordinator: session lifecycle, task orchestration, error reconciliation.
pub mod coordinator;
/// The Consumer task: chunk assembly, backpressure-driven growth, chunk PUTs.
pub mod consumer;
/// Typed error hierarchy for the upload engine.
pub mod errors;
/// The Producer task: drains the source stream into the ring buffer.
pub mod producer;
/// Resilience: the Pacer (retry/backoff) and its supporting types.
pub mod resilience;
/// The adaptively-growing byte ring buffer shared by Producer and Consumer.
pub mod ringbuffer;
/// Session initiation and the upload session's lifecycle state.
pub mod session;
/// The opaque input abstraction read by the Producer.
pub mod source;
/// HTTP transport abstraction consumed by session init and chunk PUTs.
pub mod transport;
/// Wire types exchanged with the upload endpoint.
pub mod types;

pub use config::{Config, ConfigBuilder};
pub use coordinator::Coordinator;
pub use errors::{UploadError, UploadResult};
pub use ringbuffer::RingBuffer;
pub use resilience::Pacer;
pub use session::{SessionState, UploadSession};
pub use source::Source;
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::{ObjectMetadata, UploadedObject};
