//! Configuration for the resumable upload engine.

use crate::errors::{UploadError, UploadResult};
use std::time::Duration;

/// Required chunk-size alignment for every non-terminal PUT (256 KiB).
pub const CHUNK_ALIGNMENT: usize = 256 * 1024;

/// Producer read unit (32 KiB).
pub const SMALL_READ_UNIT: usize = 32 * 1024;

/// Starting ring buffer capacity (6 MiB).
pub const DEFAULT_INITIAL_BUF_SIZE: usize = 6 * 1024 * 1024;

/// Default upper bound on ring buffer capacity (32 MiB).
pub const DEFAULT_CHUNK_SIZE_MAX: usize = 32 * 1024 * 1024;

/// Never send a non-terminal chunk smaller than this (1 MiB).
pub const DEFAULT_MIN_NON_TERMINAL_CHUNK: usize = 1024 * 1024;

/// Capacity growth step (2 MiB).
pub const DEFAULT_GROWTH_STEP: usize = 2 * 1024 * 1024;

/// Producer backpressure sleep when the ring buffer is full.
pub const PRODUCER_BACKPRESSURE_SLEEP: Duration = Duration::from_millis(500);

/// Consumer sleep when below the minimum chunk threshold.
pub const CONSUMER_UNDERFLOW_SLEEP: Duration = Duration::from_millis(500);

/// Default response fields selector requested from the API.
pub const DEFAULT_FIELDS: &str =
    "id,name,mimeType,size,md5Checksum,modifiedTime,parents";

/// Engine configuration, built via [`Config::builder`].
///
/// A plain data struct plus a method-chained builder that validates on
/// `build()`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on ring buffer capacity. Bounds memory per upload and the
    /// maximum single-request body size.
    pub chunk_size_max: usize,

    /// Starting ring buffer capacity.
    pub initial_buf_size: usize,

    /// Producer read unit.
    pub small_read_unit: usize,

    /// Never send a non-terminal chunk smaller than this.
    pub min_non_terminal_chunk: usize,

    /// Capacity growth step applied under sustained backpressure.
    pub growth_step: usize,

    /// Delay observed by the Consumer between chunk attempts. Zero disables
    /// the inter-chunk ticker entirely. Defaults to no delay; set this when
    /// a backend needs throttling between chunk requests.
    pub inter_chunk_delay: Duration,

    /// Forwarded into the session-init query as `keepRevisionForever=true`.
    pub keep_revision_forever: bool,

    /// Forwarded into the session-init query as `supportsAllDrives=true`.
    pub supports_all_drives: bool,

    /// Response fields selector forwarded into the session-init query.
    pub fields: String,

    /// Retry policy used by the [`crate::resilience::Pacer`].
    pub retry: crate::resilience::RetryConfig,
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// The backpressure-growth threshold: capacity minus one chunk alignment
    /// unit. When readable bytes exceed this, the Consumer begins counting
    /// toward a growth attempt.
    pub fn growth_pressure_threshold(&self, capacity: usize) -> usize {
        capacity.saturating_sub(CHUNK_ALIGNMENT)
    }

    fn validate(&self) -> UploadResult<()> {
        if self.chunk_size_max % CHUNK_ALIGNMENT != 0 {
            return Err(UploadError::Configuration(format!(
                "chunk_size_max ({}) must be a multiple of {CHUNK_ALIGNMENT}",
                self.chunk_size_max
            )));
        }
        if self.initial_buf_size == 0 || self.initial_buf_size > self.chunk_size_max {
            return Err(UploadError::Configuration(format!(
                "initial_buf_size ({}) must be nonzero and at most chunk_size_max ({})",
                self.initial_buf_size, self.chunk_size_max
            )));
        }
        if self.min_non_terminal_chunk < CHUNK_ALIGNMENT {
            return Err(UploadError::Configuration(format!(
                "min_non_terminal_chunk ({}) must be at least {CHUNK_ALIGNMENT}",
                self.min_non_terminal_chunk
            )));
        }
        if self.growth_step == 0 {
            return Err(UploadError::Configuration(
                "growth_step must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    chunk_size_max: usize,
    initial_buf_size: usize,
    small_read_unit: usize,
    min_non_terminal_chunk: usize,
    growth_step: usize,
    inter_chunk_delay: Duration,
    keep_revision_forever: bool,
    supports_all_drives: bool,
    fields: String,
    retry: crate::resilience::RetryConfig,
}

impl ConfigBuilder {
    /// Creates a new builder populated with the documented defaults.
    pub fn new() -> Self {
        Self {
            chunk_size_max: DEFAULT_CHUNK_SIZE_MAX,
            initial_buf_size: DEFAULT_INITIAL_BUF_SIZE,
            small_read_unit: SMALL_READ_UNIT,
            min_non_terminal_chunk: DEFAULT_MIN_NON_TERMINAL_CHUNK,
            growth_step: DEFAULT_GROWTH_STEP,
            inter_chunk_delay: Duration::ZERO,
            keep_revision_forever: false,
            supports_all_drives: true,
            fields: DEFAULT_FIELDS.to_string(),
            retry: crate::resilience::RetryConfig::default(),
        }
    }

    /// Sets the upper bound on ring buffer capacity.
    pub fn chunk_size_max(mut self, bytes: usize) -> Self {
        self.chunk_size_max = bytes;
        self
    }

    /// Sets the starting ring buffer capacity.
    pub fn initial_buf_size(mut self, bytes: usize) -> Self {
        self.initial_buf_size = bytes;
        self
    }

    /// Sets the Producer's read unit.
    pub fn small_read_unit(mut self, bytes: usize) -> Self {
        self.small_read_unit = bytes;
        self
    }

    /// Sets the minimum non-terminal chunk size.
    pub fn min_non_terminal_chunk(mut self, bytes: usize) -> Self {
        self.min_non_terminal_chunk = bytes;
        self
    }

    /// Sets the capacity growth step.
    pub fn growth_step(mut self, bytes: usize) -> Self {
        self.growth_step = bytes;
        self
    }

    /// Sets the delay the Consumer observes between chunk attempts.
    pub fn inter_chunk_delay(mut self, delay: Duration) -> Self {
        self.inter_chunk_delay = delay;
        self
    }

    /// Sets whether to request permanent revision retention.
    pub fn keep_revision_forever(mut self, keep: bool) -> Self {
        self.keep_revision_forever = keep;
        self
    }

    /// Sets whether the session-init request should support shared drives.
    pub fn supports_all_drives(mut self, supports: bool) -> Self {
        self.supports_all_drives = supports;
        self
    }

    /// Sets the response fields selector.
    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    /// Sets the retry policy used by the Pacer.
    pub fn retry(mut self, retry: crate::resilience::RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builds the configuration, validating the chunk-alignment invariants.
    pub fn build(self) -> UploadResult<Config> {
        let config = Config {
            chunk_size_max: self.chunk_size_max,
            initial_buf_size: self.initial_buf_size,
            small_read_unit: self.small_read_unit,
            min_non_terminal_chunk: self.min_non_terminal_chunk,
            growth_step: self.growth_step,
            inter_chunk_delay: self.inter_chunk_delay,
            keep_revision_forever: self.keep_revision_forever,
            supports_all_drives: self.supports_all_drives,
            fields: self.fields,
            retry: self.retry,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.chunk_size_max, DEFAULT_CHUNK_SIZE_MAX);
        assert_eq!(config.initial_buf_size, DEFAULT_INITIAL_BUF_SIZE);
        assert_eq!(config.inter_chunk_delay, Duration::ZERO);
        assert!(config.supports_all_drives);
    }

    #[test]
    fn rejects_misaligned_chunk_size_max() {
        let result = Config::builder().chunk_size_max(1_000_000).build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_min_non_terminal_below_alignment() {
        let result = Config::builder().min_non_terminal_chunk(1024).build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_initial_buf_size_above_max() {
        let result = Config::builder()
            .chunk_size_max(4 * 1024 * 1024)
            .initial_buf_size(8 * 1024 * 1024)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn growth_pressure_threshold_is_capacity_minus_one_chunk() {
        let config = Config::builder().build().unwrap();
        assert_eq!(
            config.growth_pressure_threshold(4 * 1024 * 1024),
            4 * 1024 * 1024 - CHUNK_ALIGNMENT
        );
    }
}
