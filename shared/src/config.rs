use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{KeyError, Prefix};
use crate::{
    DEFAULT_ALBUM, DEFAULT_PREFIX, DEFAULT_PULL_REFRESH_THRESHOLD, DELETE_TIMEOUT,
    DOWNLOAD_TIMEOUT, LIST_TIMEOUT, MAX_OPERATION_TIMEOUT, MAX_UPLOAD_BYTES, MIN_OPERATION_TIMEOUT,
    RESOLVE_TIMEOUT, UPLOAD_TIMEOUT,
};

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ConfigError {
    #[error(transparent)]
    Prefix(#[from] KeyError),

    #[error("album name cannot be empty")]
    EmptyAlbum,

    #[error("invalid pull-to-refresh threshold: {0}")]
    InvalidThreshold(f64),

    #[error("upload size limit must be positive")]
    ZeroUploadLimit,
}

/// Runtime settings handed over by the shell at startup. Every field has a
/// default, so a shell may send a partial JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub prefix: String,
    pub album: String,
    pub list_timeout_ms: u64,
    pub resolve_timeout_ms: u64,
    pub upload_timeout_ms: u64,
    pub delete_timeout_ms: u64,
    pub download_timeout_ms: u64,
    /// Overscroll distance, in points, past the top edge that counts as a
    /// pull-to-refresh gesture.
    pub pull_refresh_threshold: f64,
    /// Whether a denied picker permission is reported to the user. The
    /// download path always reports its denial.
    pub notify_picker_permission_denied: bool,
    pub max_upload_bytes: usize,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            album: DEFAULT_ALBUM.to_string(),
            list_timeout_ms: duration_ms(LIST_TIMEOUT),
            resolve_timeout_ms: duration_ms(RESOLVE_TIMEOUT),
            upload_timeout_ms: duration_ms(UPLOAD_TIMEOUT),
            delete_timeout_ms: duration_ms(DELETE_TIMEOUT),
            download_timeout_ms: duration_ms(DOWNLOAD_TIMEOUT),
            pull_refresh_threshold: DEFAULT_PULL_REFRESH_THRESHOLD,
            notify_picker_permission_denied: true,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl GalleryConfig {
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    #[must_use]
    pub fn with_pull_refresh_threshold(mut self, threshold: f64) -> Self {
        self.pull_refresh_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_picker_denial_notice(mut self, notify: bool) -> Self {
        self.notify_picker_permission_denied = notify;
        self
    }

    #[must_use]
    pub fn with_max_upload_bytes(mut self, max_bytes: usize) -> Self {
        self.max_upload_bytes = max_bytes;
        self
    }

    /// Sets every gateway and download deadline to the same value.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.list_timeout_ms = timeout_ms;
        self.resolve_timeout_ms = timeout_ms;
        self.upload_timeout_ms = timeout_ms;
        self.delete_timeout_ms = timeout_ms;
        self.download_timeout_ms = timeout_ms;
        self
    }

    /// Normalises the prefix, clamps deadlines and rejects values the
    /// core cannot work with.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.prefix = Prefix::new(self.prefix)?.as_str().to_string();

        self.album = self.album.trim().to_string();
        if self.album.is_empty() {
            return Err(ConfigError::EmptyAlbum);
        }

        if !self.pull_refresh_threshold.is_finite() || self.pull_refresh_threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(self.pull_refresh_threshold));
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }

        self.list_timeout_ms = clamp_timeout(self.list_timeout_ms);
        self.resolve_timeout_ms = clamp_timeout(self.resolve_timeout_ms);
        self.upload_timeout_ms = clamp_timeout(self.upload_timeout_ms);
        self.delete_timeout_ms = clamp_timeout(self.delete_timeout_ms);
        self.download_timeout_ms = clamp_timeout(self.download_timeout_ms);

        Ok(self)
    }

    /// The validated namespace prefix. Falls back to the default when the
    /// config was mutated without going through `validated`.
    #[must_use]
    pub fn prefix(&self) -> Prefix {
        Prefix::new(self.prefix.clone()).unwrap_or_else(|e| {
            tracing::warn!(prefix = %self.prefix, error = %e, "invalid prefix, using default");
            Prefix::default()
        })
    }

    #[must_use]
    pub fn is_pull_refresh(&self, offset_y: f64) -> bool {
        offset_y.is_finite() && offset_y <= -self.pull_refresh_threshold
    }
}

fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn clamp_timeout(timeout_ms: u64) -> u64 {
    timeout_ms.clamp(
        duration_ms(MIN_OPERATION_TIMEOUT),
        duration_ms(MAX_OPERATION_TIMEOUT),
    )
}
