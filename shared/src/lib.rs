#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod model;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capabilities::{GatewayError, MediaError, PickerError};
use crate::config::ConfigError;
use crate::model::{KeyError, NoticeKind, StoredImage, UploadStage};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::GalleryConfig;
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use model::{Model, Notice, ObjectKey, PermissionState};

pub const DEFAULT_PREFIX: &str = "images";
pub const DEFAULT_ALBUM: &str = "Download";
pub const DEFAULT_PULL_REFRESH_THRESHOLD: f64 = 50.0;
pub const FALLBACK_FILE_NAME: &str = "image";
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const LIST_TIMEOUT: Duration = Duration::from_secs(30);
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(15);
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);
pub const MIN_OPERATION_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);
pub const LOADING_TEXT: &str = "Loading…";
pub const UPLOADING_TEXT: &str = "Uploading…";

// --- Errors ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    PermissionDenied,
    Gateway,
    NotFound,
    Unauthorized,
    QuotaExceeded,
    Timeout,
    Network,
    LocalIo,
    Validation,
    ImageTooLarge,
    InvalidState,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Gateway => "GATEWAY_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::Timeout => "TIMEOUT",
            Self::Network => "NETWORK_ERROR",
            Self::LocalIo => "LOCAL_IO_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::ImageTooLarge => "IMAGE_TOO_LARGE",
            Self::InvalidState => "INVALID_STATE",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Informational only: nothing in the core retries on its own.
    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Timeout | Self::Network | Self::Gateway | Self::LocalIo => {
                ErrorSeverity::Transient
            }
            Self::PermissionDenied
            | Self::NotFound
            | Self::Unauthorized
            | Self::QuotaExceeded
            | Self::Validation
            | Self::ImageTooLarge
            | Self::InvalidState
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_permission(self) -> bool {
        matches!(self, Self::PermissionDenied)
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::PermissionDenied => "Permission required",
            Self::Gateway | Self::NotFound | Self::Unauthorized | Self::QuotaExceeded => {
                "Storage error"
            }
            Self::Timeout | Self::Network => "Connection problem",
            Self::LocalIo => "File error",
            Self::Validation | Self::ImageTooLarge => "Can't continue",
            Self::InvalidState | Self::Unknown => "Something went wrong",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
        }
    }

    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::PermissionDenied | ErrorKind::Validation => self.message.clone(),
            ErrorKind::Gateway => format!("The storage service reported an error: {}", self.message),
            ErrorKind::NotFound => "The image could not be found. It may have been removed.".into(),
            ErrorKind::Unauthorized => "You are not allowed to access this storage.".into(),
            ErrorKind::QuotaExceeded => "The storage quota has been reached.".into(),
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::LocalIo => format!("A file operation failed: {}", self.message),
            ErrorKind::ImageTooLarge => "The image is too large to upload.".into(),
            ErrorKind::InvalidState | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        let kind = match &e {
            GatewayError::NotFound { .. } => ErrorKind::NotFound,
            GatewayError::Unauthorized => ErrorKind::Unauthorized,
            GatewayError::QuotaExceeded => ErrorKind::QuotaExceeded,
            GatewayError::Timeout { .. } => ErrorKind::Timeout,
            GatewayError::Network { .. } => ErrorKind::Network,
            GatewayError::InvalidResponse { .. } | GatewayError::Other { .. } => ErrorKind::Gateway,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<MediaError> for AppError {
    fn from(e: MediaError) -> Self {
        match &e {
            MediaError::PermissionDenied => AppError::permission_denied(
                "Allow access to your photo library to save images.",
            ),
            MediaError::Timeout { .. } => AppError::new(ErrorKind::Timeout, e.to_string()),
            MediaError::DownloadFailed { .. }
            | MediaError::StorageFull
            | MediaError::ImportFailed { .. } => AppError::new(ErrorKind::LocalIo, e.to_string()),
            MediaError::InvalidResponse { .. } => AppError::new(ErrorKind::Unknown, e.to_string()),
        }
    }
}

impl From<PickerError> for AppError {
    fn from(e: PickerError) -> Self {
        match &e {
            PickerError::PermissionDenied => AppError::permission_denied(
                "Allow access to your photos to pick an image.",
            ),
            PickerError::AssetTooLarge { .. } => {
                AppError::new(ErrorKind::ImageTooLarge, e.to_string())
            }
            PickerError::Unavailable { .. } | PickerError::ReadFailed { .. } => {
                AppError::new(ErrorKind::LocalIo, e.to_string())
            }
            PickerError::Busy => AppError::new(ErrorKind::InvalidState, e.to_string()),
            PickerError::InvalidResponse { .. } => AppError::new(ErrorKind::Unknown, e.to_string()),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::validation(format!("Invalid gallery settings: {e}"))
    }
}

impl From<KeyError> for AppError {
    fn from(e: KeyError) -> Self {
        AppError::validation(format!("Cannot store this file: {e}"))
    }
}

#[cfg(target_arch = "wasm32")]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn get_current_time_ms() -> u64 {
    js_sys::Date::now() as u64
}

#[cfg(not(target_arch = "wasm32"))]
#[must_use]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

// --- View model ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageTile {
    pub key: String,
    pub url: String,
}

impl From<&StoredImage> for ImageTile {
    fn from(image: &StoredImage) -> Self {
        Self {
            key: image.key.to_string(),
            url: image.url.as_str().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewView {
    pub url: String,
    pub file_name: String,
    pub is_downloading: bool,
    pub is_deleting: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GalleryView {
    pub is_loading: bool,
    /// True only while a pull-to-refresh fetch is running.
    pub is_refreshing: bool,
    pub loading_text: Option<String>,
    pub tiles: Vec<ImageTile>,
    pub preview: Option<PreviewView>,
    pub is_empty: bool,
    /// Photo library access as last reported by the shell.
    pub media_permission: PermissionState,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UploadView {
    pub stage: UploadStage,
    pub preview_uri: Option<String>,
    pub file_name: Option<String>,
    pub status_text: Option<String>,
    pub can_pick: bool,
    pub can_submit: bool,
    pub can_clear: bool,
    pub picker_permission: PermissionState,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoticeView {
    pub id: String,
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl From<&Notice> for NoticeView {
    fn from(n: &Notice) -> Self {
        Self {
            id: n.id.to_string(),
            kind: n.kind,
            title: n.title.clone(),
            message: n.message.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ViewModel {
    pub gallery: GalleryView,
    pub upload: UploadView,
    pub notice: Option<NoticeView>,
}
