use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::config::GalleryConfig;
use crate::{get_current_time_ms, AppError, DEFAULT_PREFIX, FALLBACK_FILE_NAME};

pub const MAX_KEY_LENGTH: usize = 1024;
pub const MAX_PREFIX_LENGTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum KeyError {
    #[error("object key cannot be empty")]
    Empty,

    #[error("object key too long ({len} > {max})")]
    TooLong { len: usize, max: usize },

    #[error("object key contains control characters")]
    ControlCharacter,

    #[error("object key cannot contain path traversal sequences")]
    PathTraversal,

    #[error("object key cannot start with a path separator")]
    LeadingSeparator,

    #[error("invalid prefix: {reason}")]
    InvalidPrefix { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("invalid image url: {0}")]
pub struct UrlError(pub String);

// --- Object keys ---

/// Path-like identifier of a stored binary inside the bucket namespace,
/// e.g. `images/1700000000000_cat.png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Result<Self, KeyError> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    /// Builds the key for a fresh upload: `<prefix>/<timestamp>_<file name>`.
    pub fn for_upload(
        prefix: &Prefix,
        timestamp: UnixTimeMs,
        file_name: &str,
    ) -> Result<Self, KeyError> {
        let name = sanitize_file_name(file_name);
        Self::new(format!("{}/{}_{}", prefix.as_str(), timestamp.as_millis(), name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment of the key.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    #[must_use]
    pub fn is_under(&self, prefix: &Prefix) -> bool {
        self.0
            .strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    fn validate(key: &str) -> Result<(), KeyError> {
        if key.trim().is_empty() {
            return Err(KeyError::Empty);
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(KeyError::TooLong {
                len: key.len(),
                max: MAX_KEY_LENGTH,
            });
        }
        if key.chars().any(char::is_control) {
            return Err(KeyError::ControlCharacter);
        }
        if key.split('/').any(|segment| segment == "..") {
            return Err(KeyError::PathTraversal);
        }
        if key.starts_with('/') || key.starts_with('\\') {
            return Err(KeyError::LeadingSeparator);
        }
        Ok(())
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed namespace every object lives under. Stored without surrounding
/// slashes; `images/` and `/images` both normalise to `images`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);

impl Prefix {
    pub fn new(prefix: impl Into<String>) -> Result<Self, KeyError> {
        let raw = prefix.into();
        let trimmed = raw.trim().trim_matches('/');

        if trimmed.is_empty() {
            return Err(KeyError::InvalidPrefix {
                reason: "prefix cannot be empty".into(),
            });
        }
        if trimmed.len() > MAX_PREFIX_LENGTH {
            return Err(KeyError::InvalidPrefix {
                reason: format!("prefix exceeds {MAX_PREFIX_LENGTH} bytes"),
            });
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'))
        {
            return Err(KeyError::InvalidPrefix {
                reason: "prefix contains invalid characters".into(),
            });
        }
        if trimmed.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
            return Err(KeyError::InvalidPrefix {
                reason: "prefix contains an empty or relative segment".into(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Self(DEFAULT_PREFIX.to_string())
    }
}

impl TryFrom<String> for Prefix {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.0
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reduces a picker file name or URI tail to a single safe key segment.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let last = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Explicit timestamp unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        Self(get_current_time_ms())
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

// --- Resolved URLs ---

/// Fetchable download URL handed back by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageUrl(String);

impl ImageUrl {
    pub fn new(s: impl Into<String>) -> Result<Self, UrlError> {
        let s = s.into();
        match url::Url::parse(&s) {
            Ok(parsed) if matches!(parsed.scheme(), "https" | "http") => Ok(Self(s)),
            _ => Err(UrlError(s)),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ImageUrl {
    type Error = UrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImageUrl> for String {
    fn from(url: ImageUrl) -> Self {
        url.0
    }
}

// --- Collection ---

/// One entry of the key registry: the object key kept beside its URL so
/// that delete never has to parse the URL back into a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub key: ObjectKey,
    pub url: ImageUrl,
}

impl StoredImage {
    #[must_use]
    pub fn new(key: ObjectKey, url: ImageUrl) -> Self {
        Self { key, url }
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        self.key.file_name()
    }
}

/// Full listing as returned by the last accepted fetch. Replaced
/// wholesale, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    generation: u64,
    images: Vec<StoredImage>,
}

impl CollectionSnapshot {
    #[must_use]
    pub fn new(generation: u64, images: Vec<StoredImage>) -> Self {
        Self { generation, images }
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn images(&self) -> &[StoredImage] {
        &self.images
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    #[must_use]
    pub fn find_by_url(&self, url: &str) -> Option<&StoredImage> {
        self.images.iter().find(|image| image.url.as_str() == url)
    }

    #[must_use]
    pub fn contains_key(&self, key: &ObjectKey) -> bool {
        self.images.iter().any(|image| &image.key == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchTrigger {
    Mount,
    Gesture,
    AfterDelete,
    AfterUpload,
}

/// Generation token for listing requests. Every fetch gets a new
/// generation and only the latest one may replace the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchGuard {
    generation: u64,
    in_flight: Option<FetchTrigger>,
}

impl FetchGuard {
    pub fn begin(&mut self, trigger: FetchTrigger) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.in_flight = Some(trigger);
        self.generation
    }

    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.in_flight.is_some() && self.generation == generation
    }

    /// Marks the fetch as done. Returns false for stale generations,
    /// whose results must be dropped.
    pub fn finish(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.in_flight = None;
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn is_gesture_in_flight(&self) -> bool {
        self.in_flight == Some(FetchTrigger::Gesture)
    }
}

// --- Upload ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDraft {
    pub uri: String,
    pub file_name: String,
}

impl UploadDraft {
    /// Recovers the original file name from the picker URI when the
    /// picker did not report one.
    #[must_use]
    pub fn from_picked(uri: impl Into<String>, file_name: Option<&str>) -> Self {
        let uri = uri.into();
        let file_name = match file_name {
            Some(name) if !name.trim().is_empty() => sanitize_file_name(name),
            _ => file_name_from_uri(&uri),
        };
        Self { uri, file_name }
    }
}

fn file_name_from_uri(uri: &str) -> String {
    let from_url = url::Url::parse(uri).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });

    match from_url {
        Some(segment) if !segment.is_empty() => sanitize_file_name(&segment),
        _ => sanitize_file_name(uri.split(['?', '#']).next().unwrap_or(uri)),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    #[default]
    Empty,
    Previewing,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    NoDraft,
    AlreadySubmitting,
}

/// Upload state machine:
/// `Empty -> Previewing -> Submitting -> Empty | Previewing`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadState {
    stage: UploadStage,
    draft: Option<UploadDraft>,
    last_key_timestamp: u64,
}

impl UploadState {
    #[must_use]
    pub const fn stage(&self) -> UploadStage {
        self.stage
    }

    #[must_use]
    pub fn draft(&self) -> Option<&UploadDraft> {
        self.draft.as_ref()
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.stage == UploadStage::Submitting
    }

    /// Returns false while a submission is running; the draft is kept.
    pub fn set_draft(&mut self, draft: UploadDraft) -> bool {
        if self.is_submitting() {
            return false;
        }
        self.draft = Some(draft);
        self.stage = UploadStage::Previewing;
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.is_submitting() {
            return false;
        }
        self.draft = None;
        self.stage = UploadStage::Empty;
        true
    }

    pub fn begin_submit(&mut self) -> Result<UploadDraft, SubmitRejection> {
        if self.is_submitting() {
            return Err(SubmitRejection::AlreadySubmitting);
        }
        let draft = self.draft.clone().ok_or(SubmitRejection::NoDraft)?;
        self.stage = UploadStage::Submitting;
        Ok(draft)
    }

    pub fn submit_failed(&mut self) {
        self.stage = if self.draft.is_some() {
            UploadStage::Previewing
        } else {
            UploadStage::Empty
        };
    }

    pub fn submit_succeeded(&mut self) {
        self.draft = None;
        self.stage = UploadStage::Empty;
    }

    /// Timestamp for the next object key, strictly greater than any
    /// timestamp handed out before in this session.
    pub fn next_key_timestamp(&mut self, now: UnixTimeMs) -> UnixTimeMs {
        let next = now.as_millis().max(self.last_key_timestamp.saturating_add(1));
        self.last_key_timestamp = next;
        UnixTimeMs(next)
    }
}

// --- Permissions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    #[default]
    Unknown,
    Requesting,
    Granted,
    Denied,
}

// --- Notices ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// Blocking, user-visible alert. The id changes for every new notice so
/// the shell can tell a fresh alert from a re-render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: Uuid,
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn new(kind: NoticeKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, title, message)
    }

    #[must_use]
    pub fn from_error(error: &AppError) -> Self {
        let kind = if error.kind.is_permission() {
            NoticeKind::Warning
        } else {
            NoticeKind::Error
        };
        Self::new(kind, error.kind.title(), error.user_facing_message())
    }
}

// --- Model ---

#[derive(Debug, Default)]
pub struct Model {
    pub config: GalleryConfig,

    // Gallery
    pub gallery_open: bool,
    pub snapshot: CollectionSnapshot,
    pub fetch: FetchGuard,
    pub selection: Option<StoredImage>,
    pub media_permission: PermissionState,
    pub downloads_in_flight: HashSet<ObjectKey>,
    pub deletes_in_flight: HashSet<ObjectKey>,

    // Upload
    pub upload: UploadState,
    pub picker_permission: PermissionState,

    pub active_notice: Option<Notice>,
}

impl Model {
    pub fn show_notice(&mut self, notice: Notice) {
        self.active_notice = Some(notice);
    }

    pub fn show_error(&mut self, error: &AppError) {
        self.active_notice = Some(Notice::from_error(error));
    }

    pub fn dismiss_notice(&mut self) {
        self.active_notice = None;
    }

    /// Looks a URL up in the key registry. A selected entry that vanished
    /// from a later listing still resolves, so an open preview keeps working.
    #[must_use]
    pub fn lookup_image(&self, url: &str) -> Option<StoredImage> {
        self.snapshot.find_by_url(url).cloned().or_else(|| {
            self.selection
                .as_ref()
                .filter(|selected| selected.url.as_str() == url)
                .cloned()
        })
    }

    /// Replaces the collection with the result of an accepted fetch.
    pub fn replace_snapshot(&mut self, snapshot: CollectionSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn reset_gallery(&mut self) {
        self.snapshot = CollectionSnapshot::default();
        self.selection = None;
        self.fetch.invalidate();
    }
}
