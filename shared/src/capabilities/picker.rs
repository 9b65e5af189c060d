use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const MAX_ASSET_SIZE_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_PICK_QUALITY: u8 = 100;

/// Local image picker and asset reader provided by the shell.
pub struct ImagePicker<E> {
    context: CapabilityContext<PickerOperation, E>,
}

impl<Ev> Capability<Ev> for ImagePicker<Ev> {
    type Operation = PickerOperation;
    type MappedSelf<MappedEv> = ImagePicker<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        ImagePicker::new(self.context.map_event(f))
    }
}

impl<E> ImagePicker<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<PickerOperation, E>) -> Self {
        Self { context }
    }

    pub fn request_permission<F>(&self, callback: F)
    where
        F: FnOnce(PickerResult) -> E + Send + 'static,
    {
        self.request(PickerOperation::RequestPermission, callback);
    }

    pub fn pick_image<F>(&self, config: PickConfig, callback: F)
    where
        F: FnOnce(PickerResult) -> E + Send + 'static,
    {
        let config = config.validated();
        self.request(PickerOperation::PickImage { config }, callback);
    }

    /// Reads a picked asset into memory. The shell must refuse assets
    /// larger than `max_bytes` with `PickerError::AssetTooLarge`.
    pub fn read_asset<F>(&self, uri: String, max_bytes: usize, callback: F)
    where
        F: FnOnce(PickerResult) -> E + Send + 'static,
    {
        let max_bytes = max_bytes.min(MAX_ASSET_SIZE_BYTES);
        self.request(PickerOperation::ReadAsset { uri, max_bytes }, callback);
    }

    fn request<F>(&self, operation: PickerOperation, callback: F)
    where
        F: FnOnce(PickerResult) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(callback(result));
        });
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PickerOperation {
    RequestPermission,
    PickImage { config: PickConfig },
    ReadAsset { uri: String, max_bytes: usize },
}

impl fmt::Debug for PickerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestPermission => f.write_str("RequestPermission"),
            Self::PickImage { config } => f.debug_struct("PickImage").field("config", config).finish(),
            // Local URIs can reveal user folder names.
            Self::ReadAsset { max_bytes, .. } => f
                .debug_struct("ReadAsset")
                .field("uri", &"[REDACTED]")
                .field("max_bytes", max_bytes)
                .finish(),
        }
    }
}

impl Operation for PickerOperation {
    type Output = PickerResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PickMediaType {
    #[default]
    Images,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PickConfig {
    pub media_type: PickMediaType,
    pub allows_editing: bool,
    pub quality: u8,
    pub allow_multiple: bool,
}

impl Default for PickConfig {
    fn default() -> Self {
        Self {
            media_type: PickMediaType::Images,
            allows_editing: true,
            quality: DEFAULT_PICK_QUALITY,
            allow_multiple: false,
        }
    }
}

impl PickConfig {
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.quality = self.quality.min(100);
        self.allow_multiple = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
    DeniedPermanently,
    Restricted,
    NotDetermined,
}

impl PermissionStatus {
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }

    #[must_use]
    pub fn should_show_settings_prompt(&self) -> bool {
        matches!(self, PermissionStatus::DeniedPermanently | PermissionStatus::Restricted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Heic,
    WebP,
}

impl ImageFormat {
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Heic => "image/heic",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Sniffs the leading bytes of an asset. Signature formats need only
    /// their own prefix; RIFF and ISO-BMFF containers need the 12-byte header.
    #[must_use]
    pub fn sniff(data: &[u8]) -> Option<Self> {
        const SIGNATURES: [(&[u8], ImageFormat); 4] = [
            (&[0xFF, 0xD8, 0xFF], ImageFormat::Jpeg),
            (&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], ImageFormat::Png),
            (b"GIF87a", ImageFormat::Gif),
            (b"GIF89a", ImageFormat::Gif),
        ];
        if let Some((_, format)) = SIGNATURES.iter().find(|(sig, _)| data.starts_with(sig)) {
            return Some(*format);
        }

        let header = data.get(..12)?;
        match (&header[..4], &header[4..8], &header[8..]) {
            (b"RIFF", _, b"WEBP") => Some(ImageFormat::WebP),
            (_, b"ftyp", b"heic" | b"heix" | b"mif1") => Some(ImageFormat::Heic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PickedAsset {
    pub uri: String,
    pub file_name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PickerOutput {
    Permission(PermissionStatus),
    Picked(Vec<PickedAsset>),
    Cancelled,
    Asset(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl fmt::Debug for PickerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permission(status) => f.debug_tuple("Permission").field(status).finish(),
            Self::Picked(assets) => f.debug_tuple("Picked").field(&assets.len()).finish(),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Asset(bytes) => write!(f, "Asset({} bytes)", bytes.len()),
        }
    }
}

impl PickerOutput {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PickerOutput::Cancelled)
    }

    /// First picked asset; the picker runs in single-selection mode.
    #[must_use]
    pub fn into_first_asset(self) -> Option<PickedAsset> {
        match self {
            PickerOutput::Picked(assets) => assets.into_iter().next(),
            _ => None,
        }
    }

    #[must_use]
    pub fn permission_status(&self) -> Option<PermissionStatus> {
        match self {
            PickerOutput::Permission(status) => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum PickerError {
    #[error("media library permission denied")]
    PermissionDenied,

    #[error("picker unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("asset too large: {size} bytes exceeds maximum of {max} bytes")]
    AssetTooLarge { size: usize, max: usize },

    #[error("failed to read asset: {reason}")]
    ReadFailed { reason: String },

    #[error("operation cancelled - another picker operation in progress")]
    Busy,

    #[error("unexpected picker response: {reason}")]
    InvalidResponse { reason: String },
}

impl PickerError {
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, PickerError::PermissionDenied)
    }

    #[must_use]
    pub fn unexpected(operation: &str, output: &PickerOutput) -> Self {
        PickerError::InvalidResponse {
            reason: format!("{operation} answered with {output:?}"),
        }
    }
}

pub type PickerResult = Result<PickerOutput, PickerError>;
