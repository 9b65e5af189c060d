use serde::{Deserialize, Serialize};

use crate::capabilities::{GatewayError, GatewayResult, MediaError, MediaResult, PickerResult, SavedAsset};
use crate::config::GalleryConfig;
use crate::model::{ObjectKey, StoredImage, UploadDraft};

// Shell-facing events come first; capability responses are `serde(skip)`
// so a shell cannot inject them. Large payloads are boxed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    Configure(Box<GalleryConfig>),
    DismissNotice,

    // Gallery
    GalleryOpened,
    GalleryClosed,
    RefreshRequested,
    GalleryScrolled {
        offset_y: f64,
    },
    ImageSelected {
        url: String,
    },
    PreviewClosed,
    DownloadRequested {
        url: String,
    },
    DeleteRequested {
        url: String,
    },

    // Upload
    PickImageRequested,
    SubmitRequested,
    ClearRequested,
    UploadClosed,

    // Capability responses
    #[serde(skip)]
    FetchCompleted {
        generation: u64,
        result: Box<Result<Vec<StoredImage>, GatewayError>>,
    },
    #[serde(skip)]
    MediaPermissionResolved {
        image: StoredImage,
        result: Box<MediaResult>,
    },
    #[serde(skip)]
    DownloadCompleted {
        key: ObjectKey,
        result: Box<Result<SavedAsset, MediaError>>,
    },
    #[serde(skip)]
    DeleteCompleted {
        key: ObjectKey,
        result: Box<GatewayResult>,
    },
    #[serde(skip)]
    PickerPermissionResolved(Box<PickerResult>),
    #[serde(skip)]
    ImagePicked(Box<PickerResult>),
    #[serde(skip)]
    AssetRead {
        draft: UploadDraft,
        result: Box<PickerResult>,
    },
    #[serde(skip)]
    UploadCompleted {
        key: ObjectKey,
        result: Box<GatewayResult>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configure(_) => "configure",
            Self::DismissNotice => "dismiss_notice",
            Self::GalleryOpened => "gallery_opened",
            Self::GalleryClosed => "gallery_closed",
            Self::RefreshRequested => "refresh_requested",
            Self::GalleryScrolled { .. } => "gallery_scrolled",
            Self::ImageSelected { .. } => "image_selected",
            Self::PreviewClosed => "preview_closed",
            Self::DownloadRequested { .. } => "download_requested",
            Self::DeleteRequested { .. } => "delete_requested",
            Self::PickImageRequested => "pick_image_requested",
            Self::SubmitRequested => "submit_requested",
            Self::ClearRequested => "clear_requested",
            Self::UploadClosed => "upload_closed",
            Self::FetchCompleted { .. } => "fetch_completed",
            Self::MediaPermissionResolved { .. } => "media_permission_resolved",
            Self::DownloadCompleted { .. } => "download_completed",
            Self::DeleteCompleted { .. } => "delete_completed",
            Self::PickerPermissionResolved(_) => "picker_permission_resolved",
            Self::ImagePicked(_) => "image_picked",
            Self::AssetRead { .. } => "asset_read",
            Self::UploadCompleted { .. } => "upload_completed",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::DismissNotice
                | Self::RefreshRequested
                | Self::ImageSelected { .. }
                | Self::PreviewClosed
                | Self::DownloadRequested { .. }
                | Self::DeleteRequested { .. }
                | Self::PickImageRequested
                | Self::SubmitRequested
                | Self::ClearRequested
        )
    }
}
