use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::picker::PermissionStatus;

/// Device media library: write permission, download of a remote file
/// into app storage, and import of a local file into a named album.
pub struct MediaLibrary<E> {
    context: CapabilityContext<MediaOperation, E>,
}

impl<Ev> Capability<Ev> for MediaLibrary<Ev> {
    type Operation = MediaOperation;
    type MappedSelf<MappedEv> = MediaLibrary<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        MediaLibrary::new(self.context.map_event(f))
    }
}

impl<E> MediaLibrary<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<MediaOperation, E>) -> Self {
        Self { context }
    }

    pub fn request_permission<F>(&self, callback: F)
    where
        F: FnOnce(MediaResult) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(MediaOperation::RequestPermission).await;
            ctx.update_app(callback(result));
        });
    }

    /// Downloads `url` into app storage as `file_name`, then imports the
    /// local copy into `album`. The callback fires once, after the import
    /// or after the first failing step.
    pub fn save_to_album<F>(
        &self,
        url: String,
        file_name: String,
        album: String,
        timeout_ms: u64,
        callback: F,
    ) where
        F: FnOnce(Result<SavedAsset, MediaError>) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = Self::download_and_import(&ctx, url, file_name, album, timeout_ms).await;
            ctx.update_app(callback(result));
        });
    }

    async fn download_and_import(
        ctx: &CapabilityContext<MediaOperation, E>,
        url: String,
        file_name: String,
        album: String,
        timeout_ms: u64,
    ) -> Result<SavedAsset, MediaError> {
        let local_uri = match ctx
            .request_from_shell(MediaOperation::DownloadToLocal {
                url,
                file_name,
                timeout_ms,
            })
            .await?
        {
            MediaOutput::Downloaded { local_uri } => local_uri,
            other => return Err(MediaError::unexpected("download", &other)),
        };

        match ctx
            .request_from_shell(MediaOperation::ImportToAlbum {
                local_uri: local_uri.clone(),
                album: album.clone(),
            })
            .await?
        {
            MediaOutput::Imported { asset_id } => Ok(SavedAsset {
                local_uri,
                asset_id,
                album,
            }),
            other => Err(MediaError::unexpected("import", &other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaOperation {
    RequestPermission,
    DownloadToLocal {
        url: String,
        file_name: String,
        timeout_ms: u64,
    },
    ImportToAlbum {
        local_uri: String,
        album: String,
    },
}

impl Operation for MediaOperation {
    type Output = MediaResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaOutput {
    Permission(PermissionStatus),
    Downloaded { local_uri: String },
    Imported { asset_id: String },
}

impl MediaOutput {
    #[must_use]
    pub fn permission_status(&self) -> Option<PermissionStatus> {
        match self {
            MediaOutput::Permission(status) => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedAsset {
    pub local_uri: String,
    pub asset_id: String,
    pub album: String,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaError {
    #[error("media library permission denied")]
    PermissionDenied,

    #[error("download failed: {reason}")]
    DownloadFailed { reason: String },

    #[error("download timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("not enough space on device")]
    StorageFull,

    #[error("import into album failed: {reason}")]
    ImportFailed { reason: String },

    #[error("unexpected media library response: {reason}")]
    InvalidResponse { reason: String },
}

impl MediaError {
    #[must_use]
    pub fn unexpected(operation: &str, output: &MediaOutput) -> Self {
        MediaError::InvalidResponse {
            reason: format!("{operation} answered with {output:?}"),
        }
    }

    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, MediaError::PermissionDenied)
    }
}

pub type MediaResult = Result<MediaOutput, MediaError>;
