use crux_core::capability::{Capability, CapabilityContext, Operation};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{ImageUrl, ObjectKey, StoredImage};

/// Hosted object store (list / resolve URL / put / delete), performed by
/// the shell through the vendor SDK. Every operation carries the deadline
/// the shell must enforce.
pub struct Gateway<E> {
    context: CapabilityContext<GatewayOperation, E>,
}

impl<Ev> Capability<Ev> for Gateway<Ev> {
    type Operation = GatewayOperation;
    type MappedSelf<MappedEv> = Gateway<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Gateway::new(self.context.map_event(f))
    }
}

impl<E> Gateway<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<GatewayOperation, E>) -> Self {
        Self { context }
    }

    /// Lists every object under `prefix` and resolves each key to a
    /// download URL. Resolution runs in parallel; the result keeps the
    /// order of the listing and has exactly one entry per listed key.
    pub fn fetch_all<F>(
        &self,
        prefix: String,
        list_timeout_ms: u64,
        resolve_timeout_ms: u64,
        callback: F,
    ) where
        F: FnOnce(Result<Vec<StoredImage>, GatewayError>) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result =
                Self::list_and_resolve(&ctx, prefix, list_timeout_ms, resolve_timeout_ms).await;
            ctx.update_app(callback(result));
        });
    }

    pub fn put<F>(
        &self,
        key: ObjectKey,
        bytes: Vec<u8>,
        content_type: String,
        timeout_ms: u64,
        callback: F,
    ) where
        F: FnOnce(GatewayResult) -> E + Send + 'static,
    {
        self.request(
            GatewayOperation::Put {
                key,
                bytes,
                content_type,
                timeout_ms,
            },
            callback,
        );
    }

    pub fn delete<F>(&self, key: ObjectKey, timeout_ms: u64, callback: F)
    where
        F: FnOnce(GatewayResult) -> E + Send + 'static,
    {
        self.request(GatewayOperation::Delete { key, timeout_ms }, callback);
    }

    fn request<F>(&self, operation: GatewayOperation, callback: F)
    where
        F: FnOnce(GatewayResult) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(callback(result));
        });
    }

    async fn list_and_resolve(
        ctx: &CapabilityContext<GatewayOperation, E>,
        prefix: String,
        list_timeout_ms: u64,
        resolve_timeout_ms: u64,
    ) -> Result<Vec<StoredImage>, GatewayError> {
        let keys = match ctx
            .request_from_shell(GatewayOperation::List {
                prefix,
                timeout_ms: list_timeout_ms,
            })
            .await?
        {
            GatewayOutput::Listing(keys) => keys,
            other => return Err(GatewayError::unexpected("list", &other)),
        };

        let resolutions = join_all(keys.iter().map(|key| {
            ctx.request_from_shell(GatewayOperation::ResolveUrl {
                key: key.clone(),
                timeout_ms: resolve_timeout_ms,
            })
        }))
        .await;

        keys.into_iter()
            .zip(resolutions)
            .map(|(key, resolved)| -> Result<StoredImage, GatewayError> {
                match resolved? {
                    GatewayOutput::Url(url) => {
                        let url = ImageUrl::new(url).map_err(|e| GatewayError::InvalidResponse {
                            reason: format!("{key}: {e}"),
                        })?;
                        Ok(StoredImage::new(key, url))
                    }
                    other => Err(GatewayError::unexpected("resolve_url", &other)),
                }
            })
            .collect()
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GatewayOperation {
    /// Direct children of `prefix`.
    List { prefix: String, timeout_ms: u64 },
    ResolveUrl { key: ObjectKey, timeout_ms: u64 },
    Put {
        key: ObjectKey,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
        content_type: String,
        timeout_ms: u64,
    },
    Delete { key: ObjectKey, timeout_ms: u64 },
}

impl GatewayOperation {
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        match self {
            Self::List { timeout_ms, .. }
            | Self::ResolveUrl { timeout_ms, .. }
            | Self::Put { timeout_ms, .. }
            | Self::Delete { timeout_ms, .. } => *timeout_ms,
        }
    }
}

// Put payloads are whole images; keep them out of logs.
impl fmt::Debug for GatewayOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List { prefix, timeout_ms } => f
                .debug_struct("List")
                .field("prefix", prefix)
                .field("timeout_ms", timeout_ms)
                .finish(),
            Self::ResolveUrl { key, timeout_ms } => f
                .debug_struct("ResolveUrl")
                .field("key", key)
                .field("timeout_ms", timeout_ms)
                .finish(),
            Self::Put {
                key,
                bytes,
                content_type,
                timeout_ms,
            } => f
                .debug_struct("Put")
                .field("key", key)
                .field("bytes", &bytes.len())
                .field("content_type", content_type)
                .field("timeout_ms", timeout_ms)
                .finish(),
            Self::Delete { key, timeout_ms } => f
                .debug_struct("Delete")
                .field("key", key)
                .field("timeout_ms", timeout_ms)
                .finish(),
        }
    }
}

impl Operation for GatewayOperation {
    type Output = GatewayResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GatewayOutput {
    Listing(Vec<ObjectKey>),
    Url(String),
    Stored { key: ObjectKey },
    Deleted,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum GatewayError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("not authorized to access the bucket")]
    Unauthorized,

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("unexpected gateway response: {reason}")]
    InvalidResponse { reason: String },

    #[error("gateway error: {message}")]
    Other { message: String },
}

impl GatewayError {
    #[must_use]
    pub fn unexpected(operation: &str, output: &GatewayOutput) -> Self {
        let shape = match output {
            GatewayOutput::Listing(keys) => format!("Listing({} keys)", keys.len()),
            other => format!("{other:?}"),
        };
        GatewayError::InvalidResponse {
            reason: format!("{operation} answered with {shape}"),
        }
    }
}

pub type GatewayResult = Result<GatewayOutput, GatewayError>;
