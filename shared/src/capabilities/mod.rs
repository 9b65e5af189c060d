//! Shell-provided capabilities.
//!
//! Render is Crux's built-in capability, used directly. Gateway,
//! MediaLibrary and ImagePicker are requests the shell answers through the
//! platform SDKs; the core only ever sees typed operations and outputs.

mod gateway;
mod media;
mod picker;

pub use self::gateway::{Gateway, GatewayError, GatewayOperation, GatewayOutput, GatewayResult};
pub use self::media::{MediaError, MediaLibrary, MediaOperation, MediaOutput, MediaResult, SavedAsset};
pub use self::picker::{
    ImageFormat, ImagePicker, PermissionStatus, PickConfig, PickMediaType, PickedAsset,
    PickerError, PickerOperation, PickerOutput, PickerResult, MAX_ASSET_SIZE_BYTES,
};
pub use crux_core::render::Render;

// The Effect derive wires each capability to `App`.
#[allow(unused_imports)]
use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub gateway: Gateway<Event>,
    pub media_library: MediaLibrary<Event>,
    pub image_picker: ImagePicker<Event>,
}
