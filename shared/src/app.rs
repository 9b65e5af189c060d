use tracing::{debug, info, warn};

use crate::capabilities::{
    Capabilities, GatewayError, GatewayOutput, ImageFormat, MediaError, MediaOutput,
    PermissionStatus, PickConfig, PickerError, PickerOutput,
};
use crate::config::GalleryConfig;
use crate::event::Event;
use crate::model::{
    CollectionSnapshot, FetchTrigger, Model, Notice, NoticeKind, ObjectKey, PermissionState,
    StoredImage, SubmitRejection, UnixTimeMs, UploadDraft, UploadStage,
};
use crate::{
    AppError, GalleryView, ImageTile, NoticeView, PreviewView, UploadView, ViewModel,
    FALLBACK_CONTENT_TYPE, LOADING_TEXT, UPLOADING_TEXT,
};

#[derive(Default)]
pub struct App;

impl App {
    /// Starts a listing under a new generation. Any fetch still in flight
    /// becomes stale and its result will be dropped.
    fn fetch_all(model: &mut Model, caps: &Capabilities, trigger: FetchTrigger) {
        let generation = model.fetch.begin(trigger);
        let prefix = model.config.prefix();
        debug!(generation, ?trigger, prefix = %prefix, "fetching collection");

        caps.gateway.fetch_all(
            prefix.to_string(),
            model.config.list_timeout_ms,
            model.config.resolve_timeout_ms,
            move |result| Event::FetchCompleted {
                generation,
                result: Box::new(result),
            },
        );
    }

    fn refresh_from_gesture(model: &mut Model, caps: &Capabilities) {
        if model.fetch.is_in_flight() {
            debug!(generation = model.fetch.generation(), "fetch in flight, gesture coalesced");
            return;
        }
        Self::fetch_all(model, caps, FetchTrigger::Gesture);
    }

    fn handle_fetch_completed(
        generation: u64,
        result: Result<Vec<StoredImage>, GatewayError>,
        model: &mut Model,
    ) -> bool {
        if !model.fetch.finish(generation) {
            debug!(
                generation,
                current = model.fetch.generation(),
                "discarding stale fetch result"
            );
            return false;
        }

        match result {
            Ok(images) => {
                let prefix = model.config.prefix();
                for image in images.iter().filter(|image| !image.key.is_under(&prefix)) {
                    warn!(key = %image.key, prefix = %prefix, "listed key outside prefix");
                }
                debug!(generation, count = images.len(), "collection replaced");
                model.replace_snapshot(CollectionSnapshot::new(generation, images));
            }
            Err(e) => {
                warn!(generation, error = %e, "fetch failed, keeping previous snapshot");
                model.show_error(&e.into());
            }
        }
        true
    }

    fn request_download(url: &str, model: &mut Model, caps: &Capabilities) {
        let Some(image) = model.lookup_image(url) else {
            warn!(url, "download requested for unknown url");
            model.show_error(&AppError::validation("This image is no longer available."));
            return;
        };

        if !model.downloads_in_flight.insert(image.key.clone()) {
            debug!(key = %image.key, "download already in flight");
            return;
        }

        model.media_permission = PermissionState::Requesting;
        caps.media_library.request_permission(move |result| {
            Event::MediaPermissionResolved {
                image,
                result: Box::new(result),
            }
        });
    }

    fn handle_media_permission(
        image: StoredImage,
        result: Result<MediaOutput, MediaError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let status = result.and_then(|output| {
            output
                .permission_status()
                .ok_or_else(|| MediaError::unexpected("request_permission", &output))
        });

        match status {
            Ok(PermissionStatus::Granted) => {
                model.media_permission = PermissionState::Granted;
                let key = image.key.clone();
                info!(key = %key, album = %model.config.album, "saving image to album");

                caps.media_library.save_to_album(
                    image.url.as_str().to_string(),
                    image.file_name().to_string(),
                    model.config.album.clone(),
                    model.config.download_timeout_ms,
                    move |result| Event::DownloadCompleted {
                        key,
                        result: Box::new(result),
                    },
                );
            }
            Ok(status) => {
                warn!(?status, key = %image.key, "media library permission denied");
                model.media_permission = PermissionState::Denied;
                model.downloads_in_flight.remove(&image.key);
                model.show_error(&MediaError::PermissionDenied.into());
            }
            Err(e) => {
                warn!(error = %e, key = %image.key, "media library permission request failed");
                model.media_permission = if e.is_permission_error() {
                    PermissionState::Denied
                } else {
                    PermissionState::Unknown
                };
                model.downloads_in_flight.remove(&image.key);
                model.show_error(&e.into());
            }
        }
    }

    fn request_delete(url: &str, model: &mut Model, caps: &Capabilities) {
        let Some(image) = model.lookup_image(url) else {
            warn!(url, "delete requested for unknown url");
            model.show_error(&AppError::validation("This image is no longer available."));
            return;
        };

        if !model.deletes_in_flight.insert(image.key.clone()) {
            debug!(key = %image.key, "delete already in flight");
            return;
        }

        info!(key = %image.key, "deleting image");
        let key = image.key;
        caps.gateway
            .delete(key.clone(), model.config.delete_timeout_ms, move |result| {
                Event::DeleteCompleted {
                    key,
                    result: Box::new(result),
                }
            });
    }

    /// Mutations refresh the listing only while the gallery screen is mounted;
    /// the next `GalleryOpened` lists from scratch anyway.
    fn refetch_if_open(model: &mut Model, caps: &Capabilities, trigger: FetchTrigger) {
        if model.gallery_open {
            Self::fetch_all(model, caps, trigger);
        } else {
            debug!(?trigger, "gallery closed, skipping refetch");
        }
    }

    fn handle_delete_completed(
        key: &ObjectKey,
        result: Result<GatewayOutput, GatewayError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        model.deletes_in_flight.remove(key);

        match result {
            Ok(GatewayOutput::Deleted) => {
                info!(key = %key, "image deleted");
                if model.selection.as_ref().is_some_and(|s| &s.key == key) {
                    model.selection = None;
                }
                model.show_notice(Notice::success("Deleted", "The image was deleted."));
                Self::refetch_if_open(model, caps, FetchTrigger::AfterDelete);
            }
            Ok(other) => {
                let e = GatewayError::unexpected("delete", &other);
                warn!(key = %key, error = %e, "delete failed");
                model.show_error(&e.into());
            }
            Err(e) => {
                warn!(key = %key, error = %e, "delete failed");
                model.show_error(&e.into());
            }
        }
    }

    fn handle_picker_permission(
        result: Result<PickerOutput, PickerError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let status = result.and_then(|output| {
            output
                .permission_status()
                .ok_or_else(|| PickerError::unexpected("request_permission", &output))
        });

        match status {
            Ok(PermissionStatus::Granted) => {
                model.picker_permission = PermissionState::Granted;
                caps.image_picker
                    .pick_image(PickConfig::default(), |result| {
                        Event::ImagePicked(Box::new(result))
                    });
            }
            Ok(status) => {
                model.picker_permission = PermissionState::Denied;
                Self::report_picker_denial(model, &format!("{status:?}"));
            }
            Err(e) if e.is_permission_error() => {
                model.picker_permission = PermissionState::Denied;
                Self::report_picker_denial(model, &e.to_string());
            }
            Err(e) => {
                warn!(error = %e, "picker permission request failed");
                model.picker_permission = PermissionState::Unknown;
                model.show_error(&e.into());
            }
        }
    }

    fn report_picker_denial(model: &mut Model, detail: &str) {
        if model.config.notify_picker_permission_denied {
            warn!(detail, "picker permission denied");
            model.show_error(&PickerError::PermissionDenied.into());
        } else {
            debug!(detail, "picker permission denied, notice suppressed");
        }
    }

    fn handle_image_picked(result: Result<PickerOutput, PickerError>, model: &mut Model) {
        match result {
            Ok(output) if output.is_cancelled() => {
                debug!("picker cancelled, draft unchanged");
            }
            Ok(output) => {
                let Some(asset) = output.into_first_asset() else {
                    debug!("picker returned no asset, draft unchanged");
                    return;
                };
                let draft = UploadDraft::from_picked(asset.uri, asset.file_name.as_deref());
                debug!(file_name = %draft.file_name, "draft selected");
                if !model.upload.set_draft(draft) {
                    debug!("submission in flight, picked image ignored");
                }
            }
            Err(e) => {
                warn!(error = %e, "image picker failed");
                model.show_error(&e.into());
            }
        }
    }

    fn request_submit(model: &mut Model, caps: &Capabilities) -> bool {
        match model.upload.begin_submit() {
            Err(SubmitRejection::AlreadySubmitting) => {
                debug!("submission already in flight, ignored");
                false
            }
            Err(SubmitRejection::NoDraft) => {
                model.show_notice(Notice::new(
                    NoticeKind::Info,
                    "No image selected",
                    "Please select an image first.",
                ));
                true
            }
            Ok(draft) => {
                info!(file_name = %draft.file_name, "reading draft for upload");
                let uri = draft.uri.clone();
                caps.image_picker
                    .read_asset(uri, model.config.max_upload_bytes, move |result| {
                        Event::AssetRead {
                            draft,
                            result: Box::new(result),
                        }
                    });
                true
            }
        }
    }

    /// Validates the bytes of the draft and hands them to the gateway.
    fn handle_asset_read(
        draft: &UploadDraft,
        result: Result<PickerOutput, PickerError>,
        model: &mut Model,
        caps: &Capabilities,
    ) -> Result<(), AppError> {
        let bytes = match result? {
            PickerOutput::Asset(bytes) => bytes,
            other => return Err(PickerError::unexpected("read_asset", &other).into()),
        };

        let max = model.config.max_upload_bytes;
        if bytes.len() > max {
            return Err(PickerError::AssetTooLarge {
                size: bytes.len(),
                max,
            }
            .into());
        }
        if bytes.is_empty() {
            return Err(PickerError::ReadFailed {
                reason: "file is empty".into(),
            }
            .into());
        }

        let content_type = ImageFormat::sniff(&bytes)
            .map_or(FALLBACK_CONTENT_TYPE, |format| format.mime_type());
        let timestamp = model.upload.next_key_timestamp(UnixTimeMs::now());
        let key = ObjectKey::for_upload(&model.config.prefix(), timestamp, &draft.file_name)?;

        info!(key = %key, bytes = bytes.len(), content_type, "uploading image");
        let callback_key = key.clone();
        caps.gateway.put(
            key,
            bytes,
            content_type.to_string(),
            model.config.upload_timeout_ms,
            move |result| Event::UploadCompleted {
                key: callback_key,
                result: Box::new(result),
            },
        );
        Ok(())
    }

    fn handle_upload_completed(
        key: &ObjectKey,
        result: Result<GatewayOutput, GatewayError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let outcome = match result {
            Ok(GatewayOutput::Stored { .. }) => Ok(()),
            Ok(other) => Err(GatewayError::unexpected("put", &other)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                info!(key = %key, "image uploaded");
                model.upload.submit_succeeded();
                model.show_notice(Notice::success("Uploaded", "The image was uploaded."));
                Self::refetch_if_open(model, caps, FetchTrigger::AfterUpload);
            }
            Err(e) => Self::fail_submit(model, e.into()),
        }
    }

    fn fail_submit(model: &mut Model, error: AppError) {
        warn!(error = %error, "upload failed, draft kept");
        model.upload.submit_failed();
        model.show_error(&error);
    }

    fn configure(config: GalleryConfig, model: &mut Model) {
        match config.validated() {
            Ok(config) => {
                let prefix_changed = config.prefix != model.config.prefix;
                debug!(prefix = %config.prefix, album = %config.album, "configured");
                model.config = config;
                if prefix_changed {
                    model.reset_gallery();
                }
            }
            Err(e) => {
                warn!(error = %e, "rejected configuration, keeping previous");
                model.show_error(&e.into());
            }
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let event_name = event.name();
        if event.is_user_initiated() {
            info!(event = event_name, "user action");
        } else {
            debug!(event = event_name, "handling event");
        }

        match event {
            Event::Configure(config) => {
                Self::configure(*config, model);
                caps.render.render();
            }

            Event::DismissNotice => {
                model.dismiss_notice();
                caps.render.render();
            }

            Event::GalleryOpened => {
                model.gallery_open = true;
                Self::fetch_all(model, caps, FetchTrigger::Mount);
                caps.render.render();
            }

            Event::GalleryClosed => {
                model.gallery_open = false;
                model.reset_gallery();
                caps.render.render();
            }

            Event::RefreshRequested => {
                Self::refresh_from_gesture(model, caps);
                caps.render.render();
            }

            Event::GalleryScrolled { offset_y } => {
                if model.config.is_pull_refresh(offset_y) {
                    Self::refresh_from_gesture(model, caps);
                    caps.render.render();
                }
            }

            Event::FetchCompleted { generation, result } => {
                if Self::handle_fetch_completed(generation, *result, model) {
                    caps.render.render();
                }
            }

            Event::ImageSelected { url } => {
                match model.snapshot.find_by_url(&url) {
                    Some(image) => model.selection = Some(image.clone()),
                    None => debug!(url = %url, "ignoring selection outside the collection"),
                }
                caps.render.render();
            }

            Event::PreviewClosed => {
                model.selection = None;
                caps.render.render();
            }

            Event::DownloadRequested { url } => {
                Self::request_download(&url, model, caps);
                caps.render.render();
            }

            Event::MediaPermissionResolved { image, result } => {
                Self::handle_media_permission(image, *result, model, caps);
                caps.render.render();
            }

            Event::DownloadCompleted { key, result } => {
                model.downloads_in_flight.remove(&key);
                match *result {
                    Ok(saved) => {
                        info!(key = %key, asset_id = %saved.asset_id, "image saved to album");
                        model.show_notice(Notice::success(
                            "Saved",
                            format!("The image was saved to the {} album.", saved.album),
                        ));
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "download failed");
                        model.show_error(&e.into());
                    }
                }
                caps.render.render();
            }

            Event::DeleteRequested { url } => {
                Self::request_delete(&url, model, caps);
                caps.render.render();
            }

            Event::DeleteCompleted { key, result } => {
                Self::handle_delete_completed(&key, *result, model, caps);
                caps.render.render();
            }

            Event::PickImageRequested => {
                if model.upload.is_submitting() {
                    debug!("submission in flight, pick ignored");
                    return;
                }
                model.picker_permission = PermissionState::Requesting;
                caps.image_picker
                    .request_permission(|result| Event::PickerPermissionResolved(Box::new(result)));
                caps.render.render();
            }

            Event::PickerPermissionResolved(result) => {
                Self::handle_picker_permission(*result, model, caps);
                caps.render.render();
            }

            Event::ImagePicked(result) => {
                Self::handle_image_picked(*result, model);
                caps.render.render();
            }

            Event::SubmitRequested => {
                if Self::request_submit(model, caps) {
                    caps.render.render();
                }
            }

            Event::AssetRead { draft, result } => {
                if !model.upload.is_submitting() {
                    debug!("asset read outside a submission, ignored");
                    return;
                }
                if let Err(e) = Self::handle_asset_read(&draft, *result, model, caps) {
                    Self::fail_submit(model, e);
                }
                caps.render.render();
            }

            Event::UploadCompleted { key, result } => {
                Self::handle_upload_completed(&key, *result, model, caps);
                caps.render.render();
            }

            Event::ClearRequested => {
                if model.upload.clear() {
                    caps.render.render();
                } else {
                    debug!("submission in flight, clear ignored");
                }
            }

            Event::UploadClosed => {
                if model.upload.clear() {
                    caps.render.render();
                }
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let is_loading = model.fetch.is_in_flight();

        let preview = model.selection.as_ref().map(|image| PreviewView {
            url: image.url.as_str().to_string(),
            file_name: image.file_name().to_string(),
            is_downloading: model.downloads_in_flight.contains(&image.key),
            is_deleting: model.deletes_in_flight.contains(&image.key),
        });

        let gallery = GalleryView {
            is_loading,
            is_refreshing: model.fetch.is_gesture_in_flight(),
            loading_text: is_loading.then(|| LOADING_TEXT.to_string()),
            tiles: model.snapshot.images().iter().map(ImageTile::from).collect(),
            preview,
            is_empty: model.snapshot.is_empty() && !is_loading,
            media_permission: model.media_permission,
        };

        let stage = model.upload.stage();
        let draft = model.upload.draft();
        let upload = UploadView {
            stage,
            preview_uri: draft.map(|d| d.uri.clone()),
            file_name: draft.map(|d| d.file_name.clone()),
            status_text: (stage == UploadStage::Submitting).then(|| UPLOADING_TEXT.to_string()),
            can_pick: stage != UploadStage::Submitting,
            can_submit: stage == UploadStage::Previewing,
            can_clear: stage == UploadStage::Previewing,
            picker_permission: model.picker_permission,
        };

        ViewModel {
            gallery,
            upload,
            notice: model.active_notice.as_ref().map(NoticeView::from),
        }
    }
}
