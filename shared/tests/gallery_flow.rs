mod common;

use assert_matches::assert_matches;
use common::{
    gateway_requests, has_render, media_requests, settle, snapshot_keys, FakeBucket, Tester,
};
use shared::capabilities::{
    GatewayError, GatewayOperation, GatewayOutput, MediaError, MediaOperation, MediaOutput,
    PermissionStatus,
};
use shared::model::{NoticeKind, PermissionState};
use shared::{Event, Model, ObjectKey, LOADING_TEXT};

fn open_gallery(app: &Tester, bucket: &FakeBucket, model: &mut Model) {
    let update = app.update(Event::GalleryOpened, model);
    let list = gateway_requests(update.effects).pop().expect("list request");
    bucket.serve_fetch(app, list, model);
}

fn url_of(key: &str) -> String {
    FakeBucket::url_for(key)
}

#[test]
fn mount_lists_and_resolves_in_order() {
    let app = Tester::default();
    let mut model = Model::default();
    let bucket = FakeBucket::with_keys(&["images/c.png", "images/a.png", "images/b.png"]);

    let update = app.update(Event::GalleryOpened, &mut model);
    assert!(has_render(&update.effects));

    let view = app.view(&model);
    assert!(view.gallery.is_loading);
    assert!(!view.gallery.is_refreshing);
    assert_eq!(view.gallery.loading_text.as_deref(), Some(LOADING_TEXT));

    let mut requests = gateway_requests(update.effects);
    assert_eq!(requests.len(), 1);
    assert_matches!(
        &requests[0].operation,
        GatewayOperation::List { prefix, timeout_ms } if prefix == "images" && *timeout_ms == 30_000
    );

    let list = requests.remove(0);
    bucket.serve_fetch(&app, list, &mut model);

    assert_eq!(
        snapshot_keys(&model),
        vec!["images/c.png", "images/a.png", "images/b.png"]
    );
    let view = app.view(&model);
    assert!(!view.gallery.is_loading);
    assert_eq!(view.gallery.tiles.len(), 3);
    assert_eq!(view.gallery.tiles[0].url, url_of("images/c.png"));
    assert_eq!(view.gallery.tiles[2].key, "images/b.png");
}

#[test]
fn every_listed_key_is_resolved_once() {
    let app = Tester::default();
    let mut model = Model::default();
    let keys = ["images/1.png", "images/2.png", "images/3.png", "images/4.png"];

    let update = app.update(Event::GalleryOpened, &mut model);
    let mut list = gateway_requests(update.effects).pop().unwrap();
    let listing = keys
        .iter()
        .map(|k| shared::ObjectKey::new(*k).unwrap())
        .collect();
    let update = app
        .resolve(&mut list, Ok(GatewayOutput::Listing(listing)))
        .unwrap();

    let resolves: Vec<String> = gateway_requests(update.effects)
        .into_iter()
        .map(|request| match request.operation {
            GatewayOperation::ResolveUrl { key, .. } => key.to_string(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(resolves, keys);
}

#[test]
fn empty_bucket_gives_empty_gallery() {
    let app = Tester::default();
    let mut model = Model::default();

    open_gallery(&app, &FakeBucket::default(), &mut model);

    let view = app.view(&model);
    assert!(view.gallery.is_empty);
    assert!(view.gallery.tiles.is_empty());
    assert!(view.notice.is_none());
}

#[test]
fn delete_then_fetch_excludes_key() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut bucket = FakeBucket::with_keys(&["images/a.png", "images/b.png"]);

    open_gallery(&app, &bucket, &mut model);
    assert_eq!(snapshot_keys(&model), vec!["images/a.png", "images/b.png"]);

    let url_a = url_of("images/a.png");
    app.update(Event::ImageSelected { url: url_a.clone() }, &mut model);
    assert_eq!(app.view(&model).gallery.preview.unwrap().file_name, "a.png");

    let update = app.update(Event::DeleteRequested { url: url_a }, &mut model);
    let mut delete = gateway_requests(update.effects).pop().expect("delete request");
    assert_matches!(
        &delete.operation,
        GatewayOperation::Delete { key, .. } if key.as_str() == "images/a.png"
    );
    assert!(app.view(&model).gallery.preview.unwrap().is_deleting);

    bucket.remove("images/a.png");
    let update = app.resolve(&mut delete, Ok(GatewayOutput::Deleted)).unwrap();
    let effects = settle(&app, update, &mut model);

    assert!(model.selection.is_none());
    assert_eq!(model.active_notice.as_ref().unwrap().kind, NoticeKind::Success);

    let list = gateway_requests(effects).pop().expect("refetch after delete");
    bucket.serve_fetch(&app, list, &mut model);
    assert_eq!(snapshot_keys(&model), vec!["images/b.png"]);
    assert_eq!(app.view(&model).gallery.tiles[0].url, url_of("images/b.png"));
}

#[test]
fn failed_delete_leaves_state_unchanged() {
    let app = Tester::default();
    let mut model = Model::default();
    let bucket = FakeBucket::with_keys(&["images/a.png"]);
    open_gallery(&app, &bucket, &mut model);

    let url_a = url_of("images/a.png");
    app.update(Event::ImageSelected { url: url_a.clone() }, &mut model);
    let update = app.update(Event::DeleteRequested { url: url_a }, &mut model);
    let mut delete = gateway_requests(update.effects).pop().unwrap();

    let update = app
        .resolve(&mut delete, Err(GatewayError::Unauthorized))
        .unwrap();
    let effects = settle(&app, update, &mut model);

    assert!(gateway_requests(effects).is_empty());
    assert_eq!(snapshot_keys(&model), vec!["images/a.png"]);
    assert!(model.selection.is_some());
    assert!(model.deletes_in_flight.is_empty());
    let notice = model.active_notice.as_ref().unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
}

#[test]
fn repeated_delete_is_coalesced() {
    let app = Tester::default();
    let mut model = Model::default();
    open_gallery(&app, &FakeBucket::with_keys(&["images/a.png"]), &mut model);

    let url_a = url_of("images/a.png");
    let first = app.update(Event::DeleteRequested { url: url_a.clone() }, &mut model);
    let second = app.update(Event::DeleteRequested { url: url_a }, &mut model);

    assert_eq!(gateway_requests(first.effects).len(), 1);
    assert!(gateway_requests(second.effects).is_empty());
}

#[test]
fn stale_fetch_results_are_discarded() {
    let app = Tester::default();
    let mut model = Model::default();

    let first = app.update(Event::GalleryOpened, &mut model);
    let first_list = gateway_requests(first.effects).pop().unwrap();
    let second = app.update(Event::GalleryOpened, &mut model);
    let second_list = gateway_requests(second.effects).pop().unwrap();

    FakeBucket::with_keys(&["images/new.png"]).serve_fetch(&app, second_list, &mut model);
    assert_eq!(snapshot_keys(&model), vec!["images/new.png"]);

    // The older listing answers last and must not overwrite the newer one.
    FakeBucket::with_keys(&["images/old.png", "images/new.png"]).serve_fetch(
        &app,
        first_list,
        &mut model,
    );
    assert_eq!(snapshot_keys(&model), vec!["images/new.png"]);
    assert!(!model.fetch.is_in_flight());
}

#[test]
fn refresh_during_fetch_does_not_double_fire() {
    let app = Tester::default();
    let mut model = Model::default();
    let bucket = FakeBucket::with_keys(&["images/a.png"]);

    let update = app.update(Event::GalleryOpened, &mut model);
    let list = gateway_requests(update.effects).pop().unwrap();

    let refresh = app.update(Event::RefreshRequested, &mut model);
    let overscroll = app.update(Event::GalleryScrolled { offset_y: -120.0 }, &mut model);
    assert!(gateway_requests(refresh.effects).is_empty());
    assert!(gateway_requests(overscroll.effects).is_empty());

    bucket.serve_fetch(&app, list, &mut model);

    let update = app.update(Event::RefreshRequested, &mut model);
    assert!(app.view(&model).gallery.is_refreshing);
    let list = gateway_requests(update.effects).pop().expect("refresh fetch");
    bucket.serve_fetch(&app, list, &mut model);
    assert!(!app.view(&model).gallery.is_refreshing);
}

#[test]
fn failed_fetch_keeps_previous_snapshot() {
    let app = Tester::default();
    let mut model = Model::default();
    open_gallery(&app, &FakeBucket::with_keys(&["images/a.png"]), &mut model);

    let update = app.update(Event::RefreshRequested, &mut model);
    let mut list = gateway_requests(update.effects).pop().unwrap();
    let update = app
        .resolve(&mut list, Err(GatewayError::Timeout { timeout_ms: 30_000 }))
        .unwrap();
    settle(&app, update, &mut model);

    assert_eq!(snapshot_keys(&model), vec!["images/a.png"]);
    let view = app.view(&model);
    assert!(!view.gallery.is_loading);
    assert_eq!(view.notice.unwrap().title, "Connection problem");
}

/// Refreshes a populated gallery, lists `keys`, and answers each
/// `ResolveUrl` with whatever `answer` returns for its key.
fn refresh_with_resolutions(
    app: &Tester,
    model: &mut Model,
    keys: &[&str],
    answer: impl Fn(&str) -> Result<GatewayOutput, GatewayError>,
) {
    let update = app.update(Event::RefreshRequested, model);
    let mut list = gateway_requests(update.effects).pop().expect("refresh list");
    let listing = keys.iter().map(|k| ObjectKey::new(*k).unwrap()).collect();
    let update = app
        .resolve(&mut list, Ok(GatewayOutput::Listing(listing)))
        .unwrap();

    let mut events = update.events;
    let resolves = gateway_requests(update.effects);
    assert_eq!(resolves.len(), keys.len());
    for mut request in resolves {
        let output = match &request.operation {
            GatewayOperation::ResolveUrl { key, .. } => answer(key.as_str()),
            other => panic!("unexpected {other:?}"),
        };
        events.extend(app.resolve(&mut request, output).unwrap().events);
    }
    for event in events {
        let update = app.update(event, model);
        settle(app, update, model);
    }
}

#[test]
fn failed_url_resolution_keeps_previous_snapshot() {
    let app = Tester::default();
    let mut model = Model::default();
    open_gallery(&app, &FakeBucket::with_keys(&["images/a.png"]), &mut model);

    refresh_with_resolutions(&app, &mut model, &["images/a.png", "images/b.png"], |key| {
        if key == "images/b.png" {
            Err(GatewayError::Network { message: "reset".into() })
        } else {
            Ok(GatewayOutput::Url(url_of(key)))
        }
    });

    assert_eq!(snapshot_keys(&model), vec!["images/a.png"]);
    let view = app.view(&model);
    assert!(!view.gallery.is_loading);
    assert!(!view.gallery.is_refreshing);
    let notice = view.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.title, "Connection problem");
}

#[test]
fn non_http_url_fails_the_whole_fetch() {
    let app = Tester::default();
    let mut model = Model::default();
    open_gallery(&app, &FakeBucket::with_keys(&["images/a.png"]), &mut model);

    refresh_with_resolutions(&app, &mut model, &["images/a.png", "images/b.png"], |key| {
        if key == "images/b.png" {
            Ok(GatewayOutput::Url("javascript:x".into()))
        } else {
            Ok(GatewayOutput::Url(url_of(key)))
        }
    });

    assert_eq!(snapshot_keys(&model), vec!["images/a.png"]);
    assert!(!app.view(&model).gallery.is_loading);
    let notice = model.active_notice.as_ref().unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.title, "Storage error");
    assert!(notice.message.contains("unexpected gateway response"));
}

#[test]
fn closing_gallery_discards_in_flight_fetch() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(Event::GalleryOpened, &mut model);
    let list = gateway_requests(update.effects).pop().unwrap();
    app.update(Event::GalleryClosed, &mut model);

    FakeBucket::with_keys(&["images/a.png"]).serve_fetch(&app, list, &mut model);
    assert!(model.snapshot.is_empty());
    assert!(!app.view(&model).gallery.is_loading);
}

#[test]
fn delete_finishing_after_close_does_not_refetch() {
    let app = Tester::default();
    let mut model = Model::default();
    open_gallery(&app, &FakeBucket::with_keys(&["images/a.png"]), &mut model);

    let update = app.update(Event::DeleteRequested { url: url_of("images/a.png") }, &mut model);
    let mut delete = gateway_requests(update.effects).pop().expect("delete request");
    app.update(Event::GalleryClosed, &mut model);

    let update = app.resolve(&mut delete, Ok(GatewayOutput::Deleted)).unwrap();
    let effects = settle(&app, update, &mut model);

    assert!(gateway_requests(effects).is_empty());
    assert!(model.snapshot.is_empty());
    assert!(!model.fetch.is_in_flight());
    assert!(model.deletes_in_flight.is_empty());
    assert_eq!(model.active_notice.as_ref().unwrap().kind, NoticeKind::Success);
}

#[test]
fn denied_download_writes_nothing_and_reports() {
    let app = Tester::default();
    let mut model = Model::default();
    open_gallery(&app, &FakeBucket::with_keys(&["images/a.png"]), &mut model);

    let update = app.update(
        Event::DownloadRequested { url: url_of("images/a.png") },
        &mut model,
    );
    let mut permission = media_requests(update.effects).pop().expect("permission request");
    assert_eq!(permission.operation, MediaOperation::RequestPermission);

    let update = app
        .resolve(
            &mut permission,
            Ok(MediaOutput::Permission(PermissionStatus::Denied)),
        )
        .unwrap();
    let effects = settle(&app, update, &mut model);

    assert!(media_requests(effects).is_empty());
    assert_eq!(model.media_permission, PermissionState::Denied);
    assert_eq!(app.view(&model).gallery.media_permission, PermissionState::Denied);
    assert!(model.downloads_in_flight.is_empty());
    let notice = model.active_notice.as_ref().unwrap();
    assert_eq!(notice.kind, NoticeKind::Warning);
    assert_eq!(notice.title, "Permission required");
    assert_eq!(snapshot_keys(&model), vec!["images/a.png"]);
}

#[test]
fn granted_download_saves_into_album() {
    let app = Tester::default();
    let mut model = Model::default();
    open_gallery(&app, &FakeBucket::with_keys(&["images/a.png"]), &mut model);
    let url_a = url_of("images/a.png");
    app.update(Event::ImageSelected { url: url_a.clone() }, &mut model);

    let update = app.update(Event::DownloadRequested { url: url_a.clone() }, &mut model);
    let mut permission = media_requests(update.effects).pop().unwrap();
    assert!(app.view(&model).gallery.preview.unwrap().is_downloading);

    let update = app
        .resolve(
            &mut permission,
            Ok(MediaOutput::Permission(PermissionStatus::Granted)),
        )
        .unwrap();
    let mut download = media_requests(settle(&app, update, &mut model))
        .pop()
        .expect("download request");
    assert_eq!(
        download.operation,
        MediaOperation::DownloadToLocal {
            url: url_a,
            file_name: "a.png".into(),
            timeout_ms: 120_000,
        }
    );

    let update = app
        .resolve(
            &mut download,
            Ok(MediaOutput::Downloaded { local_uri: "file:///cache/a.png".into() }),
        )
        .unwrap();
    let mut import = media_requests(update.effects).pop().expect("import request");
    assert_eq!(
        import.operation,
        MediaOperation::ImportToAlbum {
            local_uri: "file:///cache/a.png".into(),
            album: "Download".into(),
        }
    );

    let update = app
        .resolve(&mut import, Ok(MediaOutput::Imported { asset_id: "42".into() }))
        .unwrap();
    settle(&app, update, &mut model);

    let notice = model.active_notice.as_ref().unwrap();
    assert_eq!(notice.kind, NoticeKind::Success);
    assert!(notice.message.contains("Download"));
    assert!(model.selection.is_some());
    assert!(!app.view(&model).gallery.preview.unwrap().is_downloading);
}

#[test]
fn failed_download_reports_and_keeps_state() {
    let app = Tester::default();
    let mut model = Model::default();
    open_gallery(&app, &FakeBucket::with_keys(&["images/a.png"]), &mut model);

    let update = app.update(
        Event::DownloadRequested { url: url_of("images/a.png") },
        &mut model,
    );
    let mut permission = media_requests(update.effects).pop().unwrap();
    let update = app
        .resolve(
            &mut permission,
            Ok(MediaOutput::Permission(PermissionStatus::Granted)),
        )
        .unwrap();
    let mut download = media_requests(settle(&app, update, &mut model)).pop().unwrap();

    let update = app
        .resolve(&mut download, Err(MediaError::StorageFull))
        .unwrap();
    let effects = settle(&app, update, &mut model);

    assert!(media_requests(effects).is_empty());
    assert_eq!(model.active_notice.as_ref().unwrap().title, "File error");
    assert_eq!(snapshot_keys(&model), vec!["images/a.png"]);
    assert!(model.downloads_in_flight.is_empty());
}

#[test]
fn dismissing_a_notice_clears_it() {
    let app = Tester::default();
    let mut model = Model::default();

    app.update(
        Event::DownloadRequested { url: "https://cdn.example.com/nope.png".into() },
        &mut model,
    );
    assert!(app.view(&model).notice.is_some());

    app.update(Event::DismissNotice, &mut model);
    assert!(app.view(&model).notice.is_none());
}
