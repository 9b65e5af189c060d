#![allow(dead_code)]

use crux_core::testing::{AppTester, Update};
use crux_core::Request;
use shared::capabilities::{GatewayOperation, GatewayOutput, MediaOperation, PickerOperation};
use shared::model::ObjectKey;
use shared::{App, Effect, Event, Model};

pub type Tester = AppTester<App, Effect>;

/// Feeds every event an update produced back into the app, recursively,
/// and returns all effects emitted along the way.
pub fn settle(app: &Tester, update: Update<Effect, Event>, model: &mut Model) -> Vec<Effect> {
    let mut effects = update.effects;
    for event in update.events {
        let next = app.update(event, model);
        effects.extend(settle(app, next, model));
    }
    effects
}

pub fn gateway_requests(effects: Vec<Effect>) -> Vec<Request<GatewayOperation>> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Gateway(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn media_requests(effects: Vec<Effect>) -> Vec<Request<MediaOperation>> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::MediaLibrary(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn picker_requests(effects: Vec<Effect>) -> Vec<Request<PickerOperation>> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::ImagePicker(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn has_render(effects: &[Effect]) -> bool {
    effects.iter().any(|effect| matches!(effect, Effect::Render(_)))
}

/// In-memory stand-in for the hosted bucket.
#[derive(Default)]
pub struct FakeBucket {
    pub keys: Vec<String>,
}

impl FakeBucket {
    pub fn with_keys(keys: &[&str]) -> Self {
        Self {
            keys: keys.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn url_for(key: &str) -> String {
        format!("https://storage.example.com/o/{}?alt=media", key.replace('/', "%2F"))
    }

    pub fn remove(&mut self, key: &str) {
        self.keys.retain(|k| k != key);
    }

    /// Answers a `List` request and every `ResolveUrl` that follows it.
    /// Returns the effects left over once the fetch has been delivered.
    pub fn serve_fetch(
        &self,
        app: &Tester,
        mut list: Request<GatewayOperation>,
        model: &mut Model,
    ) -> Vec<Effect> {
        assert!(
            matches!(list.operation, GatewayOperation::List { .. }),
            "expected a List request, got {:?}",
            list.operation
        );

        let listing = self
            .keys
            .iter()
            .map(|k| ObjectKey::new(k.as_str()).unwrap())
            .collect();
        let update = app
            .resolve(&mut list, Ok(GatewayOutput::Listing(listing)))
            .expect("list resolves");

        let mut leftovers = Vec::new();
        let mut events = update.events;
        for effect in update.effects {
            match effect {
                Effect::Gateway(mut request) => {
                    let url = match &request.operation {
                        GatewayOperation::ResolveUrl { key, .. } => Self::url_for(key.as_str()),
                        other => panic!("unexpected gateway request during fetch: {other:?}"),
                    };
                    let update = app
                        .resolve(&mut request, Ok(GatewayOutput::Url(url)))
                        .expect("resolve_url resolves");
                    leftovers.extend(update.effects);
                    events.extend(update.events);
                }
                other => leftovers.push(other),
            }
        }

        for event in events {
            let update = app.update(event, model);
            leftovers.extend(settle(app, update, model));
        }
        leftovers
    }
}

pub fn snapshot_keys(model: &Model) -> Vec<String> {
    model
        .snapshot
        .images()
        .iter()
        .map(|image| image.key.to_string())
        .collect()
}
