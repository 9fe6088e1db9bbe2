//! Shared setup for backend-lib integration tests
#![allow(dead_code)]

use std::sync::Arc;

use backend_lib::{config::Settings, hub::EventReceiver, storage::FlatFileStorage, AppState};
use huddle_common::{ClientEvent, ServerEvent};
use tempfile::TempDir;

/// Create an `AppState` backed by a temporary data directory.
///
/// Keep the returned `TempDir` alive for the duration of the test.
pub fn setup_test_env() -> (Arc<AppState<FlatFileStorage>>, TempDir) {
    setup_test_env_with(|_| {})
}

/// Like [`setup_test_env`], with `adjust` applied to the settings first
pub fn setup_test_env_with(
    adjust: impl FnOnce(&mut Settings),
) -> (Arc<AppState<FlatFileStorage>>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = Settings {
        data_dir: temp_dir.path().to_path_buf(),
        recording_debounce_ms: 60_000,
        ..Settings::default()
    };
    adjust(&mut settings);
    let state = Arc::new(AppState::with_flat_files(settings).unwrap());
    (state, temp_dir)
}

/// A simulated browser connection registered on the hub
pub struct TestClient {
    pub id: String,
    rx: EventReceiver,
}

impl TestClient {
    pub fn connect(state: &AppState<FlatFileStorage>, id: &str) -> Self {
        Self {
            id: id.to_string(),
            rx: state.hub.register(id.to_string()),
        }
    }

    pub fn send(&self, state: &AppState<FlatFileStorage>, event: ClientEvent) {
        state.gateway.handle(&self.id, event);
    }

    /// Everything delivered so far
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn disconnect(self, state: &AppState<FlatFileStorage>) {
        state.gateway.disconnect(&self.id);
        state.hub.unregister(&self.id);
    }
}

pub fn host(
    state: &AppState<FlatFileStorage>,
    id: &str,
    meeting_id: &str,
    name: &str,
) -> TestClient {
    let mut client = TestClient::connect(state, id);
    client.send(
        state,
        ClientEvent::JoinAsHost {
            meeting_id: Some(meeting_id.to_string()),
            host_name: name.to_string(),
        },
    );
    let events = client.drain();
    assert!(
        matches!(events.as_slice(), [ServerEvent::JoinedMeeting { .. }]),
        "host join failed: {events:?}"
    );
    client
}

pub fn join(
    state: &AppState<FlatFileStorage>,
    id: &str,
    meeting_id: &str,
    name: &str,
) -> TestClient {
    let mut client = TestClient::connect(state, id);
    client.send(
        state,
        ClientEvent::JoinMeeting {
            meeting_id: meeting_id.to_string(),
            participant_name: name.to_string(),
        },
    );
    let events = client.drain();
    assert!(
        matches!(events.as_slice(), [ServerEvent::JoinedMeeting { .. }]),
        "join failed: {events:?}"
    );
    client
}

pub fn action_error(events: &[ServerEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        ServerEvent::ActionError { message } => Some(message.as_str()),
        _ => None,
    })
}
