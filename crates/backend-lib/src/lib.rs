// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the Huddle signaling server.

pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod meeting;
pub mod metrics;
pub mod polls;
pub mod registry;
pub mod signal;
pub mod storage;
pub mod validation;
pub mod ws_router;

use std::sync::Arc;

use crate::config::Settings;
use crate::gateway::EventGateway;
use crate::hub::ConnectionHub;
use crate::polls::PollRegistry;
use crate::registry::SessionRegistry;
use crate::storage::{FlatFileStorage, Storage};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState<S> {
    /// Active meetings and memberships
    pub registry: Arc<SessionRegistry>,
    /// Outbound channels of live connections
    pub hub: Arc<ConnectionHub>,
    /// Open and finished polls
    pub polls: Arc<PollRegistry>,
    /// Client event router
    pub gateway: EventGateway,
    /// Settings manager
    pub settings: Arc<Settings>,
    /// Storage backend
    pub storage: S,
}

impl<S> AppState<S>
where
    S: Storage + Clone + 'static,
{
    /// Create a new application state
    pub fn new(storage: S, config: Settings) -> Self {
        let registry = Arc::new(SessionRegistry::with_reservation_ttl(
            config.reservation_ttl(),
        ));
        let hub = Arc::new(ConnectionHub::new());
        let polls = Arc::new(PollRegistry::new());
        let settings = Arc::new(config);
        let gateway = EventGateway::new(
            registry.clone(),
            hub.clone(),
            polls.clone(),
            Arc::new(storage.clone()),
            settings.clone(),
        );

        Self {
            registry,
            hub,
            polls,
            gateway,
            settings,
            storage,
        }
    }
}

impl AppState<FlatFileStorage> {
    /// Create state backed by flat files under `config.data_dir`
    pub fn with_flat_files(config: Settings) -> anyhow::Result<Self> {
        let storage = FlatFileStorage::new(&config.data_dir)?;
        Ok(Self::new(storage, config))
    }
}
