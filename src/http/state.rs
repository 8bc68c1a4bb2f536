use std::sync::Arc;

use crate::engine::Engine;
use crate::notify::NotifyHub;

use super::auth::TokenKeys;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Live per-user notification channels, also registered as an engine notifier.
    pub hub: Arc<NotifyHub>,
    pub tokens: TokenKeys,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, hub: Arc<NotifyHub>, tokens: TokenKeys) -> Self {
        Self { engine, hub, tokens }
    }
}
