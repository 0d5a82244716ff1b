//! State shared by every command handler.

use std::sync::Arc;

use tokio::sync::Mutex;

use kiu_sync::SubscriptionRegistry;

pub struct AppState {
    /// All channel subscriptions.
    pub registry: SubscriptionRegistry,
}

impl AppState {
    pub fn new(registry: SubscriptionRegistry) -> Self {
        Self { registry }
    }
}

/// Async mutex: focus and stop hold the lock across awaits.
pub type SharedState = Arc<Mutex<AppState>>;
