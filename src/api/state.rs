use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::chain::ReadAggregator;
use crate::coordinator::LifecycleCoordinator;
use crate::queue::BroadcastQueue;
use crate::store::ListingStore;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Listing projection, read directly by the read endpoints
    pub store: Arc<dyn ListingStore>,

    /// All write endpoints go through the coordinator
    pub coordinator: Arc<LifecycleCoordinator>,

    /// Live agreement views
    pub aggregator: Arc<ReadAggregator>,

    /// Broadcast queue, exposed for system status and operator resync
    pub queue: Arc<BroadcastQueue>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ListingStore>,
        coordinator: Arc<LifecycleCoordinator>,
        aggregator: Arc<ReadAggregator>,
        queue: Arc<BroadcastQueue>,
    ) -> Self {
        Self {
            store,
            coordinator,
            aggregator,
            queue,
            start_time: Utc::now(),
        }
    }

    /// Get system uptime in seconds
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
