//! Scheduler event bus (§6 Server events): a stable, transport-agnostic
//! contract any UI or observer can subscribe to.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::scheduler::SyncResult;

const CHANNEL_CAPACITY: usize = 256;

/// One of the three events a sweep emits, in order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum SchedulerEvent {
    #[serde(rename = "sync-started")]
    SyncStarted { device_count: u32 },
    #[serde(rename = "device-synced")]
    DeviceSynced(SyncResult),
    #[serde(rename = "sync-completed")]
    SyncCompleted { results: Vec<SyncResult> },
}

/// A broadcast bus; every current subscriber receives every event. Slow
/// subscribers that fall behind the channel capacity silently miss the
/// oldest events rather than stalling the scheduler.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.sender.subscribe()
    }

    /// Best-effort publish. Returns without error if there are no
    /// subscribers — events are for observers, not a delivery guarantee.
    pub fn publish(&self, event: SchedulerEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
