//! Poll scheduler (C4): a single-flight, interval-driven sweep across
//! active devices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::events::{EventBus, SchedulerEvent};
use crate::models::{Device, DeviceUpdate, PunchDraft, SyncLogDraft, SyncLogStatus};
use crate::store::Store;
use crate::zk::{decode_packed_timestamp, DeviceSession};

/// Outcome of one device's pull within a sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub device_id: u64,
    pub device_name: String,
    pub success: bool,
    pub records_added: u32,
    pub total_records: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Scheduler lifecycle (§4.4). `Syncing` is a sub-state of `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    Syncing,
}

fn minutes_to_duration(minutes: u32) -> Duration {
    Duration::from_secs(minutes.max(1) as u64 * 60)
}

/// Drives a periodic sweep over active devices. Must be held in an `Arc`
/// so the spawned timer task can hold its own handle back to the
/// scheduler.
pub struct PollScheduler {
    store: Arc<Store>,
    events: EventBus,
    running: AtomicBool,
    syncing: AtomicBool,
    interval: Mutex<Duration>,
    interval_tx: watch::Sender<()>,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new(store: Arc<Store>, events: EventBus, poll_interval_minutes: u32) -> Self {
        let (interval_tx, _) = watch::channel(());
        let (stop_tx, _) = watch::channel(false);
        Self {
            store,
            events,
            running: AtomicBool::new(false),
            syncing: AtomicBool::new(false),
            interval: Mutex::new(minutes_to_duration(poll_interval_minutes)),
            interval_tx,
            stop_tx,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if !self.running.load(Ordering::SeqCst) {
            SchedulerState::Stopped
        } else if self.syncing.load(Ordering::SeqCst) {
            SchedulerState::Syncing
        } else {
            SchedulerState::Running
        }
    }

    /// Update the sweep period. If running, the current wait is cancelled
    /// and re-armed at the new interval.
    pub fn set_interval(&self, minutes: u32) {
        *self.interval.lock().unwrap() = minutes_to_duration(minutes);
        let _ = self.interval_tx.send(());
    }

    /// No-op if already running. Otherwise kicks an immediate sweep and
    /// arms a periodic timer.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let scheduler = Arc::clone(self);
        let mut interval_rx = self.interval_tx.subscribe();
        let mut stop_rx = self.stop_tx.subscribe();

        let handle = tokio::spawn(async move {
            scheduler.sync_all().await;
            loop {
                if !scheduler.running.load(Ordering::SeqCst) {
                    break;
                }
                let deadline = *scheduler.interval.lock().unwrap();
                tokio::select! {
                    _ = tokio::time::sleep(deadline) => {}
                    _ = interval_rx.changed() => { continue; }
                    _ = stop_rx.changed() => { break; }
                }
                if !scheduler.running.load(Ordering::SeqCst) {
                    break;
                }
                scheduler.sync_all().await;
            }
        });

        *self.task.lock().unwrap() = Some(handle);
    }

    /// Cancels the future timer. Does not abort a sweep already in flight.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.send(true);
    }

    /// Single-flight sweep across active devices, sorted by name. Returns
    /// an empty vector immediately if a sweep is already running.
    pub async fn sync_all(&self) -> Vec<SyncResult> {
        if self.syncing.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }
        let _guard = SyncingGuard(&self.syncing);

        let mut devices = self.store.list_devices(true);
        devices.sort_by(|a, b| a.name.cmp(&b.name));

        self.events.publish(SchedulerEvent::SyncStarted { device_count: devices.len() as u32 });

        let mut results = Vec::with_capacity(devices.len());
        for device in &devices {
            let result = self.sync_device(device).await;
            self.events.publish(SchedulerEvent::DeviceSynced(result.clone()));
            results.push(result);
        }

        self.events.publish(SchedulerEvent::SyncCompleted { results: results.clone() });
        results
    }

    /// Sync a single device outside the single-flight guard.
    pub async fn sync_one(&self, device_id: u64) -> SyncResult {
        match self.store.get_device(device_id) {
            Some(device) => self.sync_device(&device).await,
            None => SyncResult {
                device_id,
                device_name: String::new(),
                success: false,
                records_added: 0,
                total_records: 0,
                error: Some(format!("device {device_id} not found")),
            },
        }
    }

    async fn sync_device(&self, device: &Device) -> SyncResult {
        let outcome = self.pull_device(device).await;

        match outcome {
            Ok((added, total)) => {
                let _ = self.store.update_device(
                    device.id,
                    DeviceUpdate { last_sync: Some(Utc::now()), ..Default::default() },
                );
                let _ = self.store.add_sync_log(SyncLogDraft {
                    device_id: device.id,
                    log_type: "pull".to_string(),
                    count: added,
                    status: SyncLogStatus::Success,
                    message: format!("synced {added} new of {total} records"),
                });
                SyncResult {
                    device_id: device.id,
                    device_name: device.name.clone(),
                    success: true,
                    records_added: added,
                    total_records: total,
                    error: None,
                }
            }
            Err(e) => {
                let _ = self.store.add_sync_log(SyncLogDraft {
                    device_id: device.id,
                    log_type: "pull".to_string(),
                    count: 0,
                    status: SyncLogStatus::Error,
                    message: e.to_string(),
                });
                SyncResult {
                    device_id: device.id,
                    device_name: device.name.clone(),
                    success: false,
                    records_added: 0,
                    total_records: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn pull_device(&self, device: &Device) -> crate::error::Result<(u32, u32)> {
        let mut session = DeviceSession::new(device.addr());
        session.connect().await?;
        let records = session.get_attendance().await;
        session.disconnect().await;
        let records = records?;

        let total = records.len() as u32;
        let drafts: Vec<PunchDraft> = records
            .into_iter()
            .map(|r| PunchDraft {
                device_id: device.id,
                oder_id: r.oder_id,
                oder_id2: r.oder_id2,
                oder_id3: r.oder_id3,
                user_id: r.user_id,
                timestamp: decode_packed_timestamp(r.timestamp),
                status: r.status,
                punch: r.punch,
            })
            .collect();

        let added = self.store.add_punches_bulk(drafts)?;
        Ok((added, total))
    }
}

struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
