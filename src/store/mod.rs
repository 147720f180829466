//! Record store (C3): devices, punches, and sync logs persisted as one
//! JSON document, with a secondary index on the punch natural key.
//!
//! The whole document is rewritten on every mutation (write to a temp file,
//! then rename over the target) so a crash never leaves a half-written
//! file on disk. If the file on disk is unparseable at startup it is
//! renamed to `<path>.backup.<epoch_ms>` and the store starts empty
//! (§4.3 Durability).

mod document;

pub use document::Stats;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::punch::timestamp_in_range;
use crate::models::{Device, DeviceUpdate, NaturalKey, NewDevice, Punch, PunchDraft, PunchFilter, SyncLog, SyncLogDraft};

use document::Document;

const MAX_SYNC_LOGS: usize = 1000;

struct State {
    document: Document,
    natural_keys: HashSet<NaturalKey>,
}

pub struct Store {
    path: PathBuf,
    state: RwLock<State>,
}

impl Store {
    /// Open (or create) the store at `path`, recovering from a corrupt
    /// file by backing it up and starting empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = load_or_recover(&path)?;
        let natural_keys = document.punches.iter().map(|p| p.natural_key()).collect();
        Ok(Self { path, state: RwLock::new(State { document, natural_keys }) })
    }

    fn persist_locked(&self, document: &Document) -> Result<()> {
        let json = serde_json::to_vec_pretty(document)?;
        let tmp_path = PathBuf::from(format!("{}.tmp", self.path.display()));
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    // -- devices -----------------------------------------------------

    pub fn add_device(&self, draft: NewDevice) -> Result<Device> {
        let mut state = self.state.write().unwrap();
        let key = (draft.ip.clone(), draft.port);
        if state.document.devices.iter().any(|d| d.endpoint_key() == key) {
            return Err(AppError::validation(format!(
                "device {}:{} already registered",
                draft.ip, draft.port
            )));
        }

        let now = Utc::now();
        let id = state.document.next_device_id;
        state.document.next_device_id += 1;

        let device = Device {
            id,
            name: draft.name,
            ip: draft.ip,
            port: draft.port,
            location: draft.location,
            active: draft.active,
            last_sync: None,
            created_at: now,
            updated_at: now,
        };
        state.document.devices.push(device.clone());
        self.persist_locked(&state.document)?;
        Ok(device)
    }

    pub fn get_device(&self, id: u64) -> Option<Device> {
        let state = self.state.read().unwrap();
        state.document.devices.iter().find(|d| d.id == id).cloned()
    }

    pub fn list_devices(&self, active_only: bool) -> Vec<Device> {
        let state = self.state.read().unwrap();
        state
            .document
            .devices
            .iter()
            .filter(|d| !active_only || d.active)
            .cloned()
            .collect()
    }

    pub fn update_device(&self, id: u64, update: DeviceUpdate) -> Result<Device> {
        let mut state = self.state.write().unwrap();
        let idx = state
            .document
            .devices
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| AppError::not_found(format!("device {id}")))?;

        let check_ip = update.ip.clone().unwrap_or_else(|| state.document.devices[idx].ip.clone());
        let check_port = update.port.unwrap_or(state.document.devices[idx].port);
        let check_key = (check_ip.clone(), check_port);
        if state
            .document
            .devices
            .iter()
            .enumerate()
            .any(|(i, d)| i != idx && d.endpoint_key() == check_key)
        {
            return Err(AppError::validation(format!(
                "device {check_ip}:{check_port} already registered"
            )));
        }

        {
            let device = &mut state.document.devices[idx];
            if let Some(v) = update.name {
                device.name = v;
            }
            if let Some(v) = update.ip {
                device.ip = v;
            }
            if let Some(v) = update.port {
                device.port = v;
            }
            if let Some(v) = update.location {
                device.location = v;
            }
            if let Some(v) = update.active {
                device.active = v;
            }
            if let Some(v) = update.last_sync {
                device.last_sync = Some(v);
            }
            device.updated_at = Utc::now();
        }

        let result = state.document.devices[idx].clone();
        self.persist_locked(&state.document)?;
        Ok(result)
    }

    pub fn delete_device(&self, id: u64) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let before = state.document.devices.len();
        state.document.devices.retain(|d| d.id != id);
        if state.document.devices.len() == before {
            return Err(AppError::not_found(format!("device {id}")));
        }
        self.persist_locked(&state.document)?;
        Ok(())
    }

    // -- punches -------------------------------------------------------

    pub fn add_punch(&self, draft: PunchDraft) -> Result<u32> {
        if !timestamp_in_range(draft.timestamp) {
            return Err(AppError::validation("punch timestamp out of range"));
        }
        if draft.user_id.trim().is_empty() {
            return Err(AppError::validation("punch user_id is empty"));
        }

        let mut state = self.state.write().unwrap();
        let key = draft.natural_key();
        if state.natural_keys.contains(&key) {
            return Ok(0);
        }

        let id = state.document.next_punch_id;
        state.document.next_punch_id += 1;
        let punch = new_punch(id, draft);
        state.natural_keys.insert(key);
        state.document.punches.push(punch);
        self.persist_locked(&state.document)?;
        Ok(1)
    }

    /// Insert every draft that passes validation and isn't a natural-key
    /// duplicate. Held under a single write lock so readers never observe
    /// a partial batch.
    pub fn add_punches_bulk(&self, drafts: Vec<PunchDraft>) -> Result<u32> {
        let mut state = self.state.write().unwrap();
        let mut inserted = 0u32;

        for draft in drafts {
            if !timestamp_in_range(draft.timestamp) || draft.user_id.trim().is_empty() {
                continue;
            }
            let key = draft.natural_key();
            if state.natural_keys.contains(&key) {
                continue;
            }
            let id = state.document.next_punch_id;
            state.document.next_punch_id += 1;
            let punch = new_punch(id, draft);
            state.natural_keys.insert(key);
            state.document.punches.push(punch);
            inserted += 1;
        }

        if inserted > 0 {
            self.persist_locked(&state.document)?;
        }
        Ok(inserted)
    }

    pub fn list_punches(&self, filter: &PunchFilter, limit: usize, offset: usize) -> Vec<Punch> {
        let state = self.state.read().unwrap();
        let mut matched: Vec<Punch> =
            state.document.punches.iter().filter(|p| matches_filter(p, filter)).cloned().collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.into_iter().skip(offset).take(limit).collect()
    }

    pub fn count_punches(&self, filter: &PunchFilter) -> u64 {
        let state = self.state.read().unwrap();
        state.document.punches.iter().filter(|p| matches_filter(p, filter)).count() as u64
    }

    pub fn list_unsynced(&self, limit: usize) -> Vec<Punch> {
        let filter = PunchFilter { synced_to_cloud: Some(false), ..Default::default() };
        self.list_punches(&filter, limit, 0)
    }

    pub fn mark_synced(&self, ids: &[u64]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let id_set: HashSet<u64> = ids.iter().copied().collect();
        let mut changed = false;
        for punch in state.document.punches.iter_mut() {
            if id_set.contains(&punch.id) && !punch.synced_to_cloud {
                punch.synced_to_cloud = true;
                changed = true;
            }
        }
        if changed {
            self.persist_locked(&state.document)?;
        }
        Ok(())
    }

    pub fn clear_punches(&self) -> Result<u64> {
        let mut state = self.state.write().unwrap();
        let count = state.document.punches.len() as u64;
        state.document.punches.clear();
        state.natural_keys.clear();
        self.persist_locked(&state.document)?;
        Ok(count)
    }

    // -- sync logs -------------------------------------------------------

    pub fn add_sync_log(&self, draft: SyncLogDraft) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let id = state.document.next_sync_log_id;
        state.document.next_sync_log_id += 1;
        let log = SyncLog {
            id,
            device_id: draft.device_id,
            log_type: draft.log_type,
            count: draft.count,
            status: draft.status,
            message: draft.message,
            created_at: Utc::now(),
        };
        state.document.sync_logs.push(log);
        if state.document.sync_logs.len() > MAX_SYNC_LOGS {
            let excess = state.document.sync_logs.len() - MAX_SYNC_LOGS;
            state.document.sync_logs.drain(0..excess);
        }
        self.persist_locked(&state.document)?;
        Ok(())
    }

    pub fn list_sync_logs(&self) -> Vec<SyncLog> {
        let state = self.state.read().unwrap();
        state.document.sync_logs.clone()
    }

    // -- aggregate --------------------------------------------------------

    pub fn stats(&self) -> Stats {
        let state = self.state.read().unwrap();
        let today = Utc::now().date_naive();
        Stats {
            total_devices: state.document.devices.len() as u64,
            active_devices: state.document.devices.iter().filter(|d| d.active).count() as u64,
            total_punches: state.document.punches.len() as u64,
            today_punches: state
                .document
                .punches
                .iter()
                .filter(|p| p.timestamp.date_naive() == today)
                .count() as u64,
            unsynced_count: state.document.punches.iter().filter(|p| !p.synced_to_cloud).count() as u64,
        }
    }
}

fn new_punch(id: u64, draft: PunchDraft) -> Punch {
    Punch {
        id,
        device_id: draft.device_id,
        oder_id: draft.oder_id,
        oder_id2: draft.oder_id2,
        oder_id3: draft.oder_id3,
        user_id: draft.user_id,
        timestamp: draft.timestamp,
        status: draft.status,
        punch: draft.punch,
        synced_to_cloud: false,
        created_at: Utc::now(),
    }
}

fn matches_filter(p: &Punch, filter: &PunchFilter) -> bool {
    if let Some(device_id) = filter.device_id {
        if p.device_id != device_id {
            return false;
        }
    }
    if let Some(ref user_id) = filter.user_id {
        if &p.user_id != user_id {
            return false;
        }
    }
    if let Some(ref start) = filter.start_date {
        if p.timestamp.to_rfc3339() < *start {
            return false;
        }
    }
    if let Some(ref end) = filter.end_date {
        if p.timestamp.to_rfc3339() > *end {
            return false;
        }
    }
    if let Some(synced) = filter.synced_to_cloud {
        if p.synced_to_cloud != synced {
            return false;
        }
    }
    true
}

fn load_or_recover(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Ok(Document::default());
    }

    let bytes = std::fs::read(path)?;
    match serde_json::from_slice::<Document>(&bytes) {
        Ok(document) => Ok(document),
        Err(e) => {
            let epoch_ms = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0);
            let backup_path = PathBuf::from(format!("{}.backup.{}", path.display(), epoch_ms));
            std::fs::rename(path, &backup_path)?;
            tracing::warn!(
                error = %e,
                backup = %backup_path.display(),
                "store file was corrupt at startup; backed up and reinitialized"
            );
            Ok(Document::default())
        }
    }
}
