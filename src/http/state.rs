//! Shared state handed to every HTTP handler.

use std::sync::Arc;

use crate::config::Settings;
use crate::scheduler::PollScheduler;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub settings: Arc<Settings>,
    pub scheduler: Arc<PollScheduler>,
}
