use std::sync::Arc;

use crate::shared::data::storage::SyncStore;
use crate::system::sync_scheduler::SyncScheduler;
use crate::usecases::u501_sync_from_erp::{SyncExecutor, SyncService};

/// Общее состояние HTTP-слоя
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SyncStore>,
    pub service: Arc<SyncService>,
    pub executor: Arc<SyncExecutor>,
    pub scheduler: Arc<SyncScheduler>,
}
