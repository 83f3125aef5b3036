use chrono::NaiveDate;
use contracts::usecases::u501_sync_from_erp::{SyncProgress, SyncReport, SyncStage, SyncStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use super::sync_service::CancelFlag;

/// Трекер прогресса ручных синхронизаций (in-memory, владеет флагами отмены)
#[derive(Clone)]
pub struct ProgressTracker {
    sessions: Arc<RwLock<HashMap<String, ProgressEntry>>>,
}

struct ProgressEntry {
    progress: SyncProgress,
    cancel: CancelFlag,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Создать сессию и вернуть её флаг отмены
    pub fn create_session(&self, session_id: String, tenant_id: String, days_total: i32) -> CancelFlag {
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(
            session_id.clone(),
            ProgressEntry {
                progress: SyncProgress::new(session_id, tenant_id, days_total),
                cancel: cancel.clone(),
            },
        );
        cancel
    }

    pub fn get_progress(&self, session_id: &str) -> Option<SyncProgress> {
        self.sessions
            .read()
            .unwrap()
            .get(session_id)
            .map(|e| e.progress.clone())
    }

    pub fn set_stage(&self, session_id: &str, date: Option<NaiveDate>, stage: SyncStage) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(e) = sessions.get_mut(session_id) {
            e.progress.current_date = date;
            e.progress.current_stage = Some(stage);
            e.progress.updated_at = chrono::Utc::now();
        }
    }

    pub fn update_report(&self, session_id: &str, report: &SyncReport) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(e) = sessions.get_mut(session_id) {
            e.progress.report = report.clone();
            e.progress.updated_at = chrono::Utc::now();
        }
    }

    pub fn complete_session(&self, session_id: &str, status: SyncStatus, report: Option<&SyncReport>) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(e) = sessions.get_mut(session_id) {
            if let Some(report) = report {
                e.progress.report = report.clone();
            }
            e.progress.status = status;
            e.progress.current_stage = None;
            e.progress.completed_at = Some(chrono::Utc::now());
            e.progress.updated_at = chrono::Utc::now();
        }
    }

    /// Запросить отмену. `false`, если сессии нет или она уже завершена.
    pub fn request_cancel(&self, session_id: &str) -> bool {
        let sessions = self.sessions.read().unwrap();
        match sessions.get(session_id) {
            Some(e) if !e.progress.is_finished() => {
                e.cancel.store(true, Ordering::SeqCst);
                tracing::info!("Cancellation requested for sync session {}", session_id);
                true
            }
            _ => false,
        }
    }

    pub fn cleanup_old_sessions(&self, max_age_hours: i64) {
        let mut sessions = self.sessions.write().unwrap();
        let now = chrono::Utc::now();
        sessions.retain(|_, e| {
            if let Some(completed_at) = e.progress.completed_at {
                (now - completed_at).num_hours() < max_age_hours
            } else {
                true
            }
        });
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_only_running_sessions() {
        let tracker = ProgressTracker::new();
        let flag = tracker.create_session("s1".into(), "t".into(), 3);
        assert!(tracker.request_cancel("s1"));
        assert!(flag.load(Ordering::SeqCst));

        tracker.complete_session("s1", SyncStatus::Cancelled, None);
        assert!(!tracker.request_cancel("s1"));
        assert!(!tracker.request_cancel("missing"));
    }

    #[test]
    fn test_cleanup_evicts_only_finished_sessions() {
        let tracker = ProgressTracker::new();
        tracker.create_session("running".into(), "t".into(), 1);
        tracker.create_session("done".into(), "t".into(), 1);
        tracker.complete_session("done", SyncStatus::Completed, None);

        tracker.cleanup_old_sessions(0);
        assert!(tracker.get_progress("running").is_some());
        assert!(tracker.get_progress("done").is_none());
    }
}
