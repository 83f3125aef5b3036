use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::report::SyncReport;
use super::request::SyncStage;

/// Текущий прогресс сессии синхронизации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProgress {
    pub session_id: String,
    pub tenant_id: String,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,

    /// Текущий обрабатываемый день и этап
    pub current_date: Option<NaiveDate>,
    pub current_stage: Option<SyncStage>,

    pub days_total: i32,

    /// Накопленный отчёт (обновляется по мере прохода по дням)
    pub report: SyncReport,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Completed,
    CompletedWithErrors,
    Cancelled,
    Failed,
}

impl SyncProgress {
    pub fn new(session_id: String, tenant_id: String, days_total: i32) -> Self {
        Self {
            session_id,
            tenant_id,
            status: SyncStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            updated_at: Utc::now(),
            current_date: None,
            current_stage: None,
            days_total,
            report: SyncReport::default(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != SyncStatus::Running
    }
}
