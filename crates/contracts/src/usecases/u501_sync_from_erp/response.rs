use serde::{Deserialize, Serialize};

/// Ответ на запрос запуска синхронизации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStartResponse {
    pub session_id: String,
    pub status: SyncStartStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStartStatus {
    Started,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub session_id: String,
    /// false, если сессия не найдена или уже завершена
    pub cancelled: bool,
}

/// Ответ на внеочередной запуск планировщика
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledRunResponse {
    pub started: bool,
    pub message: String,
}
