use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::request::SyncStage;

/// Ошибка отдельного дня / этапа. Не прерывает остальные дни.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncIssue {
    /// День-бакет (None для этапов без даты, например справочник клиентов)
    pub date: Option<NaiveDate>,
    pub stage: SyncStage,
    pub message: String,
}

/// Итог синхронизации: счётчики и список ошибок по бакетам (частичный успех допустим)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub customers_synced: i32,
    pub customers_created: i32,
    pub invoices_synced: i32,
    pub invoices_created: i32,
    pub invoices_updated: i32,
    pub invoice_items_written: i32,
    pub payments_synced: i32,
    pub payments_duplicated: i32,
    pub credits_updated: i32,
    pub directory_entries: i32,
    /// Референсы товаров, не найденные в справочнике (сигнал качества данных)
    pub unmapped_refs_count: i32,
    /// Открытые остатки без даты погашения и без числа дней просрочки
    pub undated_balances: i32,
    pub days_processed: i32,
    pub cancelled: bool,
    pub errors: Vec<SyncIssue>,
}

impl SyncReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
