use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Запрос на ручную синхронизацию с ERP ("синхронизировать сейчас")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    /// ID арендатора (UUID)
    pub tenant_id: String,

    /// Начало периода (включительно), формат YYYY-MM-DD
    pub date_from: NaiveDate,

    /// Конец периода (включительно), формат YYYY-MM-DD
    pub date_to: NaiveDate,

    /// Какие этапы выполнять; пусто = все
    #[serde(default)]
    pub stages: Vec<SyncStage>,

    /// Переопределение стратегии из конфигурации
    #[serde(default)]
    pub strategy: Option<SyncStrategy>,
}

impl SyncRequest {
    pub fn wants(&self, stage: SyncStage) -> bool {
        self.stages.is_empty() || self.stages.contains(&stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Customers,
    Invoices,
    Payments,
    Directory,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStage::Customers => "customers",
            SyncStage::Invoices => "invoices",
            SyncStage::Payments => "payments",
            SyncStage::Directory => "directory",
        };
        f.write_str(s)
    }
}

/// Стратегия выборки продаж/платежей из ERP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Один запрос на весь период
    #[default]
    Bulk,
    /// Один запрос на каждого известного клиента (для крупных арендаторов)
    PerCustomer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stages_means_all() {
        let req: SyncRequest = serde_json::from_str(
            r#"{"tenant_id":"t","date_from":"2024-01-01","date_to":"2024-01-02"}"#,
        )
        .unwrap();
        assert!(req.wants(SyncStage::Customers));
        assert!(req.wants(SyncStage::Payments));
        assert_eq!(req.strategy, None);
    }

    #[test]
    fn test_strategy_is_snake_case() {
        let s: SyncStrategy = serde_json::from_str("\"per_customer\"").unwrap();
        assert_eq!(s, SyncStrategy::PerCustomer);
    }
}
