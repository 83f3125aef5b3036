use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::a001_tenant::aggregate::TenantId;
use super::super::a002_customer::aggregate::CustomerId;

/// Кредитное состояние клиента (1:1 с клиентом).
/// Это снимок на момент последней синхронизации, а не журнал.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    #[serde(rename = "customerId")]
    pub customer_id: CustomerId,
    #[serde(rename = "tenantId")]
    pub tenant_id: TenantId,
    pub balance: f64,
    pub overdue: f64,
    /// Средневзвешенный возраст просроченной задолженности, дни
    #[serde(rename = "dsoDays")]
    pub dso_days: i32,
    #[serde(rename = "creditLimit")]
    pub credit_limit: Option<f64>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Снимок задолженности, рассчитанный за один прогон синхронизации платежей.
/// `credit_limit = None` означает "не трогать сохранённый лимит".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreditSnapshot {
    pub balance: f64,
    pub overdue: f64,
    pub dso_days: i32,
    pub credit_limit: Option<f64>,
}

impl Credit {
    pub fn empty(tenant_id: TenantId, customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            tenant_id,
            balance: 0.0,
            overdue: 0.0,
            dso_days: 0,
            credit_limit: None,
            updated_at: Utc::now(),
        }
    }

    /// Заменяет снимок задолженности; лимит меняется только если передан.
    pub fn apply_snapshot(&mut self, snapshot: &CreditSnapshot) {
        self.balance = snapshot.balance;
        self.overdue = snapshot.overdue;
        self.dso_days = snapshot.dso_days;
        if let Some(limit) = snapshot.credit_limit {
            self.credit_limit = Some(limit);
        }
        self.updated_at = Utc::now();
    }

    pub fn set_credit_limit(&mut self, limit: f64) {
        self.credit_limit = Some(limit);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_replaces_but_keeps_limit() {
        let mut credit = Credit::empty(TenantId::new_v4(), CustomerId::new_v4());
        credit.set_credit_limit(5000.0);
        credit.apply_snapshot(&CreditSnapshot {
            balance: 700.0,
            overdue: 500.0,
            dso_days: 10,
            credit_limit: None,
        });
        assert_eq!(credit.overdue, 500.0);
        assert_eq!(credit.credit_limit, Some(5000.0));

        credit.apply_snapshot(&CreditSnapshot::default());
        assert_eq!(credit.overdue, 0.0);
        assert_eq!(credit.balance, 0.0);
        assert_eq!(credit.dso_days, 0);
        assert_eq!(credit.credit_limit, Some(5000.0));
    }
}
