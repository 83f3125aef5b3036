use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::a001_tenant::aggregate::TenantId;
use super::super::a002_customer::aggregate::CustomerId;
use super::super::a003_invoice::aggregate::InvoiceId;
use crate::domain::common::EntityMetadata;
use crate::uuid_aggregate_id;

// ============================================================================
// ID Type
// ============================================================================
uuid_aggregate_id!(PaymentId);

// ============================================================================
// Aggregate Root
// ============================================================================

/// Поступление оплаты от клиента.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    #[serde(rename = "tenantId")]
    pub tenant_id: TenantId,
    #[serde(rename = "customerId")]
    pub customer_id: CustomerId,
    /// Счёт может быть не найден, тогда платёж хранится без привязки
    #[serde(rename = "invoiceId")]
    pub invoice_id: Option<InvoiceId>,
    #[serde(rename = "paidAt")]
    pub paid_at: NaiveDate,
    pub amount: f64,
    #[serde(flatten)]
    pub metadata: EntityMetadata,
}

/// Ключ дедупликации платежа. Внешним ID платежей не доверяем.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentKey {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub invoice_id: Option<InvoiceId>,
    pub paid_at: NaiveDate,
    pub amount: f64,
}

impl Payment {
    pub fn new(
        tenant_id: TenantId,
        customer_id: CustomerId,
        invoice_id: Option<InvoiceId>,
        paid_at: NaiveDate,
        amount: f64,
    ) -> Self {
        Self {
            id: PaymentId::new_v4(),
            tenant_id,
            customer_id,
            invoice_id,
            paid_at,
            amount: round_money(amount),
            metadata: EntityMetadata::new(),
        }
    }

    pub fn key(&self) -> PaymentKey {
        PaymentKey {
            tenant_id: self.tenant_id,
            customer_id: self.customer_id,
            invoice_id: self.invoice_id,
            paid_at: self.paid_at,
            amount: self.amount,
        }
    }
}

/// Округление до центов, чтобы ключ дедупликации был стабилен между загрузками.
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_is_rounded_for_stable_key() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let a = Payment::new(TenantId::new_v4(), CustomerId::new_v4(), None, date, 200.004);
        assert_eq!(a.amount, 200.0);
        let b = Payment { id: PaymentId::new_v4(), ..a.clone() };
        assert_eq!(a.key(), b.key());
    }
}
