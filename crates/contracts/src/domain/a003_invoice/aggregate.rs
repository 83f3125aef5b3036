use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::super::a001_tenant::aggregate::TenantId;
use super::super::a002_customer::aggregate::CustomerId;
use crate::domain::common::EntityMetadata;
use crate::uuid_aggregate_id;

/// Знак продажи
pub const SALE_SIGN: i32 = 1;
/// Знак возврата / кредит-ноты
pub const CREDIT_NOTE_SIGN: i32 = -1;

// ============================================================================
// ID Type
// ============================================================================
uuid_aggregate_id!(InvoiceId);

// ============================================================================
// Aggregate Root
// ============================================================================

/// Счёт (продажа или кредит-нота). Уникален по (`tenant_id`, `customer_id`, `invoice_number`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    #[serde(rename = "tenantId")]
    pub tenant_id: TenantId,
    #[serde(rename = "customerId")]
    pub customer_id: CustomerId,
    #[serde(rename = "invoiceNumber")]
    pub invoice_number: String,
    #[serde(rename = "issuedAt")]
    pub issued_at: NaiveDate,
    pub total: f64,
    pub margin: f64,
    pub units: f64,
    /// +1 продажа, -1 кредит-нота
    #[serde(rename = "saleSign")]
    pub sale_sign: i32,
    #[serde(rename = "signedTotal")]
    pub signed_total: f64,
    #[serde(rename = "signedMargin")]
    pub signed_margin: f64,
    #[serde(rename = "signedUnits")]
    pub signed_units: f64,
    pub vendor: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "documentType")]
    pub document_type: Option<String>,
    #[serde(flatten)]
    pub metadata: EntityMetadata,
}

impl Invoice {
    /// Пересчитать signed-поля: всегда `raw * sale_sign`.
    pub fn apply_sign(&mut self) {
        if self.sale_sign != CREDIT_NOTE_SIGN {
            self.sale_sign = SALE_SIGN;
        }
        let sign = f64::from(self.sale_sign);
        self.signed_total = self.total * sign;
        self.signed_margin = self.margin * sign;
        self.signed_units = self.units * sign;
    }
}

/// Строка счёта. Принадлежит ровно одному счёту и пересоздаётся целиком при каждой синхронизации.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    #[serde(rename = "invoiceId")]
    pub invoice_id: InvoiceId,
    #[serde(rename = "lineNo")]
    pub line_no: i32,
    pub reference: Option<String>,
    #[serde(rename = "productName")]
    pub product_name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "classCode")]
    pub class_code: Option<String>,
    #[serde(rename = "className")]
    pub class_name: Option<String>,
    pub quantity: f64,
    #[serde(rename = "unitPrice")]
    pub unit_price: f64,
    pub total: f64,
    pub margin: f64,
}
