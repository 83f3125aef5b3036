//! Модели данных, которые отдаёт Source API после извлечения и маппинга.
//! NIT здесь ещё "сырой": нормализация выполняется при сверке.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::projections::p901_inventory_directory::service::BrandDirectory;

/// Счёт (или кредит-нота), собранный из строк продаж
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    /// Внешний номер документа. `None`, если ERP его не отдала
    pub external_id: Option<String>,
    pub customer_nit: String,
    pub issued_at: NaiveDate,
    /// Сырые (положительные) значения; знак хранится отдельно
    pub total: f64,
    pub margin: f64,
    pub units: f64,
    pub sale_sign: i32,
    pub vendor: Option<String>,
    pub city: Option<String>,
    pub document_type: Option<String>,
    pub items: Vec<InvoiceItemDraft>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvoiceItemDraft {
    /// Нормализованный референс товара
    pub reference: Option<String>,
    pub product_name: String,
    pub brand: Option<String>,
    pub brand_code: Option<String>,
    pub category: Option<String>,
    pub class_code: Option<String>,
    pub class_name: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
    pub margin: f64,
}

/// Результат выборки продаж за окно
#[derive(Debug, Clone, Default)]
pub struct FetchedInvoices {
    pub invoices: Vec<InvoiceDraft>,
    /// Уникальные референсы, не найденные в справочнике
    pub unmapped_refs_count: usize,
}

/// Строка дебиторки / оплаты. Одна запись может нести и остаток, и оплату.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentRecord {
    pub customer_nit: String,
    pub invoice_number: Option<String>,
    pub paid_at: Option<NaiveDate>,
    pub amount: f64,
    /// Открытый остаток по документу
    pub balance: f64,
    pub due_date: Option<NaiveDate>,
    pub days_overdue: Option<i64>,
    pub credit_limit: Option<f64>,
}

/// Запись справочника клиентов ERP
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomerRecord {
    pub nit: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub vendor: Option<String>,
    pub segment: Option<String>,
    pub credit_limit: Option<f64>,
}

/// Параметры выборки, общие для продаж и платежей
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Ограничить выборку одним клиентом (стратегия per-customer)
    pub customer_nit: Option<String>,
    pub vendor: Option<String>,
    /// Справочник для обогащения строк продаж
    pub directory: Option<Arc<BrandDirectory>>,
}

impl FetchOptions {
    pub fn for_customer(&self, nit: &str) -> Self {
        Self {
            customer_nit: Some(nit.to_string()),
            ..self.clone()
        }
    }
}
