//! Контракт хранилища, от которого зависит движок синхронизации.
//! Все выборки и уникальности квалифицированы арендатором.

use anyhow::Result;
use async_trait::async_trait;
use contracts::domain::a001_tenant::aggregate::{Tenant, TenantId};
use contracts::domain::a002_customer::aggregate::{Customer, CustomerId};
use contracts::domain::a003_invoice::aggregate::{Invoice, InvoiceId, InvoiceItem};
use contracts::domain::a004_payment::aggregate::{Payment, PaymentKey};
use contracts::domain::a005_credit::aggregate::Credit;
use contracts::projections::p901_inventory_directory::DirectoryEntry;

#[async_trait]
pub trait SyncStore: Send + Sync {
    // --- a001 tenant ---
    async fn list_tenants(&self) -> Result<Vec<Tenant>>;
    async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>>;
    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()>;

    // --- a002 customer ---
    /// Точное совпадение по строке NIT (нормализованной или "сырой" legacy)
    async fn find_customer_by_nit(&self, tenant_id: TenantId, nit: &str)
        -> Result<Option<Customer>>;
    async fn list_customers(&self, tenant_id: TenantId) -> Result<Vec<Customer>>;
    async fn insert_customer(&self, customer: &Customer) -> Result<()>;
    async fn update_customer(&self, customer: &Customer) -> Result<()>;

    // --- a003 invoice ---
    async fn find_invoice(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        invoice_number: &str,
    ) -> Result<Option<Invoice>>;
    async fn list_invoices(&self, tenant_id: TenantId) -> Result<Vec<Invoice>>;
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()>;
    async fn update_invoice(&self, invoice: &Invoice) -> Result<()>;
    /// Удалить все позиции счёта и записать новый набор (полная замена)
    async fn replace_invoice_items(&self, invoice_id: InvoiceId, items: &[InvoiceItem])
        -> Result<()>;
    async fn list_invoice_items(&self, invoice_id: InvoiceId) -> Result<Vec<InvoiceItem>>;

    // --- a004 payment ---
    async fn payment_exists(&self, key: &PaymentKey) -> Result<bool>;
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;
    async fn list_payments(&self, tenant_id: TenantId) -> Result<Vec<Payment>>;

    // --- a005 credit ---
    async fn get_credit(&self, customer_id: CustomerId) -> Result<Option<Credit>>;
    /// Insert or replace (1:1 с клиентом)
    async fn save_credit(&self, credit: &Credit) -> Result<()>;

    // --- p901 inventory directory ---
    /// Upsert по (tenant, reference); возвращает число записанных строк
    async fn upsert_directory_entries(
        &self,
        tenant_id: TenantId,
        entries: &[DirectoryEntry],
    ) -> Result<usize>;
    async fn list_directory_entries(&self, tenant_id: TenantId) -> Result<Vec<DirectoryEntry>>;
}
