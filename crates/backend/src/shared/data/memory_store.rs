//! In-memory реализация `SyncStore` для тестов движка.
//! Повторяет уникальные ограничения SQL-схемы, чтобы тесты ловили дубли.

use anyhow::{bail, Result};
use async_trait::async_trait;
use contracts::domain::a001_tenant::aggregate::{Tenant, TenantId};
use contracts::domain::a002_customer::aggregate::{Customer, CustomerId};
use contracts::domain::a003_invoice::aggregate::{Invoice, InvoiceId, InvoiceItem};
use contracts::domain::a004_payment::aggregate::{Payment, PaymentKey};
use contracts::domain::a005_credit::aggregate::Credit;
use contracts::projections::p901_inventory_directory::DirectoryEntry;
use std::collections::HashMap;
use std::sync::Mutex;

use super::storage::SyncStore;

#[derive(Default)]
struct Inner {
    tenants: Vec<Tenant>,
    customers: Vec<Customer>,
    invoices: Vec<Invoice>,
    items: Vec<InvoiceItem>,
    payments: Vec<Payment>,
    credits: HashMap<CustomerId, Credit>,
    directory: HashMap<TenantId, Vec<DirectoryEntry>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(tenant: Tenant) -> Self {
        Self::with_tenants([tenant])
    }

    pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        let store = Self::new();
        store.inner.lock().unwrap().tenants.extend(tenants);
        store
    }

    pub fn all_items(&self) -> Vec<InvoiceItem> {
        self.inner.lock().unwrap().items.clone()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        Ok(self.inner.lock().unwrap().tenants.clone())
    }

    async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tenants.iter().find(|t| t.id == id).cloned())
    }

    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()> {
        self.inner.lock().unwrap().tenants.push(tenant.clone());
        Ok(())
    }

    async fn find_customer_by_nit(&self, tenant_id: TenantId, nit: &str) -> Result<Option<Customer>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .customers
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.nit == nit)
            .cloned())
    }

    async fn list_customers(&self, tenant_id: TenantId) -> Result<Vec<Customer>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .customers
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .customers
            .iter()
            .any(|c| c.tenant_id == customer.tenant_id && c.nit == customer.nit)
        {
            bail!("UNIQUE constraint failed: a002_customer.tenant_id, a002_customer.nit");
        }
        inner.customers.push(customer.clone());
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .customers
            .iter()
            .any(|c| c.id != customer.id && c.tenant_id == customer.tenant_id && c.nit == customer.nit)
        {
            bail!("UNIQUE constraint failed: a002_customer.tenant_id, a002_customer.nit");
        }
        match inner.customers.iter_mut().find(|c| c.id == customer.id) {
            Some(slot) => *slot = customer.clone(),
            None => bail!("customer {} not found", customer.id),
        }
        Ok(())
    }

    async fn find_invoice(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        invoice_number: &str,
    ) -> Result<Option<Invoice>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .invoices
            .iter()
            .find(|i| {
                i.tenant_id == tenant_id
                    && i.customer_id == customer_id
                    && i.invoice_number == invoice_number
            })
            .cloned())
    }

    async fn list_invoices(&self, tenant_id: TenantId) -> Result<Vec<Invoice>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .invoices
            .iter()
            .filter(|i| i.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.invoices.iter().any(|i| {
            i.tenant_id == invoice.tenant_id
                && i.customer_id == invoice.customer_id
                && i.invoice_number == invoice.invoice_number
        }) {
            bail!("UNIQUE constraint failed: a003_invoice.invoice_number");
        }
        inner.invoices.push(invoice.clone());
        Ok(())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.invoices.iter_mut().find(|i| i.id == invoice.id) {
            Some(slot) => *slot = invoice.clone(),
            None => bail!("invoice {} not found", invoice.id),
        }
        Ok(())
    }

    async fn replace_invoice_items(&self, invoice_id: InvoiceId, items: &[InvoiceItem]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.items.retain(|i| i.invoice_id != invoice_id);
        inner.items.extend(items.iter().cloned());
        Ok(())
    }

    async fn list_invoice_items(&self, invoice_id: InvoiceId) -> Result<Vec<InvoiceItem>> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<InvoiceItem> = inner
            .items
            .iter()
            .filter(|i| i.invoice_id == invoice_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.line_no);
        Ok(items)
    }

    async fn payment_exists(&self, key: &PaymentKey) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.payments.iter().any(|p| &p.key() == key))
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.inner.lock().unwrap().payments.push(payment.clone());
        Ok(())
    }

    async fn list_payments(&self, tenant_id: TenantId) -> Result<Vec<Payment>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn get_credit(&self, customer_id: CustomerId) -> Result<Option<Credit>> {
        Ok(self.inner.lock().unwrap().credits.get(&customer_id).cloned())
    }

    async fn save_credit(&self, credit: &Credit) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .credits
            .insert(credit.customer_id, credit.clone());
        Ok(())
    }

    async fn upsert_directory_entries(
        &self,
        tenant_id: TenantId,
        entries: &[DirectoryEntry],
    ) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner.directory.entry(tenant_id).or_default();
        for entry in entries {
            match stored.iter_mut().find(|e| e.reference == entry.reference) {
                Some(slot) => *slot = entry.clone(),
                None => stored.push(entry.clone()),
            }
        }
        Ok(entries.len())
    }

    async fn list_directory_entries(&self, tenant_id: TenantId) -> Result<Vec<DirectoryEntry>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.directory.get(&tenant_id).cloned().unwrap_or_default())
    }
}
