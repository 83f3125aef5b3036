//! `SyncStore` поверх sea-orm / SQLite.

use anyhow::Result;
use async_trait::async_trait;
use contracts::domain::a001_tenant::aggregate::{Tenant, TenantId};
use contracts::domain::a002_customer::aggregate::{Customer, CustomerId};
use contracts::domain::a003_invoice::aggregate::{Invoice, InvoiceId, InvoiceItem};
use contracts::domain::a004_payment::aggregate::{Payment, PaymentKey};
use contracts::domain::a005_credit::aggregate::Credit;
use contracts::projections::p901_inventory_directory::DirectoryEntry;
use sea_orm::{DatabaseConnection, TransactionTrait};

use super::storage::SyncStore;
use crate::domain::{a001_tenant, a002_customer, a003_invoice, a004_payment, a005_credit};
use crate::projections::p901_inventory_directory::repository as directory_repository;

#[derive(Clone)]
pub struct SeaOrmStore {
    conn: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }
}

#[async_trait]
impl SyncStore for SeaOrmStore {
    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        a001_tenant::repository::list_all(&self.conn).await
    }

    async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>> {
        a001_tenant::repository::get_by_id(&self.conn, id).await
    }

    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()> {
        a001_tenant::repository::insert(&self.conn, tenant).await
    }

    async fn find_customer_by_nit(&self, tenant_id: TenantId, nit: &str) -> Result<Option<Customer>> {
        a002_customer::repository::find_by_nit(&self.conn, tenant_id, nit).await
    }

    async fn list_customers(&self, tenant_id: TenantId) -> Result<Vec<Customer>> {
        a002_customer::repository::list_by_tenant(&self.conn, tenant_id).await
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        a002_customer::repository::insert(&self.conn, customer).await
    }

    async fn update_customer(&self, customer: &Customer) -> Result<()> {
        a002_customer::repository::update(&self.conn, customer).await
    }

    async fn find_invoice(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        invoice_number: &str,
    ) -> Result<Option<Invoice>> {
        a003_invoice::repository::find_by_number(&self.conn, tenant_id, customer_id, invoice_number).await
    }

    async fn list_invoices(&self, tenant_id: TenantId) -> Result<Vec<Invoice>> {
        a003_invoice::repository::list_by_tenant(&self.conn, tenant_id).await
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        a003_invoice::repository::insert(&self.conn, invoice).await
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<()> {
        a003_invoice::repository::update(&self.conn, invoice).await
    }

    async fn replace_invoice_items(&self, invoice_id: InvoiceId, items: &[InvoiceItem]) -> Result<()> {
        // Удаление и вставка в одной транзакции: читатель не видит пустой счёт
        let txn = self.conn.begin().await?;
        a003_invoice::item_repository::delete_by_invoice(&txn, invoice_id).await?;
        a003_invoice::item_repository::insert_many(&txn, items).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn list_invoice_items(&self, invoice_id: InvoiceId) -> Result<Vec<InvoiceItem>> {
        a003_invoice::item_repository::list_by_invoice(&self.conn, invoice_id).await
    }

    async fn payment_exists(&self, key: &PaymentKey) -> Result<bool> {
        a004_payment::repository::exists(&self.conn, key).await
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        a004_payment::repository::insert(&self.conn, payment).await
    }

    async fn list_payments(&self, tenant_id: TenantId) -> Result<Vec<Payment>> {
        a004_payment::repository::list_by_tenant(&self.conn, tenant_id).await
    }

    async fn get_credit(&self, customer_id: CustomerId) -> Result<Option<Credit>> {
        a005_credit::repository::get_by_customer(&self.conn, customer_id).await
    }

    async fn save_credit(&self, credit: &Credit) -> Result<()> {
        a005_credit::repository::upsert(&self.conn, credit).await
    }

    async fn upsert_directory_entries(&self, tenant_id: TenantId, entries: &[DirectoryEntry]) -> Result<usize> {
        directory_repository::upsert_many(&self.conn, tenant_id, entries).await
    }

    async fn list_directory_entries(&self, tenant_id: TenantId) -> Result<Vec<DirectoryEntry>> {
        directory_repository::list_by_tenant(&self.conn, tenant_id).await
    }
}
