//! Сверка с ERP: клиенты, счета, платежи. Каждая операция идемпотентна
//! и безопасно перезапускается на том же окне дат.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use contracts::domain::a001_tenant::aggregate::TenantId;
use contracts::usecases::u501_sync_from_erp::SyncStrategy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::processors::customer::{upsert_from_directory, CustomerOutcome};
use super::processors::invoice::upsert_invoice;
use super::processors::payment::{sync_payment_records, PaymentBatchResult};
use super::source_api::SourceApi;
use super::source_models::{FetchOptions, InvoiceDraft, PaymentRecord};
use crate::projections::p901_inventory_directory::service::{self as directory_service, CodeNameMap};
use crate::shared::data::storage::SyncStore;

/// Флаг отмены ручной синхронизации; проверяется между днями и клиентами
pub type CancelFlag = Arc<AtomicBool>;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub strategy: SyncStrategy,
    pub vendor: Option<String>,
    pub cancel: Option<CancelFlag>,
    /// Дата, относительно которой считается просрочка (по умолчанию сегодня UTC)
    pub as_of: Option<NaiveDate>,
}

impl SyncOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerSyncResult {
    pub fetched: usize,
    pub synced: usize,
    pub created: usize,
    pub updated: usize,
    pub migrated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceSyncResult {
    pub fetched: usize,
    pub synced: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub customers_created: usize,
    pub items_written: usize,
    pub unmapped_refs_count: usize,
    /// Ошибки отдельных клиентов / счетов; не прерывают окно
    pub errors: Vec<String>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentSyncResult {
    pub fetched: usize,
    pub batch: PaymentBatchResult,
    pub errors: Vec<String>,
    pub cancelled: bool,
}

pub struct SyncService {
    store: Arc<dyn SyncStore>,
    source: Arc<dyn SourceApi>,
}

impl SyncService {
    pub fn new(store: Arc<dyn SyncStore>, source: Arc<dyn SourceApi>) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn SourceApi> {
        &self.source
    }

    /// Одна страница справочника клиентов ERP.
    /// `fetched == 0`: нормальный конец постраничного обхода.
    pub async fn sync_customers(
        &self,
        tenant_id: TenantId,
        tenant_external_id: &str,
        page: u32,
        page_size: u32,
        vendor: Option<&str>,
    ) -> Result<CustomerSyncResult> {
        let records = self
            .source
            .fetch_customers(tenant_external_id, page, page_size, vendor)
            .await?;

        let mut result = CustomerSyncResult {
            fetched: records.len(),
            ..Default::default()
        };

        for record in &records {
            let (outcome, migrated) =
                upsert_from_directory(self.store.as_ref(), tenant_id, record).await?;
            match outcome {
                CustomerOutcome::Created => result.created += 1,
                CustomerOutcome::Updated => result.updated += 1,
                CustomerOutcome::Skipped => {
                    result.skipped += 1;
                    continue;
                }
            }
            if migrated {
                result.migrated += 1;
            }
            result.synced += 1;
        }

        tracing::info!(
            "Customers page {} for {}: fetched={}, created={}, updated={}, migrated={}, skipped={}",
            page,
            tenant_external_id,
            result.fetched,
            result.created,
            result.updated,
            result.migrated,
            result.skipped
        );
        Ok(result)
    }

    /// Счета за окно `[from, to]`. Bulk: один запрос; per-customer: запрос на каждого
    /// известного клиента, ошибки отдельных клиентов записываются и не прерывают окно.
    pub async fn sync_invoices(
        &self,
        tenant_id: TenantId,
        tenant_external_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        options: &SyncOptions,
    ) -> Result<InvoiceSyncResult> {
        let directory = Arc::new(directory_service::load(self.store.as_ref(), tenant_id).await?);
        if directory.is_empty() {
            tracing::debug!("No inventory directory for {}, brand enrichment uses ERP text only", tenant_external_id);
        } else {
            tracing::debug!("Inventory directory for {}: {} references", tenant_external_id, directory.len());
        }
        let code_names = directory.code_names();
        let fetch_options = FetchOptions {
            customer_nit: None,
            vendor: options.vendor.clone(),
            directory: Some(directory),
        };

        let mut result = InvoiceSyncResult::default();

        match options.strategy {
            SyncStrategy::Bulk => {
                let fetched = self
                    .source
                    .fetch_invoices(tenant_external_id, from, to, &fetch_options)
                    .await?;
                result.unmapped_refs_count = fetched.unmapped_refs_count;
                self.reconcile_invoices(tenant_id, &fetched.invoices, &code_names, &mut result)
                    .await;
            }
            SyncStrategy::PerCustomer => {
                for customer in self.store.list_customers(tenant_id).await? {
                    if options.is_cancelled() {
                        result.cancelled = true;
                        break;
                    }
                    let per_customer = fetch_options.for_customer(&customer.nit);
                    match self
                        .source
                        .fetch_invoices(tenant_external_id, from, to, &per_customer)
                        .await
                    {
                        Ok(fetched) => {
                            result.unmapped_refs_count += fetched.unmapped_refs_count;
                            self.reconcile_invoices(tenant_id, &fetched.invoices, &code_names, &mut result)
                                .await;
                        }
                        Err(e) => {
                            tracing::warn!("Invoices fetch failed for customer {}: {}", customer.nit, e);
                            result.errors.push(format!("customer {}: {}", customer.nit, e));
                        }
                    }
                }
            }
        }

        tracing::info!(
            "Invoices {}..{} for {}: fetched={}, created={}, updated={}, skipped={}, items={}, unmapped_refs={}",
            from,
            to,
            tenant_external_id,
            result.fetched,
            result.created,
            result.updated,
            result.skipped,
            result.items_written,
            result.unmapped_refs_count
        );
        Ok(result)
    }

    async fn reconcile_invoices(
        &self,
        tenant_id: TenantId,
        drafts: &[InvoiceDraft],
        code_names: &CodeNameMap,
        result: &mut InvoiceSyncResult,
    ) {
        result.fetched += drafts.len();
        for draft in drafts {
            match upsert_invoice(self.store.as_ref(), tenant_id, draft, code_names).await {
                Ok(Some(outcome)) => {
                    result.synced += 1;
                    if outcome.created {
                        result.created += 1;
                    } else {
                        result.updated += 1;
                    }
                    if outcome.customer_created {
                        result.customers_created += 1;
                    }
                    result.items_written += outcome.items_written;
                }
                Ok(None) => result.skipped += 1,
                Err(e) => {
                    let number = draft.external_id.as_deref().unwrap_or("?");
                    tracing::warn!("Failed to upsert invoice {}: {}", number, e);
                    result.errors.push(format!("invoice {}: {}", number, e));
                }
            }
        }
    }

    /// Платежи и дебиторка за окно. Снимок кредита пишется один раз на клиента
    /// после обработки всех записей окна.
    pub async fn sync_payments(
        &self,
        tenant_id: TenantId,
        tenant_external_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        options: &SyncOptions,
    ) -> Result<PaymentSyncResult> {
        let fetch_options = FetchOptions {
            customer_nit: None,
            vendor: options.vendor.clone(),
            directory: None,
        };

        let mut result = PaymentSyncResult::default();
        let mut records: Vec<PaymentRecord> = Vec::new();

        match options.strategy {
            SyncStrategy::Bulk => {
                records = self
                    .source
                    .fetch_payments(tenant_external_id, from, to, &fetch_options)
                    .await?;
            }
            SyncStrategy::PerCustomer => {
                for customer in self.store.list_customers(tenant_id).await? {
                    if options.is_cancelled() {
                        result.cancelled = true;
                        break;
                    }
                    match self
                        .source
                        .fetch_payments(tenant_external_id, from, to, &fetch_options.for_customer(&customer.nit))
                        .await
                    {
                        Ok(mut fetched) => records.append(&mut fetched),
                        Err(e) => {
                            tracing::warn!("Payments fetch failed for customer {}: {}", customer.nit, e);
                            result.errors.push(format!("customer {}: {}", customer.nit, e));
                        }
                    }
                }
            }
        }

        result.fetched = records.len();
        let as_of = options.as_of.unwrap_or_else(|| Utc::now().date_naive());
        result.batch =
            sync_payment_records(self.store.as_ref(), tenant_id, &records, from, as_of).await?;

        tracing::info!(
            "Payments {}..{} for {}: fetched={}, inserted={}, duplicated={}, credits={}, undated_balances={}",
            from,
            to,
            tenant_external_id,
            result.fetched,
            result.batch.payments_inserted,
            result.batch.payments_duplicated,
            result.batch.credits_updated,
            result.batch.undated_balances
        );
        Ok(result)
    }
}
