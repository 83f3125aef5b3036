//! Источник с заранее заданными данными для тестов движка.

use async_trait::async_trait;
use chrono::NaiveDate;
use contracts::projections::p901_inventory_directory::DirectoryEntry;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::identity::normalize_customer_id;
use super::source_api::{SourceApi, SourceApiError};
use super::source_models::{CustomerRecord, FetchOptions, FetchedInvoices, InvoiceDraft, PaymentRecord};

#[derive(Default)]
pub struct StaticSourceApi {
    pub customers: Vec<CustomerRecord>,
    pub invoices: Vec<InvoiceDraft>,
    pub payments: Vec<PaymentRecord>,
    pub directory: Vec<DirectoryEntry>,
    /// Дни, на которых источник отвечает сетевой ошибкой
    pub failing_days: HashSet<NaiveDate>,
    /// NIT клиентов, на которых per-customer выборка падает
    pub failing_customers: HashSet<String>,
    /// Страницы справочника клиентов, на которых источник падает
    pub failing_customer_pages: HashSet<u32>,
    /// Сколько первых выборок клиентов отвечают сетевой ошибкой
    pub customer_failures: AtomicUsize,
    pub customer_calls: AtomicUsize,
    pub invoice_calls: AtomicUsize,
    /// Вызывается перед каждой выборкой счетов (например, для отмены из теста)
    pub on_invoice_fetch: Mutex<Option<Box<dyn FnMut(NaiveDate) + Send>>>,
}

impl StaticSourceApi {
    fn check(&self, from: NaiveDate, options: &FetchOptions) -> Result<(), SourceApiError> {
        if self.failing_days.contains(&from) {
            return Err(SourceApiError::Network {
                url: "static://source".into(),
                message: format!("timeout on {}", from),
            });
        }
        if let Some(nit) = &options.customer_nit {
            if self.failing_customers.contains(nit) {
                return Err(SourceApiError::Business {
                    url: "static://source".into(),
                    marker: "System.Exception".into(),
                });
            }
        }
        Ok(())
    }
}

fn same_customer(options: &FetchOptions, nit: &str) -> bool {
    options
        .customer_nit
        .as_deref()
        .map(|wanted| normalize_customer_id(wanted) == normalize_customer_id(nit))
        .unwrap_or(true)
}

#[async_trait]
impl SourceApi for StaticSourceApi {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_invoices(
        &self,
        _tenant_external_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        options: &FetchOptions,
    ) -> Result<FetchedInvoices, SourceApiError> {
        self.invoice_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut hook = self.on_invoice_fetch.lock().unwrap();
            if let Some(hook) = hook.as_mut() {
                hook(from);
            }
        }
        self.check(from, options)?;
        Ok(FetchedInvoices {
            invoices: self
                .invoices
                .iter()
                .filter(|i| i.issued_at >= from && i.issued_at <= to)
                .filter(|i| same_customer(options, &i.customer_nit))
                .cloned()
                .collect(),
            unmapped_refs_count: 0,
        })
    }

    async fn fetch_payments(
        &self,
        _tenant_external_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        options: &FetchOptions,
    ) -> Result<Vec<PaymentRecord>, SourceApiError> {
        self.check(from, options)?;
        Ok(self
            .payments
            .iter()
            .filter(|p| p.paid_at.map(|d| d >= from && d <= to).unwrap_or(true))
            .filter(|p| same_customer(options, &p.customer_nit))
            .cloned()
            .collect())
    }

    async fn fetch_customers(
        &self,
        _tenant_external_id: &str,
        page: u32,
        page_size: u32,
        _vendor: Option<&str>,
    ) -> Result<Vec<CustomerRecord>, SourceApiError> {
        self.customer_calls.fetch_add(1, Ordering::SeqCst);
        let failing_call = self
            .customer_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing_call || self.failing_customer_pages.contains(&page) {
            return Err(SourceApiError::Network {
                url: "static://source".into(),
                message: format!("timeout on customers page {}", page),
            });
        }
        let start = (page.saturating_sub(1) * page_size) as usize;
        Ok(self
            .customers
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn fetch_inventory_directory(
        &self,
        _tenant_external_id: &str,
    ) -> Result<Vec<DirectoryEntry>, SourceApiError> {
        Ok(self.directory.clone())
    }
}
