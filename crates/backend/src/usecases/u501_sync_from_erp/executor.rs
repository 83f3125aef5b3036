use anyhow::Result;
use chrono::NaiveDate;
use contracts::domain::a001_tenant::aggregate::{Tenant, TenantId};
use contracts::domain::common::AggregateId;
use contracts::projections::p901_inventory_directory::DirectoryImportResponse;
use contracts::usecases::u501_sync_from_erp::{
    response::SyncStartStatus, CancelResponse, SyncIssue, SyncProgress, SyncReport, SyncRequest,
    SyncStage, SyncStartResponse, SyncStatus,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::progress_tracker::ProgressTracker;
use super::sync_service::{
    CancelFlag, CustomerSyncResult, InvoiceSyncResult, PaymentSyncResult, SyncOptions, SyncService,
};
use crate::projections::p901_inventory_directory::service as directory_service;
use crate::shared::config::SyncConfig;

/// Результат одного этапа (день-бакет или справочник)
enum StageOutcome {
    Customers(CustomerSyncResult),
    Directory(DirectoryImportResponse),
    Invoices(InvoiceSyncResult),
    Payments(PaymentSyncResult),
}

struct BucketResult {
    date: Option<NaiveDate>,
    stage: SyncStage,
    outcome: Result<StageOutcome, String>,
}

/// Итог прогона: отчёт и число бакетов (всего / упавших)
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub report: SyncReport,
    pub buckets: usize,
    pub failed_buckets: usize,
}

impl RunSummary {
    pub fn status(&self) -> SyncStatus {
        if self.report.cancelled {
            SyncStatus::Cancelled
        } else if self.buckets > 0 && self.failed_buckets == self.buckets {
            SyncStatus::Failed
        } else if self.report.has_errors() {
            SyncStatus::CompletedWithErrors
        } else {
            SyncStatus::Completed
        }
    }
}

/// Executor для UseCase синхронизации с ERP: обход диапазона дат по дням,
/// ошибки отдельного дня записываются в отчёт и не прерывают остальные дни.
#[derive(Clone)]
pub struct SyncExecutor {
    service: Arc<SyncService>,
    pub progress_tracker: Arc<ProgressTracker>,
    config: SyncConfig,
}

impl SyncExecutor {
    pub fn new(service: Arc<SyncService>, progress_tracker: Arc<ProgressTracker>, config: SyncConfig) -> Self {
        Self {
            service,
            progress_tracker,
            config,
        }
    }

    /// Запустить синхронизацию (создаёт async task и возвращает session_id)
    pub async fn start_sync(&self, request: SyncRequest) -> Result<SyncStartResponse> {
        self.progress_tracker
            .cleanup_old_sessions(self.config.progress_ttl_hours);

        let tenant_id = TenantId::from_string(&request.tenant_id)
            .map_err(|e| anyhow::anyhow!("Invalid tenant_id: {}", e))?;
        let tenant = self
            .service
            .store()
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Tenant {} not found", tenant_id))?;
        if request.date_from > request.date_to {
            anyhow::bail!(
                "date_from {} is after date_to {}",
                request.date_from,
                request.date_to
            );
        }

        let days_total = (request.date_to - request.date_from).num_days() as i32 + 1;
        let session_id = Uuid::new_v4().to_string();
        let cancel =
            self.progress_tracker
                .create_session(session_id.clone(), request.tenant_id.clone(), days_total);

        let executor = self.clone();
        let sid = session_id.clone();
        tokio::spawn(async move {
            let summary = executor.execute(&tenant, &request, &cancel, Some(&sid)).await;
            let status = summary.status();
            executor
                .progress_tracker
                .complete_session(&sid, status, Some(&summary.report));
            tracing::info!(
                "ERP sync session {} finished with {:?}: days={}, errors={}",
                sid,
                status,
                summary.report.days_processed,
                summary.report.errors.len()
            );
        });

        Ok(SyncStartResponse {
            session_id,
            status: SyncStartStatus::Started,
            message: format!("Sync started for {} day(s)", days_total),
        })
    }

    pub fn get_progress(&self, session_id: &str) -> Option<SyncProgress> {
        self.progress_tracker.get_progress(session_id)
    }

    pub fn cancel(&self, session_id: &str) -> CancelResponse {
        CancelResponse {
            session_id: session_id.to_string(),
            cancelled: self.progress_tracker.request_cancel(session_id),
        }
    }

    /// Выполнить синхронизацию арендатора: справочники, затем дни по возрастанию.
    pub async fn execute(
        &self,
        tenant: &Tenant,
        request: &SyncRequest,
        cancel: &CancelFlag,
        session_id: Option<&str>,
    ) -> RunSummary {
        tracing::info!(
            "Starting ERP sync for tenant {} ({}) {}..{}",
            tenant.name,
            tenant.external_id,
            request.date_from,
            request.date_to
        );

        let mut buckets: Vec<BucketResult> = Vec::new();
        let mut summary = RunSummary::default();

        // Клиенты идут до счетов и платежей, чтобы сверка нашла их по NIT
        if request.wants(SyncStage::Customers) {
            self.mark(session_id, None, SyncStage::Customers);
            let (total, failure) = self.sync_customer_pages(tenant, cancel).await;
            // Уже записанные страницы засчитываются и при падении следующей
            if total.fetched > 0 || failure.is_none() {
                buckets.push(BucketResult {
                    date: None,
                    stage: SyncStage::Customers,
                    outcome: Ok(StageOutcome::Customers(total)),
                });
            }
            if let Some(message) = failure {
                buckets.push(BucketResult {
                    date: None,
                    stage: SyncStage::Customers,
                    outcome: Err(message),
                });
            }
        }

        if request.wants(SyncStage::Directory) {
            self.mark(session_id, None, SyncStage::Directory);
            let outcome = directory_service::sync_from_source(
                self.service.store().as_ref(),
                self.service.source().as_ref(),
                tenant.id,
                &tenant.external_id,
            )
            .await
            .map(StageOutcome::Directory)
            .map_err(|e| e.to_string());
            buckets.push(BucketResult {
                date: None,
                stage: SyncStage::Directory,
                outcome,
            });
        }

        summary = fold_buckets(summary, buckets.drain(..));
        self.publish(session_id, &summary.report);

        let options = SyncOptions {
            strategy: request.strategy.unwrap_or(self.config.strategy),
            vendor: None,
            cancel: Some(cancel.clone()),
            as_of: None,
        };

        for day in request.date_from.iter_days().take_while(|d| *d <= request.date_to) {
            if cancel.load(Ordering::SeqCst) {
                tracing::info!("ERP sync for {} cancelled before {}", tenant.external_id, day);
                summary.report.cancelled = true;
                break;
            }

            if request.wants(SyncStage::Invoices) {
                self.mark(session_id, Some(day), SyncStage::Invoices);
                let outcome = self
                    .service
                    .sync_invoices(tenant.id, &tenant.external_id, day, day, &options)
                    .await
                    .map(StageOutcome::Invoices)
                    .map_err(|e| e.to_string());
                buckets.push(BucketResult {
                    date: Some(day),
                    stage: SyncStage::Invoices,
                    outcome,
                });
            }

            if request.wants(SyncStage::Payments) {
                self.mark(session_id, Some(day), SyncStage::Payments);
                let outcome = self
                    .service
                    .sync_payments(tenant.id, &tenant.external_id, day, day, &options)
                    .await
                    .map(StageOutcome::Payments)
                    .map_err(|e| e.to_string());
                buckets.push(BucketResult {
                    date: Some(day),
                    stage: SyncStage::Payments,
                    outcome,
                });
            }

            summary = fold_buckets(summary, buckets.drain(..));
            summary.report.days_processed += 1;
            self.publish(session_id, &summary.report);
        }

        tracing::info!(
            "ERP sync for {} done: customers={}, invoices={} (+{}), payments={}, credits={}, errors={}",
            tenant.external_id,
            summary.report.customers_synced,
            summary.report.invoices_synced,
            summary.report.invoices_created,
            summary.report.payments_synced,
            summary.report.credits_updated,
            summary.report.errors.len()
        );
        summary
    }

    /// Постраничный обход справочника клиентов: до пустой или неполной страницы
    /// либо до `max_customer_pages`. Ошибка страницы останавливает обход,
    /// суммы по предыдущим страницам возвращаются вместе с ней.
    async fn sync_customer_pages(
        &self,
        tenant: &Tenant,
        cancel: &AtomicBool,
    ) -> (CustomerSyncResult, Option<String>) {
        let page_size = self.config.customer_page_size.max(1);
        let mut total = CustomerSyncResult::default();

        for page in 1..=self.config.max_customer_pages {
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            let result = match self
                .service
                .sync_customers(tenant.id, &tenant.external_id, page, page_size, None)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!("Customer page {} for {} failed: {}", page, tenant.external_id, e);
                    return (total, Some(format!("page {}: {}", page, e)));
                }
            };
            let fetched = result.fetched;

            total.fetched += result.fetched;
            total.synced += result.synced;
            total.created += result.created;
            total.updated += result.updated;
            total.migrated += result.migrated;
            total.skipped += result.skipped;

            if fetched < page_size as usize {
                break;
            }
        }
        (total, None)
    }

    fn mark(&self, session_id: Option<&str>, date: Option<NaiveDate>, stage: SyncStage) {
        if let Some(sid) = session_id {
            self.progress_tracker.set_stage(sid, date, stage);
        }
    }

    fn publish(&self, session_id: Option<&str>, report: &SyncReport) {
        if let Some(sid) = session_id {
            self.progress_tracker.update_report(sid, report);
        }
    }
}

fn fold_buckets(summary: RunSummary, buckets: impl Iterator<Item = BucketResult>) -> RunSummary {
    buckets.fold(summary, absorb)
}

/// Свести результат бакета в отчёт
fn absorb(mut summary: RunSummary, bucket: BucketResult) -> RunSummary {
    let report = &mut summary.report;
    summary.buckets += 1;

    let issue = |message: String| SyncIssue {
        date: bucket.date,
        stage: bucket.stage,
        message,
    };

    match bucket.outcome {
        Ok(StageOutcome::Customers(r)) => {
            report.customers_synced += r.synced as i32;
            report.customers_created += r.created as i32;
        }
        Ok(StageOutcome::Directory(r)) => {
            report.directory_entries += r.upserted as i32;
        }
        Ok(StageOutcome::Invoices(r)) => {
            report.invoices_synced += r.synced as i32;
            report.invoices_created += r.created as i32;
            report.invoices_updated += r.updated as i32;
            report.invoice_items_written += r.items_written as i32;
            report.unmapped_refs_count += r.unmapped_refs_count as i32;
            report.customers_created += r.customers_created as i32;
            report.cancelled |= r.cancelled;
            report.errors.extend(r.errors.into_iter().map(issue));
        }
        Ok(StageOutcome::Payments(r)) => {
            report.payments_synced += r.batch.payments_inserted as i32;
            report.payments_duplicated += r.batch.payments_duplicated as i32;
            report.credits_updated += r.batch.credits_updated as i32;
            report.undated_balances += r.batch.undated_balances as i32;
            report.customers_created += r.batch.customers_created as i32;
            report.cancelled |= r.cancelled;
            report.errors.extend(r.errors.into_iter().map(issue));
        }
        Err(message) => {
            tracing::warn!(
                "ERP sync {} failed for {}: {}",
                bucket.stage,
                bucket
                    .date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                message
            );
            summary.failed_buckets += 1;
            report.errors.push(issue(message));
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::data::memory_store::MemoryStore;
    use crate::usecases::u501_sync_from_erp::source_models::{CustomerRecord, InvoiceDraft, PaymentRecord};
    use crate::usecases::u501_sync_from_erp::test_support::StaticSourceApi;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn invoice(number: &str, nit: &str, d: u32) -> InvoiceDraft {
        InvoiceDraft {
            external_id: Some(number.into()),
            customer_nit: nit.into(),
            issued_at: day(d),
            total: 100.0,
            margin: 10.0,
            units: 1.0,
            sale_sign: 1,
            vendor: None,
            city: None,
            document_type: None,
            items: vec![],
        }
    }

    fn request(tenant: &Tenant, from: u32, to: u32, stages: Vec<SyncStage>) -> SyncRequest {
        SyncRequest {
            tenant_id: tenant.id.to_string(),
            date_from: day(from),
            date_to: day(to),
            stages,
            strategy: None,
        }
    }

    fn executor(tenant: &Tenant, source: Arc<StaticSourceApi>, config: SyncConfig) -> SyncExecutor {
        let store = Arc::new(MemoryStore::with_tenant(tenant.clone()));
        let service = Arc::new(SyncService::new(store, source));
        SyncExecutor::new(service, Arc::new(ProgressTracker::new()), config)
    }

    fn not_cancelled() -> CancelFlag {
        Arc::new(AtomicBool::new(false))
    }

    #[tokio::test]
    async fn test_failing_day_does_not_stop_other_days() {
        let tenant = Tenant::new("Demo", "EMP01");
        let source = Arc::new(StaticSourceApi {
            invoices: vec![invoice("F1", "100", 1), invoice("F2", "100", 2), invoice("F3", "200", 3)],
            failing_days: [day(2)].into_iter().collect(),
            ..Default::default()
        });
        let exec = executor(&tenant, source, SyncConfig::default());
        let req = request(&tenant, 1, 3, vec![SyncStage::Invoices, SyncStage::Payments]);

        let summary = exec.execute(&tenant, &req, &not_cancelled(), None).await;

        assert_eq!(summary.report.days_processed, 3);
        assert_eq!(summary.report.invoices_created, 2);
        // день 2 упал и на счетах, и на платежах
        assert_eq!(summary.report.errors.len(), 2);
        assert!(summary.report.errors.iter().all(|e| e.date == Some(day(2))));
        assert_eq!(summary.report.errors[0].stage, SyncStage::Invoices);
        assert_eq!(summary.report.errors[1].stage, SyncStage::Payments);
        assert_eq!(summary.status(), SyncStatus::CompletedWithErrors);
    }

    #[tokio::test]
    async fn test_all_buckets_failing_is_failed() {
        let tenant = Tenant::new("Demo", "EMP01");
        let source = Arc::new(StaticSourceApi {
            failing_days: [day(1), day(2)].into_iter().collect(),
            ..Default::default()
        });
        let exec = executor(&tenant, source, SyncConfig::default());
        let req = request(&tenant, 1, 2, vec![SyncStage::Invoices]);

        let summary = exec.execute(&tenant, &req, &not_cancelled(), None).await;

        assert_eq!(summary.buckets, 2);
        assert_eq!(summary.failed_buckets, 2);
        assert_eq!(summary.status(), SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_day() {
        let tenant = Tenant::new("Demo", "EMP01");
        let source = Arc::new(StaticSourceApi {
            invoices: vec![invoice("F1", "100", 1), invoice("F2", "100", 2)],
            ..Default::default()
        });
        let cancel = not_cancelled();
        let flag = cancel.clone();
        *source.on_invoice_fetch.lock().unwrap() = Some(Box::new(move |_| flag.store(true, Ordering::SeqCst)));

        let exec = executor(&tenant, source.clone(), SyncConfig::default());
        let req = request(&tenant, 1, 5, vec![SyncStage::Invoices]);

        let summary = exec.execute(&tenant, &req, &cancel, None).await;

        assert!(summary.report.cancelled);
        assert_eq!(summary.report.days_processed, 1);
        assert_eq!(source.invoice_calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.status(), SyncStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_customer_pages_until_short_page() {
        let tenant = Tenant::new("Demo", "EMP01");
        let customers = (1..=5)
            .map(|i| CustomerRecord {
                nit: format!("90{}", i),
                name: Some(format!("Cliente {}", i)),
                ..Default::default()
            })
            .collect();
        let source = Arc::new(StaticSourceApi {
            customers,
            ..Default::default()
        });
        let config = SyncConfig {
            customer_page_size: 2,
            ..Default::default()
        };
        let exec = executor(&tenant, source, config);
        let req = request(&tenant, 1, 1, vec![SyncStage::Customers]);

        let summary = exec.execute(&tenant, &req, &not_cancelled(), None).await;

        assert_eq!(summary.report.customers_synced, 5);
        assert_eq!(summary.report.customers_created, 5);
        assert_eq!(summary.status(), SyncStatus::Completed);
    }

    #[tokio::test]
    async fn test_customer_page_failure_keeps_earlier_pages() {
        let tenant = Tenant::new("Demo", "EMP01");
        let customers = (1..=5)
            .map(|i| CustomerRecord {
                nit: format!("90{}", i),
                name: Some(format!("Cliente {}", i)),
                ..Default::default()
            })
            .collect();
        let source = Arc::new(StaticSourceApi {
            customers,
            failing_customer_pages: [2].into_iter().collect(),
            ..Default::default()
        });
        let config = SyncConfig {
            customer_page_size: 2,
            ..Default::default()
        };
        let exec = executor(&tenant, source.clone(), config);
        let req = request(&tenant, 1, 1, vec![SyncStage::Customers]);

        let summary = exec.execute(&tenant, &req, &not_cancelled(), None).await;

        // первая страница записана, вторая упала, третья не запрашивалась
        assert_eq!(summary.report.customers_synced, 2);
        assert_eq!(summary.report.customers_created, 2);
        assert_eq!(source.customer_calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.report.errors.len(), 1);
        assert_eq!(summary.report.errors[0].stage, SyncStage::Customers);
        assert!(summary.report.errors[0].message.contains("page 2"));
        assert_eq!(summary.status(), SyncStatus::CompletedWithErrors);
    }

    #[tokio::test]
    async fn test_customer_first_page_failure_is_failed() {
        let tenant = Tenant::new("Demo", "EMP01");
        let source = Arc::new(StaticSourceApi {
            customers: vec![CustomerRecord {
                nit: "901".into(),
                ..Default::default()
            }],
            customer_failures: AtomicUsize::new(1),
            ..Default::default()
        });
        let exec = executor(&tenant, source, SyncConfig::default());
        let req = request(&tenant, 1, 1, vec![SyncStage::Customers]);

        let summary = exec.execute(&tenant, &req, &not_cancelled(), None).await;

        assert_eq!(summary.report.customers_synced, 0);
        assert_eq!(summary.buckets, 1);
        assert_eq!(summary.failed_buckets, 1);
        assert_eq!(summary.status(), SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_start_sync_validates_and_completes_session() {
        let tenant = Tenant::new("Demo", "EMP01");
        let source = Arc::new(StaticSourceApi {
            invoices: vec![invoice("F1", "100", 1)],
            payments: vec![PaymentRecord {
                customer_nit: "100".into(),
                amount: 50.0,
                paid_at: Some(day(1)),
                ..Default::default()
            }],
            ..Default::default()
        });
        let exec = executor(&tenant, source, SyncConfig::default());

        let mut bad = request(&tenant, 1, 1, vec![]);
        bad.tenant_id = "not-a-uuid".into();
        assert!(exec.start_sync(bad).await.is_err());
        assert!(exec.start_sync(request(&tenant, 3, 1, vec![])).await.is_err());

        let started = exec.start_sync(request(&tenant, 1, 1, vec![])).await.unwrap();
        let mut progress = None;
        for _ in 0..100 {
            progress = exec.get_progress(&started.session_id);
            if progress.as_ref().map(|p| p.is_finished()).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let progress = progress.unwrap();
        assert_eq!(progress.status, SyncStatus::Completed);
        assert_eq!(progress.report.invoices_created, 1);
        assert_eq!(progress.report.payments_synced, 1);

        // завершённую сессию отменить нельзя
        assert!(!exec.cancel(&started.session_id).cancelled);
    }
}
