use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use contracts::usecases::u501_sync_from_erp::{ScheduledRunResponse, SyncRequest, SyncStage};
use cron::Schedule;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::shared::config::SyncConfig;
use crate::shared::data::storage::SyncStore;
use crate::usecases::u501_sync_from_erp::executor::RunSummary;
use crate::usecases::u501_sync_from_erp::SyncExecutor;

/// Учёт календарных дней: справочник клиентов и догрузка не чаще раза в день
#[derive(Debug, Default)]
struct DayTracking {
    customers_synced_on: Option<NaiveDate>,
    backfill_done_on: Option<NaiveDate>,
}

/// Снимает флаг «идёт прогон» при любом выходе из тика, включая ошибку
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    /// Предыдущий прогон ещё не завершён
    Skipped,
    Completed { summaries: Vec<RunSummary> },
}

/// Фоновый планировщик синхронизации: по cron-расписанию обходит всех
/// активных арендаторов последовательно.
pub struct SyncScheduler {
    executor: Arc<SyncExecutor>,
    store: Arc<dyn SyncStore>,
    config: SyncConfig,
    in_flight: Arc<AtomicBool>,
    days: Mutex<DayTracking>,
}

impl SyncScheduler {
    pub fn new(executor: Arc<SyncExecutor>, store: Arc<dyn SyncStore>, config: SyncConfig) -> Self {
        Self {
            executor,
            store,
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
            days: Mutex::new(DayTracking::default()),
        }
    }

    /// Запускает цикл по расписанию `sync.schedule`.
    pub async fn run_loop(self: Arc<Self>) -> Result<()> {
        let schedule = Schedule::from_str(&self.config.schedule)
            .map_err(|e| anyhow::anyhow!("Invalid sync schedule '{}': {}", self.config.schedule, e))?;
        info!("Sync scheduler started with schedule '{}'", self.config.schedule);

        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                warn!("Sync schedule has no upcoming runs, scheduler stopped");
                return Ok(());
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match self.tick(Utc::now()).await {
                Ok(TickOutcome::Skipped) => info!("Previous sync tick still running, skipping"),
                Ok(TickOutcome::Completed { summaries }) => {
                    info!("Scheduled sync tick completed for {} tenant(s)", summaries.len())
                }
                Err(e) => error!("Scheduled sync tick failed: {:?}", e),
            }
        }
    }

    /// Внеочередной прогон под тем же флагом single-flight
    pub fn run_now(self: &Arc<Self>) -> ScheduledRunResponse {
        let Some(guard) = self.try_acquire() else {
            return ScheduledRunResponse {
                started: false,
                message: "Scheduled sync is already running".to_string(),
            };
        };

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = scheduler.run_tick(Utc::now()).await {
                error!("Manual scheduled sync tick failed: {:?}", e);
            }
        });

        ScheduledRunResponse {
            started: true,
            message: "Scheduled sync started".to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Один тик планировщика. Возвращает `Skipped`, если прогон уже идёт.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let Some(_guard) = self.try_acquire() else {
            return Ok(TickOutcome::Skipped);
        };
        self.run_tick(now).await
    }

    fn try_acquire(&self) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard(Arc::clone(&self.in_flight)))
    }

    /// Локальная дата арендаторов
    fn local_today(&self, now: DateTime<Utc>) -> NaiveDate {
        (now + Duration::hours(i64::from(self.config.utc_offset_hours))).date_naive()
    }

    async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let today = self.local_today(now);
        let (sync_directory, backfill) = {
            let days = self.days.lock().unwrap();
            (
                days.customers_synced_on != Some(today),
                self.config.backfill_days > 0 && days.backfill_done_on != Some(today),
            )
        };

        let date_from = if backfill {
            today - Duration::days(i64::from(self.config.backfill_days))
        } else {
            today
        };
        let mut stages = vec![SyncStage::Invoices, SyncStage::Payments];
        if sync_directory {
            stages.insert(0, SyncStage::Directory);
            stages.insert(0, SyncStage::Customers);
        }

        info!(
            "Sync tick for {}..{} (customers: {}, backfill: {})",
            date_from, today, sync_directory, backfill
        );

        let tenants = self.store.list_tenants().await?;
        let never_cancelled = Arc::new(AtomicBool::new(false));
        let mut summaries = Vec::new();

        for tenant in tenants.into_iter().filter(|t| t.is_active) {
            let request = SyncRequest {
                tenant_id: tenant.id.to_string(),
                date_from,
                date_to: today,
                stages: stages.clone(),
                strategy: None,
            };
            let summary = self
                .executor
                .execute(&tenant, &request, &never_cancelled, None)
                .await;
            if summary.report.has_errors() {
                warn!(
                    "Scheduled sync for tenant {} finished with {} error(s); failed days are retried on the next tick",
                    tenant.external_id,
                    summary.report.errors.len()
                );
            }
            summaries.push(summary);
        }

        // День отмечается выполненным, только если ни один арендатор не упал на этих этапах
        let directory_ok = summaries.iter().all(|s| {
            !s.report
                .errors
                .iter()
                .any(|e| matches!(e.stage, SyncStage::Customers | SyncStage::Directory))
        });
        let backfill_ok = summaries
            .iter()
            .all(|s| !s.report.errors.iter().any(|e| e.date.map(|d| d < today).unwrap_or(false)));

        let mut days = self.days.lock().unwrap();
        if sync_directory {
            if directory_ok {
                days.customers_synced_on = Some(today);
            } else {
                warn!("Customer directory sync failed, retrying on the next tick");
            }
        }
        if backfill {
            if backfill_ok {
                days.backfill_done_on = Some(today);
            } else {
                warn!("Backfill for {}..{} had failed days, retrying on the next tick", date_from, today);
            }
        }

        Ok(TickOutcome::Completed { summaries })
    }
}
