use anyhow::Result;
use chrono::NaiveDate;
use contracts::domain::a001_tenant::aggregate::TenantId;
use contracts::domain::a002_customer::aggregate::CustomerId;
use contracts::domain::a004_payment::aggregate::Payment;
use contracts::domain::a005_credit::aggregate::{Credit, CreditSnapshot};
use std::collections::HashMap;

use super::super::identity::normalize_customer_id;
use super::super::source_models::PaymentRecord;
use super::customer::{resolve_or_create_customer, ResolvedCustomer};
use crate::shared::data::storage::SyncStore;

/// Итог обработки платёжных записей окна
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentBatchResult {
    pub records: usize,
    pub skipped: usize,
    pub customers_created: usize,
    pub payments_inserted: usize,
    pub payments_duplicated: usize,
    pub credits_updated: usize,
    pub undated_balances: usize,
}

/// Накопитель дебиторки по клиенту в пределах одного прогона
#[derive(Debug, Default)]
struct CreditAccumulator {
    balance: f64,
    overdue: f64,
    overdue_days_sum: i64,
    overdue_count: i64,
    credit_limit: Option<f64>,
}

impl CreditAccumulator {
    fn snapshot(&self) -> CreditSnapshot {
        let dso_days = if self.overdue_count > 0 {
            (self.overdue_days_sum as f64 / self.overdue_count as f64).round() as i32
        } else {
            0
        };
        CreditSnapshot {
            balance: round2(self.balance),
            overdue: round2(self.overdue),
            dso_days,
            credit_limit: self.credit_limit,
        }
    }
}

/// Дней просрочки по записи: явное значение или сравнение срока с `as_of`.
/// `None`: ни срока, ни числа дней нет.
fn overdue_days(record: &PaymentRecord, as_of: NaiveDate) -> Option<i64> {
    record
        .days_overdue
        .or_else(|| record.due_date.map(|due| (as_of - due).num_days()))
}

/// Обработать платёжные записи окна: дедуплицированная вставка оплат
/// и один снимок кредита на каждого клиента, встреченного в окне.
pub async fn sync_payment_records(
    store: &dyn SyncStore,
    tenant_id: TenantId,
    records: &[PaymentRecord],
    fallback_date: NaiveDate,
    as_of: NaiveDate,
) -> Result<PaymentBatchResult> {
    let mut result = PaymentBatchResult {
        records: records.len(),
        ..Default::default()
    };
    let mut customers: HashMap<String, ResolvedCustomer> = HashMap::new();
    let mut credits: HashMap<CustomerId, CreditAccumulator> = HashMap::new();
    // Порядок первого появления нужен для детерминированной записи снимков
    let mut credit_order: Vec<CustomerId> = Vec::new();

    for record in records {
        let nit = normalize_customer_id(&record.customer_nit);
        if nit.is_empty() {
            result.skipped += 1;
            continue;
        }

        let customer = match customers.get(&nit) {
            Some(resolved) => resolved.customer.clone(),
            None => {
                let Some(resolved) =
                    resolve_or_create_customer(store, tenant_id, &record.customer_nit).await?
                else {
                    result.skipped += 1;
                    continue;
                };
                if resolved.created {
                    result.customers_created += 1;
                }
                let customer = resolved.customer.clone();
                customers.insert(nit.clone(), resolved);
                customer
            }
        };

        let acc = credits.entry(customer.id).or_insert_with(|| {
            credit_order.push(customer.id);
            CreditAccumulator::default()
        });

        if let Some(limit) = record.credit_limit.filter(|l| *l >= 0.0) {
            acc.credit_limit = Some(limit);
        }

        if record.balance > 0.0 {
            acc.balance += record.balance;
            match overdue_days(record, as_of) {
                Some(days) if days > 0 => {
                    acc.overdue += record.balance;
                    acc.overdue_days_sum += days;
                    acc.overdue_count += 1;
                }
                Some(_) => {}
                None => result.undated_balances += 1,
            }
        }

        if record.amount > 0.0 {
            let invoice_id = match record
                .invoice_number
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
            {
                Some(number) => store
                    .find_invoice(tenant_id, customer.id, number)
                    .await?
                    .map(|i| i.id),
                None => None,
            };

            let payment = Payment::new(
                tenant_id,
                customer.id,
                invoice_id,
                record.paid_at.unwrap_or(fallback_date),
                record.amount,
            );
            if store.payment_exists(&payment.key()).await? {
                result.payments_duplicated += 1;
            } else {
                store.insert_payment(&payment).await?;
                result.payments_inserted += 1;
            }
        }
    }

    // Снимок заменяет предыдущее состояние кредита клиента
    for customer_id in credit_order {
        let Some(acc) = credits.get(&customer_id) else {
            continue;
        };
        let mut credit = store
            .get_credit(customer_id)
            .await?
            .unwrap_or_else(|| Credit::empty(tenant_id, customer_id));
        credit.apply_snapshot(&acc.snapshot());
        store.save_credit(&credit).await?;
        result.credits_updated += 1;
    }

    if result.undated_balances > 0 {
        tracing::warn!(
            "{} open balances have neither due date nor overdue days; counted as not overdue",
            result.undated_balances
        );
    }

    Ok(result)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::data::memory_store::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn balance(nit: &str, balance: f64, days: Option<i64>, due: Option<NaiveDate>) -> PaymentRecord {
        PaymentRecord {
            customer_nit: nit.into(),
            balance,
            days_overdue: days,
            due_date: due,
            ..Default::default()
        }
    }

    fn paid(nit: &str, amount: f64, at: NaiveDate) -> PaymentRecord {
        PaymentRecord {
            customer_nit: nit.into(),
            amount,
            paid_at: Some(at),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_overdue_from_explicit_days_and_due_date() {
        let store = MemoryStore::new();
        let tenant = TenantId::new_v4();
        let records = vec![
            balance("1", 500.0, Some(10), None),
            balance("1", 300.0, None, Some(day(1))), // 19 дней к 20-му
            balance("1", 200.0, None, Some(day(25))),
            balance("1", 100.0, None, None),
        ];
        let result = sync_payment_records(&store, tenant, &records, day(20), day(20))
            .await
            .unwrap();
        assert_eq!(result.credits_updated, 1);
        assert_eq!(result.undated_balances, 1);

        let customer = store.find_customer_by_nit(tenant, "1").await.unwrap().unwrap();
        let credit = store.get_credit(customer.id).await.unwrap().unwrap();
        assert_eq!(credit.balance, 1100.0);
        assert_eq!(credit.overdue, 800.0);
        assert_eq!(credit.dso_days, 15); // round((10 + 19) / 2)
    }

    #[tokio::test]
    async fn test_credit_snapshot_is_replaced_not_added() {
        let store = MemoryStore::new();
        let tenant = TenantId::new_v4();

        sync_payment_records(&store, tenant, &[balance("C", 500.0, Some(10), None)], day(5), day(5))
            .await
            .unwrap();
        let customer = store.find_customer_by_nit(tenant, "C").await.unwrap().unwrap();
        assert_eq!(store.get_credit(customer.id).await.unwrap().unwrap().overdue, 500.0);

        // Второй прогон: у клиента только оплата, без просроченных остатков
        sync_payment_records(&store, tenant, &[paid("C", 50.0, day(6))], day(6), day(6))
            .await
            .unwrap();
        let credit = store.get_credit(customer.id).await.unwrap().unwrap();
        assert_eq!(credit.overdue, 0.0);
        assert_eq!(credit.balance, 0.0);
        assert_eq!(credit.dso_days, 0);
    }

    #[tokio::test]
    async fn test_payment_dedup_by_exact_tuple() {
        let store = MemoryStore::new();
        let tenant = TenantId::new_v4();
        let records = vec![paid("9001K", 200.0, day(5)), paid("9001k", 200.0, day(5)), paid("9001K", 200.0, day(6))];

        let first = sync_payment_records(&store, tenant, &records, day(5), day(6))
            .await
            .unwrap();
        assert_eq!(first.payments_inserted, 2);
        assert_eq!(first.payments_duplicated, 1);
        assert_eq!(first.customers_created, 1);

        let second = sync_payment_records(&store, tenant, &records, day(5), day(6))
            .await
            .unwrap();
        assert_eq!(second.payments_inserted, 0);
        assert_eq!(store.list_payments(tenant).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_records_without_nit_are_skipped() {
        let store = MemoryStore::new();
        let tenant = TenantId::new_v4();
        let result = sync_payment_records(&store, tenant, &[paid(" ", 10.0, day(1))], day(1), day(1))
            .await
            .unwrap();
        assert_eq!(result.skipped, 1);
        assert!(store.list_payments(tenant).await.unwrap().is_empty());
    }
}
