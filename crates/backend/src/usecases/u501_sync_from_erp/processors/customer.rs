use anyhow::Result;
use contracts::domain::a001_tenant::aggregate::TenantId;
use contracts::domain::a002_customer::aggregate::{Customer, NO_NAME};
use contracts::domain::a005_credit::aggregate::Credit;

use super::super::identity::{normalize_customer_id, sanitize_customer_name};
use super::super::source_models::CustomerRecord;
use crate::shared::data::storage::SyncStore;

/// Клиент, найденный или созданный при сверке
#[derive(Debug, Clone)]
pub struct ResolvedCustomer {
    pub customer: Customer,
    pub created: bool,
    /// Legacy-строка с ненормализованным NIT переименована
    pub migrated: bool,
}

/// Найти клиента по нормализованному NIT, затем по "сырому" (legacy-строки).
/// Legacy-строка переименовывается в нормализованный ключ, только если он свободен.
pub async fn find_customer(
    store: &dyn SyncStore,
    tenant_id: TenantId,
    raw_nit: &str,
) -> Result<Option<ResolvedCustomer>> {
    let nit = normalize_customer_id(raw_nit);
    if nit.is_empty() {
        return Ok(None);
    }

    if let Some(customer) = store.find_customer_by_nit(tenant_id, &nit).await? {
        return Ok(Some(ResolvedCustomer {
            customer,
            created: false,
            migrated: false,
        }));
    }

    let raw = raw_nit.trim();
    if raw == nit {
        return Ok(None);
    }
    match store.find_customer_by_nit(tenant_id, raw).await? {
        Some(mut customer) => {
            // Нормализованный ключ свободен (проверено выше)
            tracing::info!("Migrating legacy customer NIT '{}' -> '{}'", raw, nit);
            customer.nit = nit;
            customer.metadata.touch();
            store.update_customer(&customer).await?;
            Ok(Some(ResolvedCustomer {
                customer,
                created: false,
                migrated: true,
            }))
        }
        None => Ok(None),
    }
}

/// Найти клиента или лениво создать его с именем-заглушкой (`from_directory = false`).
/// `None`: NIT пустой после нормализации.
pub async fn resolve_or_create_customer(
    store: &dyn SyncStore,
    tenant_id: TenantId,
    raw_nit: &str,
) -> Result<Option<ResolvedCustomer>> {
    if let Some(found) = find_customer(store, tenant_id, raw_nit).await? {
        return Ok(Some(found));
    }

    let nit = normalize_customer_id(raw_nit);
    if nit.is_empty() {
        return Ok(None);
    }

    let customer = Customer::new_placeholder(tenant_id, nit);
    store.insert_customer(&customer).await?;
    tracing::debug!("Created placeholder customer {}", customer.nit);
    Ok(Some(ResolvedCustomer {
        customer,
        created: true,
        migrated: false,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerOutcome {
    Created,
    Updated,
    Skipped,
}

/// Upsert клиента из авторитетного справочника ERP.
/// Всегда ставит `from_directory = true`; кредитный лимит пишется отдельно от остатков.
pub async fn upsert_from_directory(
    store: &dyn SyncStore,
    tenant_id: TenantId,
    record: &CustomerRecord,
) -> Result<(CustomerOutcome, bool)> {
    let nit = normalize_customer_id(&record.nit);
    if nit.is_empty() {
        return Ok((CustomerOutcome::Skipped, false));
    }

    let valid_name = sanitize_customer_name(record.name.as_deref(), &nit);
    if valid_name.is_none() && record.name.is_some() {
        tracing::debug!("Rejected customer name {:?} for {}", record.name, nit);
    }

    let found = find_customer(store, tenant_id, &record.nit).await?;
    let migrated = found.as_ref().map(|f| f.migrated).unwrap_or(false);

    let (customer, outcome) = match found {
        Some(ResolvedCustomer { mut customer, .. }) => {
            match valid_name {
                Some(name) => customer.name = name,
                // Сохраняем уже известное корректное имя
                None => {
                    if sanitize_customer_name(Some(&customer.name), &nit).is_none() {
                        customer.name = NO_NAME.to_string();
                    }
                }
            }
            apply_directory_fields(&mut customer, record);
            customer.metadata.touch();
            store.update_customer(&customer).await?;
            (customer, CustomerOutcome::Updated)
        }
        None => {
            let mut customer = Customer::new_placeholder(tenant_id, nit);
            if let Some(name) = valid_name {
                customer.name = name;
            }
            apply_directory_fields(&mut customer, record);
            store.insert_customer(&customer).await?;
            (customer, CustomerOutcome::Created)
        }
    };

    if let Some(limit) = record.credit_limit.filter(|l| *l >= 0.0) {
        let mut credit = store
            .get_credit(customer.id)
            .await?
            .unwrap_or_else(|| Credit::empty(tenant_id, customer.id));
        credit.set_credit_limit(limit);
        store.save_credit(&credit).await?;
    }

    Ok((outcome, migrated))
}

fn apply_directory_fields(customer: &mut Customer, record: &CustomerRecord) {
    let clean = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    if let Some(city) = clean(&record.city) {
        customer.city = Some(city);
    }
    if let Some(vendor) = clean(&record.vendor) {
        customer.vendor = Some(vendor);
    }
    if let Some(segment) = clean(&record.segment) {
        customer.segment = Some(segment);
    }
    customer.from_directory = true;
}
