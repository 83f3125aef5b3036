use chrono::{NaiveDate, Utc};
use contracts::domain::a001_tenant::aggregate::TenantId;
use contracts::domain::a002_customer::aggregate::CustomerId;
use contracts::domain::a003_invoice::aggregate::InvoiceId;
use contracts::domain::a004_payment::aggregate::{Payment, PaymentId, PaymentKey};
use contracts::domain::common::EntityMetadata;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, PaginatorTrait, QueryOrder, Set};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "a004_payment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub invoice_id: Option<String>,
    pub paid_at: NaiveDate,
    pub amount: f64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Payment {
    type Error = anyhow::Error;

    fn try_from(m: Model) -> anyhow::Result<Self> {
        let invoice_id = match m.invoice_id.as_deref() {
            Some(id) => Some(InvoiceId(Uuid::parse_str(id)?)),
            None => None,
        };
        Ok(Payment {
            id: PaymentId(Uuid::parse_str(&m.id)?),
            tenant_id: TenantId(Uuid::parse_str(&m.tenant_id)?),
            customer_id: CustomerId(Uuid::parse_str(&m.customer_id)?),
            invoice_id,
            paid_at: m.paid_at,
            amount: m.amount,
            metadata: EntityMetadata {
                created_at: m.created_at.unwrap_or_else(Utc::now),
                updated_at: m.updated_at.unwrap_or_else(Utc::now),
            },
        })
    }
}

/// Дубликат = совпадение (tenant, customer, invoice, дата, сумма)
pub async fn exists<C: ConnectionTrait>(db: &C, key: &PaymentKey) -> anyhow::Result<bool> {
    let invoice_filter = match key.invoice_id {
        Some(id) => Column::InvoiceId.eq(id.to_string()),
        None => Column::InvoiceId.is_null(),
    };
    let count = Entity::find()
        .filter(Column::TenantId.eq(key.tenant_id.to_string()))
        .filter(Column::CustomerId.eq(key.customer_id.to_string()))
        .filter(invoice_filter)
        .filter(Column::PaidAt.eq(key.paid_at))
        .filter(Column::Amount.eq(key.amount))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub async fn insert<C: ConnectionTrait>(db: &C, payment: &Payment) -> anyhow::Result<()> {
    let active = ActiveModel {
        id: Set(payment.id.to_string()),
        tenant_id: Set(payment.tenant_id.to_string()),
        customer_id: Set(payment.customer_id.to_string()),
        invoice_id: Set(payment.invoice_id.map(|id| id.to_string())),
        paid_at: Set(payment.paid_at),
        amount: Set(payment.amount),
        created_at: Set(Some(payment.metadata.created_at)),
        updated_at: Set(Some(payment.metadata.updated_at)),
    };
    active.insert(db).await?;
    Ok(())
}

pub async fn list_by_tenant<C: ConnectionTrait>(db: &C, tenant_id: TenantId) -> anyhow::Result<Vec<Payment>> {
    Entity::find()
        .filter(Column::TenantId.eq(tenant_id.to_string()))
        .order_by_asc(Column::PaidAt)
        .all(db)
        .await?
        .into_iter()
        .map(Payment::try_from)
        .collect()
}
