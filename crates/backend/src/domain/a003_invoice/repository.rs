use chrono::{NaiveDate, Utc};
use contracts::domain::a001_tenant::aggregate::TenantId;
use contracts::domain::a002_customer::aggregate::CustomerId;
use contracts::domain::a003_invoice::aggregate::{Invoice, InvoiceId};
use contracts::domain::common::EntityMetadata;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder, Set};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "a003_invoice")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub invoice_number: String,
    pub issued_at: NaiveDate,
    pub total: f64,
    pub margin: f64,
    pub units: f64,
    pub sale_sign: i32,
    pub signed_total: f64,
    pub signed_margin: f64,
    pub signed_units: f64,
    pub vendor: Option<String>,
    pub city: Option<String>,
    pub document_type: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Invoice {
    type Error = anyhow::Error;

    fn try_from(m: Model) -> anyhow::Result<Self> {
        Ok(Invoice {
            id: InvoiceId(Uuid::parse_str(&m.id)?),
            tenant_id: TenantId(Uuid::parse_str(&m.tenant_id)?),
            customer_id: CustomerId(Uuid::parse_str(&m.customer_id)?),
            invoice_number: m.invoice_number,
            issued_at: m.issued_at,
            total: m.total,
            margin: m.margin,
            units: m.units,
            sale_sign: m.sale_sign,
            signed_total: m.signed_total,
            signed_margin: m.signed_margin,
            signed_units: m.signed_units,
            vendor: m.vendor,
            city: m.city,
            document_type: m.document_type,
            metadata: EntityMetadata {
                created_at: m.created_at.unwrap_or_else(Utc::now),
                updated_at: m.updated_at.unwrap_or_else(Utc::now),
            },
        })
    }
}

fn to_active(i: &Invoice) -> ActiveModel {
    ActiveModel {
        id: Set(i.id.to_string()),
        tenant_id: Set(i.tenant_id.to_string()),
        customer_id: Set(i.customer_id.to_string()),
        invoice_number: Set(i.invoice_number.clone()),
        issued_at: Set(i.issued_at),
        total: Set(i.total),
        margin: Set(i.margin),
        units: Set(i.units),
        sale_sign: Set(i.sale_sign),
        signed_total: Set(i.signed_total),
        signed_margin: Set(i.signed_margin),
        signed_units: Set(i.signed_units),
        vendor: Set(i.vendor.clone()),
        city: Set(i.city.clone()),
        document_type: Set(i.document_type.clone()),
        created_at: Set(Some(i.metadata.created_at)),
        updated_at: Set(Some(i.metadata.updated_at)),
    }
}

/// Поиск по естественному ключу (tenant, customer, number)
pub async fn find_by_number<C: ConnectionTrait>(
    db: &C,
    tenant_id: TenantId,
    customer_id: CustomerId,
    invoice_number: &str,
) -> anyhow::Result<Option<Invoice>> {
    Entity::find()
        .filter(Column::TenantId.eq(tenant_id.to_string()))
        .filter(Column::CustomerId.eq(customer_id.to_string()))
        .filter(Column::InvoiceNumber.eq(invoice_number))
        .one(db)
        .await?
        .map(Invoice::try_from)
        .transpose()
}

pub async fn list_by_tenant<C: ConnectionTrait>(db: &C, tenant_id: TenantId) -> anyhow::Result<Vec<Invoice>> {
    Entity::find()
        .filter(Column::TenantId.eq(tenant_id.to_string()))
        .order_by_asc(Column::IssuedAt)
        .order_by_asc(Column::InvoiceNumber)
        .all(db)
        .await?
        .into_iter()
        .map(Invoice::try_from)
        .collect()
}

pub async fn insert<C: ConnectionTrait>(db: &C, invoice: &Invoice) -> anyhow::Result<()> {
    to_active(invoice).insert(db).await?;
    Ok(())
}

pub async fn update<C: ConnectionTrait>(db: &C, invoice: &Invoice) -> anyhow::Result<()> {
    let mut active = to_active(invoice);
    active.created_at = sea_orm::ActiveValue::NotSet;
    active.update(db).await?;
    Ok(())
}
