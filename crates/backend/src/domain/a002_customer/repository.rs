use chrono::Utc;
use contracts::domain::a001_tenant::aggregate::TenantId;
use contracts::domain::a002_customer::aggregate::{Customer, CustomerId};
use contracts::domain::common::EntityMetadata;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder, Set};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "a002_customer")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: String,
    pub nit: String,
    pub name: String,
    pub city: Option<String>,
    pub vendor: Option<String>,
    pub segment: Option<String>,
    pub from_directory: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Customer {
    type Error = anyhow::Error;

    fn try_from(m: Model) -> anyhow::Result<Self> {
        Ok(Customer {
            id: CustomerId(Uuid::parse_str(&m.id)?),
            tenant_id: TenantId(Uuid::parse_str(&m.tenant_id)?),
            nit: m.nit,
            name: m.name,
            city: m.city,
            vendor: m.vendor,
            segment: m.segment,
            from_directory: m.from_directory,
            metadata: EntityMetadata {
                created_at: m.created_at.unwrap_or_else(Utc::now),
                updated_at: m.updated_at.unwrap_or_else(Utc::now),
            },
        })
    }
}

fn to_active(c: &Customer) -> ActiveModel {
    ActiveModel {
        id: Set(c.id.to_string()),
        tenant_id: Set(c.tenant_id.to_string()),
        nit: Set(c.nit.clone()),
        name: Set(c.name.clone()),
        city: Set(c.city.clone()),
        vendor: Set(c.vendor.clone()),
        segment: Set(c.segment.clone()),
        from_directory: Set(c.from_directory),
        created_at: Set(Some(c.metadata.created_at)),
        updated_at: Set(Some(c.metadata.updated_at)),
    }
}

pub async fn find_by_nit<C: ConnectionTrait>(
    db: &C,
    tenant_id: TenantId,
    nit: &str,
) -> anyhow::Result<Option<Customer>> {
    Entity::find()
        .filter(Column::TenantId.eq(tenant_id.to_string()))
        .filter(Column::Nit.eq(nit))
        .one(db)
        .await?
        .map(Customer::try_from)
        .transpose()
}

pub async fn list_by_tenant<C: ConnectionTrait>(db: &C, tenant_id: TenantId) -> anyhow::Result<Vec<Customer>> {
    Entity::find()
        .filter(Column::TenantId.eq(tenant_id.to_string()))
        .order_by_asc(Column::Nit)
        .all(db)
        .await?
        .into_iter()
        .map(Customer::try_from)
        .collect()
}

pub async fn insert<C: ConnectionTrait>(db: &C, customer: &Customer) -> anyhow::Result<()> {
    to_active(customer).insert(db).await?;
    Ok(())
}

pub async fn update<C: ConnectionTrait>(db: &C, customer: &Customer) -> anyhow::Result<()> {
    let mut active = to_active(customer);
    active.created_at = sea_orm::ActiveValue::NotSet;
    active.update(db).await?;
    Ok(())
}
