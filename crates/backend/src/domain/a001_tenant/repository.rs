use contracts::domain::a001_tenant::aggregate::{Tenant, TenantId};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder, Set};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "a001_tenant")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub external_id: String,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Tenant {
    type Error = anyhow::Error;

    fn try_from(m: Model) -> anyhow::Result<Self> {
        Ok(Tenant {
            id: TenantId(Uuid::parse_str(&m.id)?),
            name: m.name,
            external_id: m.external_id,
            is_active: m.is_active,
        })
    }
}

pub async fn list_all<C: ConnectionTrait>(db: &C) -> anyhow::Result<Vec<Tenant>> {
    Entity::find()
        .order_by_asc(Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(Tenant::try_from)
        .collect()
}

pub async fn get_by_id<C: ConnectionTrait>(db: &C, id: TenantId) -> anyhow::Result<Option<Tenant>> {
    Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .map(Tenant::try_from)
        .transpose()
}

pub async fn insert<C: ConnectionTrait>(db: &C, tenant: &Tenant) -> anyhow::Result<()> {
    let active = ActiveModel {
        id: Set(tenant.id.to_string()),
        name: Set(tenant.name.clone()),
        external_id: Set(tenant.external_id.clone()),
        is_active: Set(tenant.is_active),
    };
    active.insert(db).await?;
    Ok(())
}
