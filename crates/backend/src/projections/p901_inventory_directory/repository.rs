use chrono::Utc;
use contracts::domain::a001_tenant::aggregate::TenantId;
use contracts::projections::p901_inventory_directory::DirectoryEntry;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, QueryOrder, Set};

/// Справочник номенклатуры арендатора: референс → марка / класс
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "p901_inventory_directory")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub reference: String,
    pub brand_code: Option<String>,
    pub brand: Option<String>,
    pub class_code: Option<String>,
    pub class_name: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for DirectoryEntry {
    fn from(m: Model) -> Self {
        DirectoryEntry {
            reference: m.reference,
            brand_code: m.brand_code,
            brand: m.brand,
            class_code: m.class_code,
            class_name: m.class_name,
        }
    }
}

pub async fn list_by_tenant<C: ConnectionTrait>(db: &C, tenant_id: TenantId) -> anyhow::Result<Vec<DirectoryEntry>> {
    Ok(Entity::find()
        .filter(Column::TenantId.eq(tenant_id.to_string()))
        .order_by_asc(Column::Reference)
        .all(db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Upsert по (tenant_id, reference)
pub async fn upsert_many<C: ConnectionTrait>(
    db: &C,
    tenant_id: TenantId,
    entries: &[DirectoryEntry],
) -> anyhow::Result<usize> {
    let now = Utc::now();
    for chunk in entries.chunks(100) {
        let models = chunk.iter().map(|e| ActiveModel {
            tenant_id: Set(tenant_id.to_string()),
            reference: Set(e.reference.clone()),
            brand_code: Set(e.brand_code.clone()),
            brand: Set(e.brand.clone()),
            class_code: Set(e.class_code.clone()),
            class_name: Set(e.class_name.clone()),
            updated_at: Set(now),
        });
        Entity::insert_many(models)
            .on_conflict(
                OnConflict::columns([Column::TenantId, Column::Reference])
                    .update_columns([
                        Column::BrandCode,
                        Column::Brand,
                        Column::ClassCode,
                        Column::ClassName,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(db)
            .await?;
    }
    Ok(entries.len())
}
