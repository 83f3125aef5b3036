use contracts::domain::a001_tenant::aggregate::TenantId;
use contracts::domain::a002_customer::aggregate::CustomerId;
use contracts::domain::a005_credit::aggregate::Credit;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, Set};
use uuid::Uuid;

/// Кредитный снимок клиента (1:1, ключ customer_id)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "a005_credit")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub customer_id: String,
    pub tenant_id: String,
    pub balance: f64,
    pub overdue: f64,
    pub dso_days: i32,
    pub credit_limit: Option<f64>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Credit {
    type Error = anyhow::Error;

    fn try_from(m: Model) -> anyhow::Result<Self> {
        Ok(Credit {
            customer_id: CustomerId(Uuid::parse_str(&m.customer_id)?),
            tenant_id: TenantId(Uuid::parse_str(&m.tenant_id)?),
            balance: m.balance,
            overdue: m.overdue,
            dso_days: m.dso_days,
            credit_limit: m.credit_limit,
            updated_at: m.updated_at,
        })
    }
}

pub async fn get_by_customer<C: ConnectionTrait>(db: &C, customer_id: CustomerId) -> anyhow::Result<Option<Credit>> {
    Entity::find_by_id(customer_id.to_string())
        .one(db)
        .await?
        .map(Credit::try_from)
        .transpose()
}

/// Insert or replace
pub async fn upsert<C: ConnectionTrait>(db: &C, credit: &Credit) -> anyhow::Result<()> {
    let active = ActiveModel {
        customer_id: Set(credit.customer_id.to_string()),
        tenant_id: Set(credit.tenant_id.to_string()),
        balance: Set(credit.balance),
        overdue: Set(credit.overdue),
        dso_days: Set(credit.dso_days),
        credit_limit: Set(credit.credit_limit),
        updated_at: Set(credit.updated_at),
    };
    Entity::insert(active)
        .on_conflict(
            OnConflict::column(Column::CustomerId)
                .update_columns([
                    Column::Balance,
                    Column::Overdue,
                    Column::DsoDays,
                    Column::CreditLimit,
                    Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}
