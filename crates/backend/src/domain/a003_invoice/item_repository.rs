use contracts::domain::a003_invoice::aggregate::{InvoiceId, InvoiceItem};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder, Set};
use uuid::Uuid;

/// Позиции счёта; набор всегда перезаписывается целиком
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "a003_invoice_item")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub invoice_id: String,
    pub line_no: i32,
    pub reference: Option<String>,
    pub product_name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub class_code: Option<String>,
    pub class_name: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
    pub margin: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for InvoiceItem {
    type Error = anyhow::Error;

    fn try_from(m: Model) -> anyhow::Result<Self> {
        Ok(InvoiceItem {
            id: Uuid::parse_str(&m.id)?,
            invoice_id: InvoiceId(Uuid::parse_str(&m.invoice_id)?),
            line_no: m.line_no,
            reference: m.reference,
            product_name: m.product_name,
            brand: m.brand,
            category: m.category,
            class_code: m.class_code,
            class_name: m.class_name,
            quantity: m.quantity,
            unit_price: m.unit_price,
            total: m.total,
            margin: m.margin,
        })
    }
}

pub async fn list_by_invoice<C: ConnectionTrait>(db: &C, invoice_id: InvoiceId) -> anyhow::Result<Vec<InvoiceItem>> {
    Entity::find()
        .filter(Column::InvoiceId.eq(invoice_id.to_string()))
        .order_by_asc(Column::LineNo)
        .all(db)
        .await?
        .into_iter()
        .map(InvoiceItem::try_from)
        .collect()
}

pub async fn delete_by_invoice<C: ConnectionTrait>(db: &C, invoice_id: InvoiceId) -> anyhow::Result<u64> {
    let result = Entity::delete_many()
        .filter(Column::InvoiceId.eq(invoice_id.to_string()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn insert_many<C: ConnectionTrait>(db: &C, items: &[InvoiceItem]) -> anyhow::Result<()> {
    // SQLite ограничивает число параметров в одном запросе
    for chunk in items.chunks(50) {
        let models = chunk.iter().map(|i| ActiveModel {
            id: Set(i.id.to_string()),
            invoice_id: Set(i.invoice_id.to_string()),
            line_no: Set(i.line_no),
            reference: Set(i.reference.clone()),
            product_name: Set(i.product_name.clone()),
            brand: Set(i.brand.clone()),
            category: Set(i.category.clone()),
            class_code: Set(i.class_code.clone()),
            class_name: Set(i.class_name.clone()),
            quantity: Set(i.quantity),
            unit_price: Set(i.unit_price),
            total: Set(i.total),
            margin: Set(i.margin),
        });
        Entity::insert_many(models).exec(db).await?;
    }
    Ok(())
}
