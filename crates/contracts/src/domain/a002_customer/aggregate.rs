use serde::{Deserialize, Serialize};

use super::super::a001_tenant::aggregate::TenantId;
use crate::domain::common::EntityMetadata;
use crate::uuid_aggregate_id;

/// Имя-заглушка для клиентов без достоверного наименования.
pub const NO_NAME: &str = "Sin nombre";

// ============================================================================
// ID Type
// ============================================================================
uuid_aggregate_id!(CustomerId);

// ============================================================================
// Aggregate Root
// ============================================================================

/// Клиент арендатора. Уникален по паре (`tenant_id`, канонический `nit`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    #[serde(rename = "tenantId")]
    pub tenant_id: TenantId,
    /// Канонический налоговый идентификатор (NIT)
    pub nit: String,
    pub name: String,
    pub city: Option<String>,
    pub vendor: Option<String>,
    pub segment: Option<String>,
    /// Подтверждён ли клиент авторитетным справочником клиентов ERP
    #[serde(rename = "fromDirectory", default)]
    pub from_directory: bool,
    #[serde(flatten)]
    pub metadata: EntityMetadata,
}

impl Customer {
    /// Клиент, созданный "на лету" по ссылке из счёта или платежа.
    pub fn new_placeholder(tenant_id: TenantId, nit: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new_v4(),
            tenant_id,
            nit: nit.into(),
            name: NO_NAME.to_string(),
            city: None,
            vendor: None,
            segment: None,
            from_directory: false,
            metadata: EntityMetadata::new(),
        }
    }

    /// Заполняет город, только если он ещё не известен. Возвращает `true`, если город изменён.
    pub fn backfill_city(&mut self, city: Option<&str>) -> bool {
        let known = self
            .city
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);
        match city.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) if !known => {
                self.city = Some(c.to_string());
                self.metadata.touch();
                true
            }
            _ => false,
        }
    }
}
