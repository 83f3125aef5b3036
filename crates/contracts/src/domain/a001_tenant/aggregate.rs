use serde::{Deserialize, Serialize};

use crate::uuid_aggregate_id;

// ============================================================================
// ID Type
// ============================================================================
uuid_aggregate_id!(TenantId);

// ============================================================================
// Aggregate Root
// ============================================================================

/// Арендатор SaaS. Все остальные сущности квалифицируются `tenant_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Идентификатор арендатора во внешней ERP (код компании)
    #[serde(rename = "externalId")]
    pub external_id: String,
    #[serde(rename = "isActive", default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Tenant {
    pub fn new(name: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            id: TenantId::new_v4(),
            name: name.into(),
            external_id: external_id.into(),
            is_active: true,
        }
    }
}
