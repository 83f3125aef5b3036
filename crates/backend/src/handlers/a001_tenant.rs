use axum::{extract::State, http::StatusCode, Json};
use contracts::domain::a001_tenant::aggregate::Tenant;
use serde::Deserialize;

use super::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTenantDto {
    pub name: String,
    #[serde(rename = "externalId")]
    pub external_id: String,
}

/// GET /api/a001/tenants
pub async fn list_tenants(State(state): State<AppState>) -> Result<Json<Vec<Tenant>>, StatusCode> {
    match state.store.list_tenants().await {
        Ok(tenants) => Ok(Json(tenants)),
        Err(e) => {
            tracing::error!("Failed to list tenants: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /api/a001/tenants
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(dto): Json<CreateTenantDto>,
) -> Result<Json<Tenant>, StatusCode> {
    if dto.name.trim().is_empty() || dto.external_id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let tenant = Tenant::new(dto.name.trim(), dto.external_id.trim());
    match state.store.insert_tenant(&tenant).await {
        Ok(()) => Ok(Json(tenant)),
        Err(e) => {
            tracing::error!("Failed to create tenant {}: {}", dto.external_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
