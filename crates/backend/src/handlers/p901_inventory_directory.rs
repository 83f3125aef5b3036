use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use contracts::domain::a001_tenant::aggregate::{Tenant, TenantId};
use contracts::domain::common::AggregateId;
use contracts::projections::p901_inventory_directory::DirectoryImportResponse;

use super::app_state::AppState;
use crate::projections::p901_inventory_directory::service;

async fn find_tenant(state: &AppState, id: &str) -> Result<Tenant, StatusCode> {
    let tenant_id = TenantId::from_string(id).map_err(|_| StatusCode::BAD_REQUEST)?;
    match state.store.get_tenant(tenant_id).await {
        Ok(Some(tenant)) => Ok(tenant),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to load tenant {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /api/p901/inventory-directory/:tenant_id/upload
///
/// Тело запроса: текст CSV (разделитель `;`).
pub async fn upload_csv(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    body: String,
) -> Result<Json<DirectoryImportResponse>, (StatusCode, String)> {
    let tenant = find_tenant(&state, &tenant_id)
        .await
        .map_err(|code| (code, format!("Tenant {} is not available", tenant_id)))?;

    service::import_csv(state.store.as_ref(), tenant.id, &body)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!("Inventory directory upload rejected for {}: {}", tenant_id, e);
            (StatusCode::BAD_REQUEST, e.to_string())
        })
}

/// POST /api/p901/inventory-directory/:tenant_id/sync
pub async fn sync_from_source(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<DirectoryImportResponse>, (StatusCode, String)> {
    let tenant = find_tenant(&state, &tenant_id)
        .await
        .map_err(|code| (code, format!("Tenant {} is not available", tenant_id)))?;

    service::sync_from_source(
        state.store.as_ref(),
        state.service.source().as_ref(),
        tenant.id,
        &tenant.external_id,
    )
    .await
    .map(Json)
    .map_err(|e| {
        tracing::error!("Inventory directory sync failed for {}: {}", tenant_id, e);
        (StatusCode::BAD_GATEWAY, e.to_string())
    })
}
