use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    dto::tenant_dto::{TenantCheckResponse, TenantStatusPayload},
    error::{Error, Result},
    models::tenant::Tenant,
    services::tenant_cache::CacheStats,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/tenants/{name}/check",
    params(("name" = String, Path, description = "Tenant slug")),
    responses((status = 200, description = "Whether the tenant exists and is active", body = TenantCheckResponse))
)]
#[axum::debug_handler]
pub async fn check_tenant(State(state): State<AppState>, Path(name): Path<String>) -> Json<TenantCheckResponse> {
    let resolution = state.tenant_cache.resolve(&name).await;
    Json(TenantCheckResponse {
        name,
        is_active: resolution.is_active,
    })
}

/// Activating or deactivating a tenant takes effect on the next request.
#[axum::debug_handler]
pub async fn set_tenant_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<TenantStatusPayload>,
) -> Result<Json<Tenant>> {
    let tenant = state
        .store
        .set_tenant_active(&name, payload.is_active)
        .await?
        .ok_or_else(|| Error::NotFound("Tenant not found".to_string()))?;
    state.tenant_cache.invalidate(&name);
    tracing::info!(tenant = %name, is_active = tenant.is_active, "tenant status changed");
    Ok(Json(tenant))
}

#[axum::debug_handler]
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.tenant_cache.stats())
}

#[axum::debug_handler]
pub async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.tenant_cache.clear_all();
    tracing::info!("tenant cache cleared");
    StatusCode::NO_CONTENT
}
