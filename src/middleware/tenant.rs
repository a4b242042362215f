use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::services::tenant_cache::TenantResolution;
use crate::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// The tenant every downstream query of this request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub key: String,
}

pub async fn require_tenant(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response> {
    let key = req
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::BadRequest("Tenant ID is required".to_string()))?;

    let tenant_id = match state.tenant_cache.resolve(&key).await {
        TenantResolution {
            tenant_id: Some(id),
            is_active: true,
        } => id,
        _ => {
            tracing::debug!(tenant = %key, "rejected request for unknown or inactive tenant");
            return Err(Error::Forbidden("Invalid or inactive tenant".to_string()));
        }
    };

    req.extensions_mut().insert(TenantContext { tenant_id, key });
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or_else(|| Error::BadRequest("Tenant ID is required".to_string()))
    }
}
