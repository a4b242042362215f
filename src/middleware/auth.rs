use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tenant::TenantContext;
use crate::error::{Error, Result};
use crate::models::user::Role;
use crate::AppState;

/// Claims issued by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// The authenticated actor. The role is parsed once here; nothing downstream
/// re-reads the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub tenant_id: Uuid,
}

pub fn sign_token(claims: &Claims, secret: &str) -> Result<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("failed to sign token: {}", e)))
}

fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            Error::Unauthorized("Invalid or expired token".to_string())
        })
}

/// Runs after the tenant middleware and admits only members of the resolved tenant.
pub async fn require_bearer_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response> {
    let Some(auth_header) = req.headers().get(axum::http::header::AUTHORIZATION) else {
        return Err(Error::Unauthorized("Authentication required".to_string()));
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err(Error::Unauthorized("Malformed authorization header".to_string()));
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err(Error::Unauthorized("Unsupported authorization scheme".to_string()));
    };

    let claims = verify_token(token, &state.jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| Error::Unauthorized("Invalid token subject".to_string()))?;
    let role: Role = claims.role.parse().map_err(|e| {
        tracing::warn!(user_id = %user_id, error = %e, "token carries an unknown role");
        Error::Unauthorized("Invalid role in token".to_string())
    })?;
    let tenant_id = req
        .extensions()
        .get::<TenantContext>()
        .map(|t| t.tenant_id)
        .ok_or_else(|| Error::BadRequest("Tenant ID is required".to_string()))?;

    // The header picks the tenant; the token holder must be an active member of it.
    match state.store.find_user(tenant_id, user_id).await? {
        Some(member) if member.is_active => {}
        _ => {
            tracing::warn!(user_id = %user_id, tenant_id = %tenant_id, "token holder is not an active member of the tenant");
            return Err(Error::Forbidden("User does not belong to this tenant".to_string()));
        }
    }

    req.extensions_mut().insert(AuthUser {
        user_id,
        email: claims.email,
        role,
        tenant_id,
    });
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| Error::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp: usize) -> Claims {
        Claims {
            sub: Uuid::nil().to_string(),
            email: "hr@acme.test".into(),
            role: "HR".into(),
            exp,
        }
    }

    #[test]
    fn signed_tokens_verify_with_the_same_secret_only() {
        let token = sign_token(&claims(4_102_444_800), "secret").unwrap();
        assert_eq!(verify_token(&token, "secret").unwrap().email, "hr@acme.test");
        assert!(matches!(verify_token(&token, "other"), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = sign_token(&claims(1), "secret").unwrap();
        assert!(matches!(verify_token(&token, "secret"), Err(Error::Unauthorized(_))));
    }
}
