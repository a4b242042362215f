use axum::{
    extract::State,
    response::Json,
};

use crate::{
    dto::notification_dto::{MarkReadPayload, MarkReadResponse},
    error::Result,
    middleware::auth::AuthUser,
    models::notification::Notification,
    AppState,
};

#[axum::debug_handler]
pub async fn list_notifications(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<Notification>>> {
    let notifications = state
        .notification_service
        .list(user.tenant_id, user.user_id)
        .await?;
    Ok(Json(notifications))
}

#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Option<Json<MarkReadPayload>>,
) -> Result<Json<MarkReadResponse>> {
    let id = payload.and_then(|Json(p)| p.id);
    let updated = state
        .notification_service
        .mark_read(user.tenant_id, user.user_id, id)
        .await?;
    Ok(Json(MarkReadResponse { updated }))
}
