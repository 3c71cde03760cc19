//! Admin login, logout and identity.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAdminAuth, clear_current_admin, set_current_admin};
use crate::models::AdminUser;
use crate::services::{AdminAuthError, AdminAuthService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AdminUser>> {
    let admin = AdminAuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;

    let current = admin.to_session();
    set_current_admin(&session, &current).await?;
    set_sentry_user(current.id.as_i32(), Some(current.email.as_str()));

    Ok(Json(admin))
}

#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_admin(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in admin, with the role as currently stored.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn me(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<AdminUser>> {
    let admin = AdminAuthService::new(state.pool())
        .get_admin(admin.id)
        .await
        .map_err(|e| match e {
            AdminAuthError::UserNotFound => {
                AppError::Unauthorized("Authentication required".to_owned())
            }
            other => other.into(),
        })?;
    Ok(Json(admin))
}
