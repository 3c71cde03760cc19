//! Registration, login and session routes.
//!
//! Registration is two-step: `POST /auth/register/otp` validates the form
//! and emails a one-time code, `POST /auth/register/verify` creates the
//! account from the pending registration and logs the buyer in.
//!
//! Password reset mirrors it: `forgot-password` mails a code,
//! `verify-reset-otp` trades the code for a reset token and
//! `reset-password` spends the token.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use texos_core::models::{GuestCartLine, MergeReport};
use texos_core::services::CartService;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::Customer;
use crate::services::auth::{
    AuthError, AuthService, PasswordChangeRequest, PasswordResetRequest, ProfileUpdate,
    RegistrationRequest,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    #[serde(alias = "otp")]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Lines from the browser-held guest cart, folded in after login.
    #[serde(default, alias = "guestCart")]
    pub guest_cart: Vec<GuestCartLine>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ResetTokenResponse {
    pub message: &'static str,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: &'static str,
    pub user: Customer,
}

/// Same answer whether or not the email has an account.
const RESET_REQUESTED_MESSAGE: &str =
    "If your email is registered, you will receive a reset code shortly";

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: Customer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeReport>,
}

#[instrument(skip(state, body))]
pub async fn request_otp(
    State(state): State<AppState>,
    Json(body): Json<RegistrationRequest>,
) -> Result<Json<Value>> {
    AuthService::new(state.pool(), state.mailer())
        .request_registration(&body)
        .await?;
    Ok(Json(json!({ "message": "OTP sent to your email." })))
}

#[instrument(skip(state, session, body))]
pub async fn verify_otp(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<VerifyRequest>,
) -> Result<(StatusCode, Json<Customer>)> {
    let customer = AuthService::new(state.pool(), state.mailer())
        .verify_registration(&body.email, &body.code)
        .await?;
    start_session(&session, &customer).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let customer = AuthService::new(state.pool(), state.mailer())
        .login(&body.email, &body.password)
        .await?;
    start_session(&session, &customer).await?;

    let merge = if body.guest_cart.is_empty() {
        None
    } else {
        // The login already succeeded; a failed merge only loses the guest lines.
        match CartService::new(state.store())
            .merge_guest_cart(customer.id, &body.guest_cart)
            .await
        {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(user_id = %customer.id, error = %e, "Guest cart merge failed");
                None
            }
        }
    };

    Ok(Json(LoginResponse {
        user: customer,
        merge,
    }))
}

#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in buyer's account, read fresh from the database.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn me(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Customer>> {
    let customer = AuthService::new(state.pool(), state.mailer())
        .get_customer(user.id)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound => {
                AppError::Unauthorized("Authentication required".to_owned())
            }
            other => other.into(),
        })?;
    Ok(Json(customer))
}

#[instrument(skip(state, body))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    AuthService::new(state.pool(), state.mailer())
        .request_password_reset(&body.email)
        .await?;
    Ok(Json(json!({ "message": RESET_REQUESTED_MESSAGE })))
}

#[instrument(skip(state, body))]
pub async fn verify_reset_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<ResetTokenResponse>> {
    let token = AuthService::new(state.pool(), state.mailer())
        .verify_reset_code(&body.email, &body.code)
        .await?;
    Ok(Json(ResetTokenResponse {
        message: "Verification successful",
        token,
    }))
}

#[instrument(skip(state, body))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<Json<Value>> {
    AuthService::new(state.pool(), state.mailer())
        .reset_password(&body)
        .await?;
    Ok(Json(json!({ "message": "Password reset successful" })))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn change_password(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<PasswordChangeRequest>,
) -> Result<Json<Value>> {
    AuthService::new(state.pool(), state.mailer())
        .change_password(user.id, &body)
        .await?;
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// Update the buyer's own profile; the session copy follows the change.
#[instrument(skip(state, session, user, body), fields(user_id = %user.id))]
pub async fn update_profile(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let customer = AuthService::new(state.pool(), state.mailer())
        .update_profile(user.id, &body)
        .await?;
    let refreshed = customer.to_session();
    if refreshed != user {
        set_current_user(&session, &refreshed).await?;
        set_sentry_user(&refreshed.id, Some(refreshed.email.as_str()));
    }
    Ok(Json(ProfileResponse {
        message: "Profile updated successfully",
        user: customer,
    }))
}

async fn start_session(session: &Session, customer: &Customer) -> Result<()> {
    let user = customer.to_session();
    set_current_user(session, &user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "Buyer logged in");
    Ok(())
}
