//! Address book routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use texos_core::AddressId;
use texos_core::models::{Address, AddressInput};
use texos_core::services::AddressBook;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(AddressBook::new(state.store()).list(user.id).await?))
}

#[instrument(skip(state, user, input), fields(user_id = %user.id))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = AddressBook::new(state.store()).create(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    Ok(Json(AddressBook::new(state.store()).get(user.id, id).await?))
}

#[instrument(skip(state, user, input), fields(user_id = %user.id))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressInput>,
) -> Result<Json<Address>> {
    Ok(Json(
        AddressBook::new(state.store())
            .update(user.id, id, input)
            .await?,
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressBook::new(state.store()).delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn set_default(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    Ok(Json(
        AddressBook::new(state.store())
            .set_default(user.id, id)
            .await?,
    ))
}
