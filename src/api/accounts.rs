//! Account endpoints.
//!
//! External routes cover registration, profile, public lookup, listing and
//! password change; `/verify_account` is internal, for the auth
//! micro-service only, and must not be exposed past the gateway.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::{ApiError, ApiMessage, AppState};
use super::types::{ChangePasswordRequest, ListQuery, RegisterRequest, VerifyAccountRequest};
use crate::services::{AccountError, AccountLookup, CurrentUser};

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .accounts()
        .register(&payload.login, &payload.password, &payload.name)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiMessage::new("User was registered")),
    ))
}

/// GET /me
pub async fn me(
    State(state): State<Arc<AppState>>,
    current_user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.accounts().profile(&current_user).await?;
    Ok(Json(profile))
}

/// GET /account/{login}
pub async fn account_info(
    State(state): State<Arc<AppState>>,
    Path(login): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let info = state.accounts().account_info(&login).await?;
    Ok(Json(info))
}

/// GET /all?offset&limit&role
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let list = state
        .accounts()
        .list(query.offset, query.limit, query.role.as_deref())
        .await?;

    Ok(Json(list))
}

/// POST /change_password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    current_user: CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .accounts()
        .change_password(&current_user, &payload.old_password, &payload.new_password)
        .await?;

    Ok(Json(ApiMessage::new("Successfully changed password")))
}

/// POST /verify_account (internal)
pub async fn verify_account(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lookup = match (payload.account_id, payload.login) {
        (Some(id), _) => AccountLookup::Id(id),
        (None, Some(login)) => AccountLookup::Login(login),
        (None, None) => return Err(AccountError::MissingIdentifier.into()),
    };

    let verified = state.accounts().verify(lookup, &payload.password).await?;
    Ok(Json(verified))
}
