//! Request context resolver.
//!
//! Reconstructs the caller's identity from headers injected by the upstream
//! gateway after it validated the session. No cryptographic check happens
//! here; the deployment contract is that these headers cannot reach this
//! service except through that gateway.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};

use super::ApiError;
use crate::services::CurrentUser;

pub const ACCOUNT_ID_HEADER: &str = "x-auth-account-id";
pub const SESSION_ID_HEADER: &str = "x-auth-session-id";
pub const ACCOUNT_ROLE_HEADER: &str = "x-auth-account-role";
pub const LOGIN_TIME_HEADER: &str = "x-auth-login-time";
pub const CLIENT_HEADER: &str = "x-auth-client";

fn header_value(headers: &HeaderMap, name: &str) -> Result<String, ApiError> {
    let value = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if value.is_empty() {
        return Err(ApiError::Unauthorized(format!("Missing header: {name}")));
    }

    Ok(value.to_string())
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account_id: i32 = header_value(&parts.headers, ACCOUNT_ID_HEADER)?
            .parse()
            .map_err(|_| {
                ApiError::Unauthorized(format!("Missing header: {ACCOUNT_ID_HEADER}"))
            })?;

        Ok(Self {
            account_id,
            session_id: header_value(&parts.headers, SESSION_ID_HEADER)?,
            role: header_value(&parts.headers, ACCOUNT_ROLE_HEADER)?,
            login_time: header_value(&parts.headers, LOGIN_TIME_HEADER)?,
            client: header_value(&parts.headers, CLIENT_HEADER)?,
        })
    }
}
