use serde::{Deserialize, Serialize};

/// Uniform message envelope used for confirmations and every error body.
/// Data endpoints return their payload as a raw object instead.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub content: String,
}

impl ApiMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub login: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Lookup for the internal verify endpoint: the auth service sends an
/// account id when it has one, a login otherwise.
#[derive(Debug, Deserialize)]
pub struct VerifyAccountRequest {
    pub account_id: Option<i32>,
    pub login: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<String>,
}
