use reqwest::Client;
use serde::Serialize;

/// Outcome of an invalidation request that reached the session service but
/// was refused. Status and message are forwarded verbatim to our caller.
#[derive(Debug)]
pub enum SessionServiceError {
    Rejected { status: u16, message: String },
    Transport(String),
}

impl std::fmt::Display for SessionServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { status, message } => {
                write!(f, "Session service rejected the request ({status}): {message}")
            }
            Self::Transport(msg) => write!(f, "Session service unreachable: {msg}"),
        }
    }
}

impl std::error::Error for SessionServiceError {}

#[derive(Serialize)]
struct InvalidateRequest<'a> {
    account_id: i32,
    session_id: &'a str,
}

/// Client for the companion auth service's session-invalidation endpoint.
#[derive(Clone)]
pub struct SessionClient {
    client: Client,
    invalidate_url: String,
}

impl SessionClient {
    #[must_use]
    pub fn with_shared_client(client: Client, invalidate_url: String) -> Self {
        Self {
            client,
            invalidate_url,
        }
    }

    /// Revoke every session for `(account_id, session_id)`. Any non-200
    /// answer is surfaced as `Rejected` with the upstream message; there is
    /// no retry.
    pub async fn invalidate_sessions(
        &self,
        account_id: i32,
        session_id: &str,
    ) -> Result<(), SessionServiceError> {
        let body = InvalidateRequest {
            account_id,
            session_id,
        };

        let response = self
            .client
            .post(&self.invalidate_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::OK {
            return Ok(());
        }

        let raw = response.text().await.unwrap_or_default();
        Err(SessionServiceError::Rejected {
            status: status.as_u16(),
            message: extract_message(&raw),
        })
    }
}

/// Pull the human-readable message out of an upstream error body. The auth
/// service answers `{"content": ...}`; FastAPI-style services answer
/// `{"detail": ...}`. Anything else is passed through as-is.
fn extract_message(raw: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        for key in ["content", "detail"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }

    raw.to_string()
}
