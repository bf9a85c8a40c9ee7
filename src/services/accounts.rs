//! Credential service: password hashing/verification, account CRUD, and the
//! cross-service session invalidation that follows a password change.
//!
//! `change_password` deliberately calls the session service *before* the
//! stored hash is updated and outside any storage transaction. If the hash
//! update then fails, sessions are already revoked with the password
//! unchanged; the old password still verifies, so the holder can simply log
//! in again. Reversing the order would leave live sessions on a changed
//! password, which is worse.

use sea_orm::error::SqlErr;
use serde::Serialize;
use thiserror::Error;
use tokio::task;

use crate::clients::sessions::{SessionClient, SessionServiceError};
use crate::config::SecurityConfig;
use crate::db::repositories::account::{hash_password, verify_password};
use crate::db::{AccountPage, Role, Store};

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Account with this login already exists")]
    LoginTaken,

    #[error("No account with this login")]
    UnknownLogin,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Old and new passwords are equal")]
    PasswordReused,

    #[error("Offset or limit has wrong values")]
    InvalidPageBounds,

    #[error("Account id or login is required")]
    MissingIdentifier,

    /// Verbatim passthrough of a session-service refusal.
    #[error("{message}")]
    SessionService { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AccountError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Per-request caller identity reconstructed from trusted gateway headers.
/// Lives for one request; never persisted.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub account_id: i32,
    pub role: String,
    pub session_id: String,
    pub login_time: String,
    pub client: String,
}

/// `/me` response: persisted account fields merged with the ephemeral
/// session fields.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub account_id: i32,
    pub role: String,
    pub session_id: String,
    pub client: String,
    pub login_time: String,
    pub login: String,
    pub name: String,
    pub register_time: String,
}

/// Public account fields. The hash never leaves the store layer.
#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub login: String,
    pub role: String,
    pub name: String,
    pub register_time: String,
}

#[derive(Debug, Serialize)]
pub struct AccountList {
    pub count: usize,
    pub accounts: Vec<AccountInfo>,
}

/// Result handed back to the auth service so it can establish a session.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedAccount {
    pub account_id: i32,
    pub role: String,
}

/// How `verify` should look the account up. Id wins when the caller sends
/// both.
#[derive(Debug, Clone)]
pub enum AccountLookup {
    Id(i32),
    Login(String),
}

pub struct AccountService {
    store: Store,
    sessions: SessionClient,
    security: SecurityConfig,
}

impl AccountService {
    #[must_use]
    pub const fn new(store: Store, sessions: SessionClient, security: SecurityConfig) -> Self {
        Self {
            store,
            sessions,
            security,
        }
    }

    /// Create a `user`-role account. The existence pre-check is only the
    /// fast path; the unique constraint on `login` is the source of truth,
    /// and its violation maps to the same conflict.
    pub async fn register(
        &self,
        login: &str,
        password: &str,
        name: &str,
    ) -> Result<(), AccountError> {
        if self.store.get_account_by_login(login).await?.is_some() {
            return Err(AccountError::LoginTaken);
        }

        let password_hash = self.hash_blocking(password).await?;
        let now = chrono::Utc::now().to_rfc3339();

        match self
            .store
            .insert_account(Role::User, login, name, &password_hash, &now)
            .await
        {
            Ok(account) => {
                tracing::info!("Registered account '{}' (id {})", account.login, account.id);
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(AccountError::LoginTaken),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge the caller's persisted account with its ephemeral session
    /// fields.
    pub async fn profile(&self, current_user: &CurrentUser) -> Result<ProfileView, AccountError> {
        let account = self
            .store
            .get_account_by_id(current_user.account_id)
            .await?
            .ok_or(AccountError::AccountNotFound)?;

        Ok(ProfileView {
            account_id: current_user.account_id,
            role: current_user.role.clone(),
            session_id: current_user.session_id.clone(),
            client: current_user.client.clone(),
            login_time: current_user.login_time.clone(),
            login: account.login,
            name: account.name,
            register_time: account.register_time,
        })
    }

    pub async fn account_info(&self, login: &str) -> Result<AccountInfo, AccountError> {
        let account = self
            .store
            .get_account_by_login(login)
            .await?
            .ok_or(AccountError::UnknownLogin)?;

        Ok(AccountInfo {
            login: account.login,
            role: account.role,
            name: account.name,
            register_time: account.register_time,
        })
    }

    /// List accounts ordered by registration time descending.
    ///
    /// Pagination only applies when BOTH offset and limit are supplied;
    /// supplying one of the two silently disables it. When both are
    /// present, `offset < 0` or `limit < 1` is rejected. Unrecognized role
    /// filter values are ignored, not rejected.
    pub async fn list(
        &self,
        offset: Option<i64>,
        limit: Option<i64>,
        role: Option<&str>,
    ) -> Result<AccountList, AccountError> {
        let page = match (offset, limit) {
            (Some(offset), Some(limit)) => {
                if offset < 0 || limit < 1 {
                    return Err(AccountError::InvalidPageBounds);
                }
                AccountPage {
                    offset: Some(offset.unsigned_abs()),
                    limit: Some(limit.unsigned_abs()),
                    role: role.and_then(Role::parse),
                }
            }
            _ => AccountPage {
                offset: None,
                limit: None,
                role: role.and_then(Role::parse),
            },
        };

        let accounts: Vec<AccountInfo> = self
            .store
            .list_accounts(page)
            .await?
            .into_iter()
            .map(|account| AccountInfo {
                login: account.login,
                role: account.role,
                name: account.name,
                register_time: account.register_time,
            })
            .collect();

        Ok(AccountList {
            count: accounts.len(),
            accounts,
        })
    }

    /// Change the caller's password. Sessions are revoked through the auth
    /// service before the hash is replaced; a session-service refusal is
    /// forwarded verbatim and leaves the hash untouched.
    pub async fn change_password(
        &self,
        current_user: &CurrentUser,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let (account, stored_hash) = self
            .store
            .get_account_by_id_with_hash(current_user.account_id)
            .await?
            .ok_or(AccountError::AccountNotFound)?;

        if !self.verify_blocking(old_password, stored_hash).await? {
            return Err(AccountError::IncorrectPassword);
        }

        if old_password == new_password {
            return Err(AccountError::PasswordReused);
        }

        self.sessions
            .invalidate_sessions(current_user.account_id, &current_user.session_id)
            .await
            .map_err(|e| match e {
                SessionServiceError::Rejected { status, message } => {
                    AccountError::SessionService { status, message }
                }
                SessionServiceError::Transport(msg) => AccountError::Internal(msg),
            })?;

        let new_hash = self.hash_blocking(new_password).await?;
        self.store
            .update_account_password_hash(account.id, &new_hash)
            .await?;

        tracing::info!("Password changed for account id {}", account.id);
        Ok(())
    }

    /// Credential check for the auth micro-service. Looks the account up by
    /// id or login and verifies the password against the stored hash.
    pub async fn verify(
        &self,
        lookup: AccountLookup,
        password: &str,
    ) -> Result<VerifiedAccount, AccountError> {
        let row = match lookup {
            AccountLookup::Id(id) => self.store.get_account_by_id_with_hash(id).await?,
            AccountLookup::Login(login) => {
                self.store.get_account_by_login_with_hash(&login).await?
            }
        };

        let (account, stored_hash) = row.ok_or(AccountError::AccountNotFound)?;

        if !self.verify_blocking(password, stored_hash).await? {
            return Err(AccountError::IncorrectPassword);
        }

        Ok(VerifiedAccount {
            account_id: account.id,
            role: account.role,
        })
    }

    /// Argon2 hashing is CPU-intensive and would stall the async runtime if
    /// run inline.
    async fn hash_blocking(&self, password: &str) -> Result<String, AccountError> {
        let password = password.to_string();
        let security = self.security.clone();

        task::spawn_blocking(move || hash_password(&password, &security))
            .await
            .map_err(|e| AccountError::Internal(format!("Password hashing task panicked: {e}")))?
            .map_err(AccountError::from)
    }

    async fn verify_blocking(
        &self,
        password: &str,
        stored_hash: String,
    ) -> Result<bool, AccountError> {
        let password = password.to_string();

        task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(|e| {
                AccountError::Internal(format!("Password verification task panicked: {e}"))
            })?
            .map_err(AccountError::from)
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sea_orm::DbErr>()
            .and_then(sea_orm::DbErr::sql_err),
        Some(SqlErr::UniqueConstraintViolation(_))
    )
}
