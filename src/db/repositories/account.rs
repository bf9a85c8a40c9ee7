use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;

use crate::config::SecurityConfig;
use crate::entities::accounts;

/// Account role. Unknown strings never reach this type; the service layer
/// ignores unrecognized filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Lenient parse: anything that is not a known role is `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account data returned from the repository (without the password hash)
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i32,
    pub role: String,
    pub login: String,
    pub name: String,
    pub register_time: String,
}

impl From<accounts::Model> for Account {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: model.id,
            role: model.role,
            login: model.login,
            name: model.name,
            register_time: model.register_time,
        }
    }
}

/// Listing filters. Pagination bounds are validated by the service layer
/// before they get here.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountPage {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub role: Option<Role>,
}

pub struct AccountRepository {
    conn: DatabaseConnection,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get account by login
    pub async fn get_by_login(&self, login: &str) -> Result<Option<Account>> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::Login.eq(login))
            .one(&self.conn)
            .await
            .context("Failed to query account by login")?;

        Ok(account.map(Account::from))
    }

    /// Get account by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<Account>> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account by ID")?;

        Ok(account.map(Account::from))
    }

    /// Get account by ID together with its password hash (for verification)
    pub async fn get_by_id_with_hash(&self, id: i32) -> Result<Option<(Account, String)>> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account by ID")?;

        Ok(account.map(|a| {
            let password_hash = a.password_hash.clone();
            (Account::from(a), password_hash)
        }))
    }

    /// Get account by login together with its password hash (for verification)
    pub async fn get_by_login_with_hash(&self, login: &str) -> Result<Option<(Account, String)>> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::Login.eq(login))
            .one(&self.conn)
            .await
            .context("Failed to query account by login")?;

        Ok(account.map(|a| {
            let password_hash = a.password_hash.clone();
            (Account::from(a), password_hash)
        }))
    }

    /// Insert a new account row. The unique constraint on `login` is the
    /// source of truth for duplicates; callers translate that violation.
    pub async fn insert(
        &self,
        role: Role,
        login: &str,
        name: &str,
        password_hash: &str,
        register_time: &str,
    ) -> Result<Account> {
        let active = accounts::ActiveModel {
            role: Set(role.as_str().to_string()),
            login: Set(login.to_string()),
            password_hash: Set(password_hash.to_string()),
            name: Set(name.to_string()),
            register_time: Set(register_time.to_string()),
            ..Default::default()
        };

        let model = active.insert(&self.conn).await?;
        Ok(Account::from(model))
    }

    /// List accounts ordered by registration time descending, with an
    /// optional role filter and optional pagination.
    pub async fn list(&self, page: AccountPage) -> Result<Vec<Account>> {
        let mut query = accounts::Entity::find().order_by_desc(accounts::Column::RegisterTime);

        if let Some(role) = page.role {
            query = query.filter(accounts::Column::Role.eq(role.as_str()));
        }

        if let (Some(offset), Some(limit)) = (page.offset, page.limit) {
            query = query.offset(offset).limit(limit);
        }

        let rows = query
            .all(&self.conn)
            .await
            .context("Failed to list accounts")?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    /// Replace the stored password hash for an account.
    pub async fn update_password_hash(&self, id: i32, password_hash: &str) -> Result<()> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account for password update")?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = account.into();
        active.password_hash = Set(password_hash.to_string());
        active.update(&self.conn).await?;

        Ok(())
    }
}

/// Hash a password using Argon2id with the configured cost parameters.
///
/// CPU-intensive; callers run this under `spawn_blocking` so it does not
/// stall the async runtime.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None, // output length (use default)
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash string. The hash carries its
/// own salt and parameters, so no config is needed here.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let config = SecurityConfig {
            argon2_memory_cost_kib: 64,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        };

        let hash = hash_password("correct horse", &config).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn hashes_embed_distinct_salts() {
        let config = SecurityConfig {
            argon2_memory_cost_kib: 64,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        };

        let first = hash_password("same password", &config).unwrap();
        let second = hash_password("same password", &config).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn garbage_hash_is_an_error_not_a_mismatch() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn role_parse_is_lenient() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
    }
}
