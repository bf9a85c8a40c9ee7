use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tokio::task;
use tracing::{info, warn};

use crate::config::SecurityConfig;

pub mod migrator;
pub mod repositories;

pub use repositories::account::{Account, AccountPage, Role};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if db_url.starts_with("sqlite:") && !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn account_repo(&self) -> repositories::account::AccountRepository {
        repositories::account::AccountRepository::new(self.conn.clone())
    }

    pub async fn get_account_by_login(&self, login: &str) -> Result<Option<Account>> {
        self.account_repo().get_by_login(login).await
    }

    pub async fn get_account_by_id(&self, id: i32) -> Result<Option<Account>> {
        self.account_repo().get_by_id(id).await
    }

    pub async fn get_account_by_id_with_hash(&self, id: i32) -> Result<Option<(Account, String)>> {
        self.account_repo().get_by_id_with_hash(id).await
    }

    pub async fn get_account_by_login_with_hash(
        &self,
        login: &str,
    ) -> Result<Option<(Account, String)>> {
        self.account_repo().get_by_login_with_hash(login).await
    }

    pub async fn insert_account(
        &self,
        role: Role,
        login: &str,
        name: &str,
        password_hash: &str,
        register_time: &str,
    ) -> Result<Account> {
        self.account_repo()
            .insert(role, login, name, password_hash, register_time)
            .await
    }

    pub async fn list_accounts(&self, page: AccountPage) -> Result<Vec<Account>> {
        self.account_repo().list(page).await
    }

    pub async fn update_account_password_hash(&self, id: i32, password_hash: &str) -> Result<()> {
        self.account_repo()
            .update_password_hash(id, password_hash)
            .await
    }

    /// Insert the bootstrap admin account if no account with that login
    /// exists yet. Safe to call on every startup.
    pub async fn seed_admin(
        &self,
        login: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<()> {
        if self.get_account_by_login(login).await?.is_some() {
            return Ok(());
        }

        let password = password.to_string();
        let security = security.clone();
        let password_hash = task::spawn_blocking(move || {
            repositories::account::hash_password(&password, &security)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Password hashing task panicked: {e}"))??;

        let now = chrono::Utc::now().to_rfc3339();
        self.insert_account(Role::Admin, login, login, &password_hash, &now)
            .await?;

        info!("Seeded bootstrap admin account '{login}'");
        Ok(())
    }

    /// Development reset: drop the schema (best effort), recreate it, and
    /// seed the admin account. A failed drop is logged and does not abort
    /// table creation. Never wired into a production path.
    pub async fn reset(
        &self,
        admin_login: &str,
        admin_password: &str,
        security: &SecurityConfig,
    ) -> Result<()> {
        use sea_orm_migration::MigratorTrait;

        if let Err(e) = migrator::Migrator::down(&self.conn, None).await {
            warn!("Failed to drop tables during reset: {e}");
        }

        migrator::Migrator::up(&self.conn, None).await?;
        info!("Schema recreated");

        self.seed_admin(admin_login, admin_password, security).await
    }
}
