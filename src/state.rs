use std::sync::Arc;

use crate::clients::sessions::SessionClient;
use crate::config::Config;
use crate::db::Store;
use crate::services::AccountService;

/// Build a shared HTTP client with reasonable defaults for the outbound
/// session-service call.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent("accountd/0.1")
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

pub struct SharedState {
    pub config: Config,

    pub store: Store,

    pub sessions: SessionClient,

    pub accounts: Arc<AccountService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        store
            .seed_admin(&config.admin.login, &config.admin.password, &config.security)
            .await?;

        let http_client =
            build_shared_http_client(config.sessions.request_timeout_seconds)?;
        let sessions = SessionClient::with_shared_client(
            http_client,
            config.sessions.invalidate_url.clone(),
        );

        let accounts = Arc::new(AccountService::new(
            store.clone(),
            sessions.clone(),
            config.security.clone(),
        ));

        Ok(Self {
            config,
            store,
            sessions,
            accounts,
        })
    }
}
