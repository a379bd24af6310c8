use std::sync::Arc;

use tracing::info;

use crate::{
    auth::{
        repo::{AuthRepository, ProviderAuthRepository},
        services::AuthUseCase,
    },
    config::{AppConfig, LocalAuthConfig, ProviderConfig},
    provider::{
        memory::{MemoryAuth, MemoryTables},
        supabase::SupabaseClient,
        AuthProvider, DataProvider,
    },
    users::{
        repo::{ProviderUserRepository, UserRepository},
        services::UserUseCase,
    },
};

/// Shared handles passed to every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserUseCase>,
    pub auth: Arc<AuthUseCase>,
}

impl AppState {
    /// Composition root: one provider handle, adapters over it, use cases over those.
    pub fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let (auth, data): (Arc<dyn AuthProvider>, Arc<dyn DataProvider>) = match &config.provider
        {
            ProviderConfig::Supabase(cfg) => {
                info!(url = %cfg.url, "using supabase provider");
                let client = Arc::new(SupabaseClient::new(&cfg.url, &cfg.anon_key)?);
                let auth: Arc<dyn AuthProvider> = client.clone();
                let data: Arc<dyn DataProvider> = client;
                (auth, data)
            }
            ProviderConfig::Memory(cfg) => {
                info!("using in-memory provider");
                memory_providers(cfg, &config.users_table)
            }
        };

        Ok(Self::over_providers(auth, data, &config.users_table))
    }

    fn over_providers(
        auth: Arc<dyn AuthProvider>,
        data: Arc<dyn DataProvider>,
        users_table: &str,
    ) -> Self {
        Self::from_parts(
            Arc::new(ProviderUserRepository::new(data, users_table)),
            Arc::new(ProviderAuthRepository::new(auth)),
        )
    }

    /// Wires use cases over the given repositories.
    pub fn from_parts(users: Arc<dyn UserRepository>, auth: Arc<dyn AuthRepository>) -> Self {
        Self {
            users: Arc::new(UserUseCase::new(users)),
            auth: Arc::new(AuthUseCase::new(auth)),
        }
    }

    /// Fresh in-memory provider with default settings.
    pub fn in_memory() -> Self {
        let config = AppConfig::memory();
        let (auth, data) = memory_providers(&LocalAuthConfig::default(), &config.users_table);
        Self::over_providers(auth, data, &config.users_table)
    }
}

fn memory_providers(
    cfg: &LocalAuthConfig,
    users_table: &str,
) -> (Arc<dyn AuthProvider>, Arc<dyn DataProvider>) {
    let auth: Arc<dyn AuthProvider> = Arc::new(MemoryAuth::new(cfg));
    let tables: Arc<dyn DataProvider> =
        Arc::new(MemoryTables::new().with_table(users_table, &["email"]));
    (auth, tables)
}
