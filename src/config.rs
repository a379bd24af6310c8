use anyhow::{bail, Context};
use serde::Deserialize;

/// Signing settings of the in-memory auth provider.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalAuthConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl Default for LocalAuthConfig {
    fn default() -> Self {
        Self {
            secret: "local-dev-secret".into(),
            issuer: "userhub".into(),
            audience: "authenticated".into(),
            ttl_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum ProviderConfig {
    Supabase(SupabaseConfig),
    Memory(LocalAuthConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub users_table: String,
    pub provider: ProviderConfig,
}

fn ttl_minutes(raw: Option<String>) -> anyhow::Result<Option<i64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let minutes = raw
        .trim()
        .parse::<i64>()
        .context("LOCAL_JWT_TTL_MINUTES must be a number")?;
    if minutes <= 0 {
        bail!("LOCAL_JWT_TTL_MINUTES must be positive, got {}", minutes);
    }
    Ok(Some(minutes))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("APP_PORT")
            .or_else(|_| std::env::var("PORT"))
            .unwrap_or_else(|_| "3000".into())
            .parse::<u16>()
            .context("APP_PORT must be a port number")?;
        let users_table = std::env::var("USERS_TABLE").unwrap_or_else(|_| "trans_users".into());

        let kind = std::env::var("PROVIDER").unwrap_or_else(|_| "supabase".into());
        let provider = match kind.to_ascii_lowercase().as_str() {
            "supabase" => ProviderConfig::Supabase(SupabaseConfig {
                url: std::env::var("SUPABASE_URL").context("SUPABASE_URL is not set")?,
                anon_key: std::env::var("SUPABASE_ANON_KEY")
                    .context("SUPABASE_ANON_KEY is not set")?,
            }),
            "memory" => {
                let defaults = LocalAuthConfig::default();
                ProviderConfig::Memory(LocalAuthConfig {
                    secret: std::env::var("LOCAL_JWT_SECRET").unwrap_or(defaults.secret),
                    issuer: std::env::var("LOCAL_JWT_ISSUER").unwrap_or(defaults.issuer),
                    audience: std::env::var("LOCAL_JWT_AUDIENCE").unwrap_or(defaults.audience),
                    ttl_minutes: ttl_minutes(std::env::var("LOCAL_JWT_TTL_MINUTES").ok())?
                        .unwrap_or(defaults.ttl_minutes),
                })
            }
            other => bail!("unknown PROVIDER {:?} (expected supabase or memory)", other),
        };

        Ok(Self {
            host,
            port,
            users_table,
            provider,
        })
    }

    /// In-memory provider with default settings; what tests and local runs use.
    pub fn memory() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            users_table: "trans_users".into(),
            provider: ProviderConfig::Memory(LocalAuthConfig::default()),
        }
    }
}
