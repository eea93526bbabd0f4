use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Where users and entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub from: String,
    /// Provider endpoint; verification links are only logged when unset.
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub frontend_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let storage = match std::env::var("STORAGE_BACKEND") {
            Ok(v) => parse_backend(&v)?,
            Err(_) if database_url.is_some() => StorageBackend::Postgres,
            Err(_) => StorageBackend::Memory,
        };
        if storage == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORAGE_BACKEND=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "productivity-tracker".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "productivity-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };

        let email = EmailConfig {
            from: std::env::var("EMAIL_FROM").unwrap_or_else(|_| "no-reply@localhost".into()),
            webhook_url: std::env::var("EMAIL_WEBHOOK_URL").ok().filter(|v| !v.is_empty()),
            webhook_token: std::env::var("EMAIL_WEBHOOK_TOKEN").ok().filter(|v| !v.is_empty()),
        };

        Ok(Self {
            storage,
            database_url,
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            jwt,
            email,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

fn parse_backend(value: &str) -> anyhow::Result<StorageBackend> {
    match value.trim().to_ascii_lowercase().as_str() {
        "postgres" | "pg" => Ok(StorageBackend::Postgres),
        "memory" | "mem" => Ok(StorageBackend::Memory),
        other => anyhow::bail!("unknown STORAGE_BACKEND {other:?}"),
    }
}
