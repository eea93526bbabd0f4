use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::repo::{MemoryUserRepo, PgUserRepo, UserRepo};
use crate::config::{AppConfig, StorageBackend};
use crate::entries::repo::{EntryRepo, MemoryEntryRepo, PgEntryRepo};
use crate::mailer::{self, Mailer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub entries: Arc<dyn EntryRepo>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let mailer = mailer::from_config(&config.email)?;

        let (users, entries): (Arc<dyn UserRepo>, Arc<dyn EntryRepo>) = match config.storage {
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL missing")?;
                let db = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                let users: Arc<dyn UserRepo> = Arc::new(PgUserRepo::new(db.clone()));
                let entries: Arc<dyn EntryRepo> = Arc::new(PgEntryRepo::new(db));
                (users, entries)
            }
            StorageBackend::Memory => {
                tracing::warn!("no database configured; data lives in memory and is lost on restart");
                let users: Arc<dyn UserRepo> = Arc::new(MemoryUserRepo::new());
                let entries: Arc<dyn EntryRepo> = Arc::new(MemoryEntryRepo::new());
                (users, entries)
            }
        };

        Ok(Self::from_parts(config, users, entries, mailer))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        entries: Arc<dyn EntryRepo>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            users,
            entries,
            mailer,
        }
    }

    #[cfg(test)]
    pub fn test_config() -> Arc<AppConfig> {
        use crate::config::{EmailConfig, JwtConfig};

        Arc::new(AppConfig {
            storage: StorageBackend::Memory,
            database_url: None,
            max_connections: 1,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24 * 7,
            },
            email: EmailConfig {
                from: "no-reply@test.local".into(),
                webhook_url: None,
                webhook_token: None,
            },
            frontend_url: "http://app.test".into(),
        })
    }

    /// In-memory state with the given notifier.
    #[cfg(test)]
    pub fn fake_with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        Self::from_parts(
            Self::test_config(),
            Arc::new(MemoryUserRepo::new()),
            Arc::new(MemoryEntryRepo::new()),
            mailer,
        )
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_mailer(Arc::new(mailer::testing::RecordingMailer::default()))
    }
}
