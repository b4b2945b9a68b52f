mod config;
mod repos;
mod services;
mod system;

pub use config::Config;
pub use repos::{LedgerKey, NotificationOutboxBatch, Repos};
pub use services::*;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
pub use system::{ISys, MockSys, RealSys};
use tracing::{error, warn};

#[derive(Clone)]
pub struct NotifierContext {
    pub repos: Repos,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
    pub mailer: Arc<dyn IMailTransport>,
    pub templates: Arc<dyn ITemplateResolver>,
}

struct ContextParams {
    pub postgres_connection_string: Option<String>,
}

impl NotifierContext {
    async fn create(params: ContextParams) -> Self {
        let config = Config::new();
        let repos = match &params.postgres_connection_string {
            Some(connection_string) => Repos::create_postgres(connection_string)
                .await
                .expect("Postgres credentials must be set and valid"),
            None => {
                warn!("DATABASE_URL is not set, notifications are only kept in memory.");
                Repos::create_inmemory()
            }
        };
        let mailer = create_mailer(&config);

        Self {
            repos,
            config,
            sys: Arc::new(RealSys {}),
            mailer,
            templates: Arc::new(DefaultTemplateResolver {}),
        }
    }

    /// Context without any external dependencies, only used for testing
    pub fn create_inmemory() -> Self {
        Self {
            repos: Repos::create_inmemory(),
            config: Config::new(),
            sys: Arc::new(RealSys {}),
            mailer: Arc::new(InMemoryMailTransport::new()),
            templates: Arc::new(DefaultTemplateResolver {}),
        }
    }
}

fn create_mailer(config: &Config) -> Arc<dyn IMailTransport> {
    match &config.mail_relay_url {
        Some(url) => match RelayMailTransport::new(url.clone()) {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                error!(
                    "Unable to create the mail relay client, notifications will only be logged: {:?}",
                    e
                );
                Arc::new(LogMailTransport {})
            }
        },
        None => Arc::new(LogMailTransport {}),
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> NotifierContext {
    NotifierContext::create(ContextParams {
        postgres_connection_string: get_psql_connection_string(),
    })
    .await
}

fn get_psql_connection_string() -> Option<String> {
    const PSQL_CONNECTION_STRING: &str = "DATABASE_URL";

    std::env::var(PSQL_CONNECTION_STRING)
        .ok()
        .filter(|s| !s.trim().is_empty())
}

/// Runs the embedded migrations. Does nothing without a database.
pub async fn run_migration() -> Result<(), MigrateError> {
    let connection_string = match get_psql_connection_string() {
        Some(connection_string) => connection_string,
        None => return Ok(()),
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await
        .map_err(MigrateError::Execute)?;

    sqlx::migrate!().run(&pool).await
}
