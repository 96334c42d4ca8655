use std::path::PathBuf;
use std::sync::Arc;

use common::{
    storage::db::SurrealDbClient,
    utils::{config::AppConfig, token::TokenService},
};
use scrape_pipeline::{JobSupervisor, LocationScraper};

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub tokens: Arc<TokenService>,
    pub supervisor: Arc<JobSupervisor>,
}

impl ApiState {
    pub async fn new(
        config: &AppConfig,
        scraper: Arc<dyn LocationScraper>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        surreal_db_client.apply_migrations().await?;

        Ok(Self::from_parts(surreal_db_client, config.clone(), scraper))
    }

    /// Assemble state around an existing database connection. Used by the
    /// integration tests with an in-memory database.
    pub fn from_parts(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        scraper: Arc<dyn LocationScraper>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(
            &config.jwt_secret,
            config.jwt_issuer.clone(),
            config.token_ttl_hours,
        ));
        let supervisor = Arc::new(JobSupervisor::new(
            db.clone(),
            scraper,
            PathBuf::from(&config.export_dir),
        ));

        Self {
            db,
            config,
            tokens,
            supervisor,
        }
    }
}
