use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,
    pub jwt_secret: String,
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,
}

impl AppConfig {
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_tests() -> Self {
        Self {
            surrealdb_address: "mem://".to_string(),
            surrealdb_username: "root".to_string(),
            surrealdb_password: "root".to_string(),
            surrealdb_namespace: "test".to_string(),
            surrealdb_database: "test".to_string(),
            http_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: default_jwt_issuer(),
            token_ttl_hours: default_token_ttl_hours(),
            export_dir: std::env::temp_dir()
                .join("listing-harvester-exports")
                .to_string_lossy()
                .into_owned(),
            search_base_url: default_search_base_url(),
        }
    }
}

fn default_jwt_issuer() -> String {
    "listing-harvester".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_export_dir() -> String {
    "./exports".to_string()
}

fn default_search_base_url() -> String {
    "https://www.google.com/maps".to_string()
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
