use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::StorageConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of issued tokens.
    pub token_ttl_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Uploads retained per user; older ones are trimmed after each upload.
    pub keep: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { keep: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("database.url", "sqlite://flowsheet.db?mode=rwc")?
            .set_default("auth.token_ttl_hours", 24 * 7)?
            .set_default("history.keep", 5)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., FLOWSHEET__AUTH__JWT_SECRET)
            .add_source(
                Environment::with_prefix("FLOWSHEET")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins"),
            )
            .build()?;

        s.try_deserialize::<Self>()?.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.history.keep == 0 {
            return Err(ConfigError::Message(
                "history.keep must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}
