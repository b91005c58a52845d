use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use textql_agents::Text2SqlConfig;
use textql_core::{ExecutorSettings, PoolSettings};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub query: QueryConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub max_overflow: u32,
    pub pool_recycle_secs: u64,
    pub acquire_timeout_secs: u64,
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueryConfig {
    pub batch_size: usize,
    pub max_result_rows: usize,
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    /// Overrides the provider's base URL.
    pub api_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl ApiConfig {
    /// Defaults, then `textql.toml`, then `<config_dir>/textql/api.toml`, then
    /// `TEXTQL__SECTION__KEY` variables, then `DATABASE_URL`, `LLM_API_KEY`
    /// and `LLM_API_URL`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Self::defaults()?;

        if let Ok(current_dir) = env::current_dir() {
            let config_path = current_dir.join("textql.toml");
            if config_path.exists() {
                settings = settings.add_source(File::from(config_path));
            }
        }

        if let Some(config_path) = get_config_path() {
            settings = settings.add_source(File::from(config_path).required(false));
        }

        let settings = settings
            .add_source(
                Environment::with_prefix("TEXTQL")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("llm.api_key", env::var("LLM_API_KEY").ok())?
            .set_override_option("llm.api_url", env::var("LLM_API_URL").ok())?;

        settings.build()?.try_deserialize()
    }

    /// Defaults overlaid with a TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "")?
            .set_default("database.pool_size", 20)?
            .set_default("database.max_overflow", 10)?
            .set_default("database.pool_recycle_secs", 3600)?
            .set_default("database.acquire_timeout_secs", 10)?
            .set_default("database.statement_timeout_ms", 30_000)?
            .set_default("query.batch_size", 10_000)?
            .set_default("query.max_result_rows", 10_000)?
            .set_default("query.max_retries", 3)?
            .set_default("llm.model", "gemini-2.5-flash")?
            .set_default("llm.temperature", 0.0)?
            .set_default("llm.max_output_tokens", 5000)?
            .set_default("logging.level", "info")?
            .set_default("cors.allowed_origins", vec!["*"])
    }
}

impl DatabaseConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            url: self.url.clone(),
            pool_size: self.pool_size,
            max_overflow: self.max_overflow,
            recycle: Duration::from_secs(self.pool_recycle_secs),
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            statement_timeout: Duration::from_millis(self.statement_timeout_ms),
        }
    }
}

impl QueryConfig {
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            batch_size: self.batch_size,
            max_result_rows: self.max_result_rows,
        }
    }
}

impl LlmConfig {
    pub fn agent_config(&self, max_retries: u32) -> Text2SqlConfig {
        Text2SqlConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            max_retries,
        }
    }
}

fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("textql").join("api.toml"))
}
