//! API configuration.
//!
//! Loaded in layers:
//! 1. defaults in code
//! 2. optional `config/<environment>` file (toml, yaml, json, ...)
//! 3. `STOCKBOOK__*` environment overrides, e.g. `STOCKBOOK__SERVER__PORT=9000`

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use tracing::warn;

use stockbook_infra::{LedgerSettings, Pagination};
use stockbook_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_RECALCULATION_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Current environment (development, production, ...).
    pub environment: String,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub ledger: LedgerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret for bearer tokens.
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Reject movements and reclassifications that would drive a balance below zero.
    pub enforce_availability: bool,
    /// Keys per `recalculate-all` page when the caller does not pass a limit.
    pub recalculation_page_size: u32,
    /// Upper bound for a caller-provided `recalculate-all` limit.
    pub max_recalculation_page_size: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    pub format: LogFormat,
}

impl ApiConfig {
    /// Load configuration from files and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCKBOOK_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", DEFAULT_HOST)?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("ledger.enforce_availability", true)?
            .set_default(
                "ledger.recalculation_page_size",
                i64::from(DEFAULT_RECALCULATION_PAGE_SIZE),
            )?
            .set_default(
                "ledger.max_recalculation_page_size",
                i64::from(Pagination::MAX_LIMIT),
            )?
            .set_default("log.format", "json")?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("STOCKBOOK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// In-code defaults with a fixed JWT secret (tests, embedding).
    pub fn with_jwt_secret(secret: impl Into<String>) -> Self {
        Self {
            auth: AuthConfig {
                jwt_secret: Some(secret.into()),
            },
            ..Self::default()
        }
    }

    /// The configured JWT secret, or an insecure development default.
    pub fn jwt_secret(&self) -> String {
        match self.auth.jwt_secret.as_deref().map(str::trim) {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => {
                warn!("auth.jwt_secret not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        }
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            enforce_availability: self.ledger.enforce_availability,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            auth: AuthConfig { jwt_secret: None },
            ledger: LedgerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl LedgerConfig {
    /// Pagination for one `recalculate-all` request.
    pub fn recalculation_page(&self, limit: Option<u32>, offset: Option<u32>) -> Pagination {
        let limit = limit.or(Some(self.recalculation_page_size));
        Pagination::capped(limit, offset, self.max_recalculation_page_size)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enforce_availability: true,
            recalculation_page_size: DEFAULT_RECALCULATION_PAGE_SIZE,
            max_recalculation_page_size: Pagination::MAX_LIMIT,
        }
    }
}
