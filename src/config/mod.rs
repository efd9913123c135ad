use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Signing secret used when nothing else is configured. Refused in production.
pub const DEV_SIGNING_SECRET: &str = "careorders-development-signing-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub store: StoreConfig,
    pub listing: ListingConfig,
    pub security: SecurityConfig,
    /// Staff registry uids written at startup (local development only)
    pub staff_seed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub max_age_days: u64,
    pub signing_secret: String,
    pub issuer: String,
    pub id_token_ttl_secs: u64,
    pub allow_dev_sign_in: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    pub patient_recent_limit: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SESSION_SIGNING_SECRET must be set to a non-default value outside development")]
    DefaultSigningSecret,

    #[error("development sign-in is only allowed in the development environment")]
    DevSignInOutsideDevelopment,

    #[error("DATABASE_URL is required for the postgres store backend")]
    MissingDatabaseUrl,

    #[error("invalid listing configuration: {0}")]
    InvalidListing(String),
}

impl SessionConfig {
    pub fn max_age_secs(&self) -> u64 {
        self.max_age_days * 24 * 60 * 60
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("CAREORDERS_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("BIND_ADDRESS") {
            self.server.bind_address = v;
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_COOKIE_NAME") {
            self.session.cookie_name = v;
        }
        if let Ok(v) = env::var("SESSION_MAX_AGE_DAYS") {
            self.session.max_age_days = v.parse().unwrap_or(self.session.max_age_days);
        }
        if let Ok(v) = env::var("SESSION_SIGNING_SECRET") {
            self.session.signing_secret = v;
        }
        if let Ok(v) = env::var("SESSION_ISSUER") {
            self.session.issuer = v;
        }
        if let Ok(v) = env::var("ID_TOKEN_TTL_SECS") {
            self.session.id_token_ttl_secs = v.parse().unwrap_or(self.session.id_token_ttl_secs);
        }
        if let Ok(v) = env::var("ALLOW_DEV_SIGN_IN") {
            self.session.allow_dev_sign_in = v.parse().unwrap_or(self.session.allow_dev_sign_in);
        }

        // Store overrides
        match env::var("STORE_BACKEND").as_deref() {
            Ok("postgres") | Ok("pg") => self.store.backend = StoreBackend::Postgres,
            Ok("memory") => self.store.backend = StoreBackend::Memory,
            _ => {}
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.store.connection_timeout = v.parse().unwrap_or(self.store.connection_timeout);
        }

        // Listing overrides
        if let Ok(v) = env::var("PATIENT_RECENT_LIMIT") {
            self.listing.patient_recent_limit = v.parse().unwrap_or(self.listing.patient_recent_limit);
        }
        if let Ok(v) = env::var("LIST_DEFAULT_PAGE_SIZE") {
            self.listing.default_page_size = v.parse().unwrap_or(self.listing.default_page_size);
        }
        if let Ok(v) = env::var("LIST_MAX_PAGE_SIZE") {
            self.listing.max_page_size = v.parse().unwrap_or(self.listing.max_page_size);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        if let Ok(v) = env::var("STAFF_UIDS") {
            self.staff_seed = split_list(&v);
        }

        self
    }

    /// Reject combinations that must never reach a running server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Only development may run with the built-in secret or dev sign-in
        if self.environment != Environment::Development {
            if self.session.signing_secret.is_empty() || self.session.signing_secret == DEV_SIGNING_SECRET {
                return Err(ConfigError::DefaultSigningSecret);
            }
            if self.session.allow_dev_sign_in {
                return Err(ConfigError::DevSignInOutsideDevelopment);
            }
        }

        if self.store.backend == StoreBackend::Postgres && self.store.database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        if self.listing.default_page_size == 0 || self.listing.max_page_size == 0 {
            return Err(ConfigError::InvalidListing("page sizes must be non-zero".to_string()));
        }
        if self.listing.default_page_size > self.listing.max_page_size {
            return Err(ConfigError::InvalidListing(format!(
                "default page size {} exceeds max {}",
                self.listing.default_page_size, self.listing.max_page_size
            )));
        }

        Ok(())
    }

    /// Clamp a caller-requested page size into the configured bounds.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|n| *n > 0)
            .unwrap_or(self.listing.default_page_size)
            .min(self.listing.max_page_size)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
            },
            session: SessionConfig {
                cookie_name: "session".to_string(),
                max_age_days: 5,
                signing_secret: DEV_SIGNING_SECRET.to_string(),
                issuer: "careorders-dev".to_string(),
                id_token_ttl_secs: 60 * 60,
                allow_dev_sign_in: true,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                max_connections: 5,
                connection_timeout: 30,
            },
            listing: ListingConfig {
                patient_recent_limit: 5,
                default_page_size: 25,
                max_page_size: 100,
            },
            security: SecurityConfig {
                enable_cors: false,
                cors_origins: vec!["http://localhost:8080".to_string()],
            },
            staff_seed: Vec::new(),
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
            },
            session: SessionConfig {
                cookie_name: "session".to_string(),
                max_age_days: 5,
                signing_secret: String::new(),
                issuer: "careorders-staging".to_string(),
                id_token_ttl_secs: 60 * 60,
                allow_dev_sign_in: false,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 10,
                connection_timeout: 10,
            },
            listing: ListingConfig {
                patient_recent_limit: 5,
                default_page_size: 25,
                max_page_size: 100,
            },
            security: SecurityConfig {
                enable_cors: false,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            staff_seed: Vec::new(),
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
            },
            session: SessionConfig {
                cookie_name: "session".to_string(),
                max_age_days: 5,
                signing_secret: String::new(),
                issuer: "careorders".to_string(),
                id_token_ttl_secs: 60 * 60,
                allow_dev_sign_in: false,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 20,
                connection_timeout: 5,
            },
            listing: ListingConfig {
                patient_recent_limit: 5,
                default_page_size: 25,
                max_page_size: 50,
            },
            security: SecurityConfig {
                enable_cors: false,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            staff_seed: Vec::new(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
