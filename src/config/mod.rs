use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Signing secret used when none is configured. Refused in production.
pub const DEV_JWT_SECRET: &str = "places-api-dev-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL. When absent the server runs on the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    /// Google Geocoding API key. Without one, addresses resolve to `fallback`.
    pub api_key: Option<String>,
    pub api_base: String,
    pub fallback: (f64, f64),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("SECURITY_JWT_SECRET must be set outside development")]
    DevSecretInProduction,
    #[error("invalid geocoder base URL '{0}'")]
    InvalidGeocoderBase(String),
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
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(port) = env::var("PLACES_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_MAX_UPLOAD_BYTES") {
            self.api.max_upload_bytes = v.parse().unwrap_or(self.api.max_upload_bytes);
        }
        if let Ok(v) = env::var("API_UPLOAD_DIR") {
            self.api.upload_dir = PathBuf::from(v);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            if !v.is_empty() {
                self.security.jwt_secret = v;
            }
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Geocoder overrides
        if let Ok(v) = env::var("GEOCODER_API_KEY") {
            if !v.trim().is_empty() {
                self.geocoder.api_key = Some(v);
            }
        }
        if let Ok(v) = env::var("GEOCODER_API_BASE") {
            self.geocoder.api_base = v;
        }

        self
    }

    /// Checks that must pass before the server binds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != Environment::Development && self.security.jwt_secret == DEV_JWT_SECRET {
            return Err(ConfigError::DevSecretInProduction);
        }
        if url::Url::parse(&self.geocoder.api_base).is_err() {
            return Err(ConfigError::InvalidGeocoderBase(self.geocoder.api_base.clone()));
        }
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 5000,
                max_upload_bytes: 5 * 1024 * 1024, // 5MB
                upload_dir: PathBuf::from("uploads/images"),
            },
            security: SecurityConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                jwt_expiry_hours: 1,
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            geocoder: GeocoderConfig::default(),
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.api.max_upload_bytes = 2 * 1024 * 1024; // 2MB
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://maps.googleapis.com".to_string(),
            fallback: (40.7484474, -73.9871516),
        }
    }
}

// Global singleton config - read by the binaries at startup only
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
