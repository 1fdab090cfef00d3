use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub notify: NotifyConfig,
    pub dnb: DnbConfig,
    pub magic_link: MagicLinkConfig,
    pub grant: GrantConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let notify_enabled = env::var("NOTIFY_ENABLED")
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let notify_api_key = env::var("NOTIFY_API_KEY").ok();

        let dnb_service_url = env::var("DNB_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8001/api".to_string());
        let dnb_service_token = env::var("DNB_SERVICE_TOKEN").ok();

        let secret_key = env::var("FRONTEND_SECRET_KEY")
            .unwrap_or_else(|_| "insecure-development-secret".to_string());
        let magic_link_ttl_seconds = env::var("MAGIC_LINK_HASH_TTL")
            .unwrap_or_else(|_| "86400".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTtl)?;
        let frontend_base_url = env::var("FRONTEND_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let min_grant_value = env::var("MIN_GRANT_VALUE")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidGrantBound)?;
        let max_grant_value = env::var("MAX_GRANT_VALUE")
            .unwrap_or_else(|_| "2500".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidGrantBound)?;
        if min_grant_value > max_grant_value {
            return Err(ConfigError::InvertedGrantBounds {
                min: min_grant_value,
                max: max_grant_value,
            });
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            notify: NotifyConfig {
                enabled: notify_enabled,
                api_key: notify_api_key,
            },
            dnb: DnbConfig {
                service_url: dnb_service_url,
                service_token: dnb_service_token,
            },
            magic_link: MagicLinkConfig {
                secret_key,
                ttl_seconds: magic_link_ttl_seconds,
                frontend_base_url,
            },
            grant: GrantConfig {
                min_grant_value,
                max_grant_value,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Email provider controls: disabled deployments render previews to the log.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
}

/// Upstream company-data provider endpoint and credentials.
#[derive(Debug, Clone)]
pub struct DnbConfig {
    pub service_url: String,
    pub service_token: Option<String>,
}

/// Shared secret and lifetime backing signed magic-links.
#[derive(Debug, Clone)]
pub struct MagicLinkConfig {
    pub secret_key: String,
    pub ttl_seconds: u64,
    pub frontend_base_url: String,
}

/// Program-level grant bounds surfaced to applicants.
#[derive(Debug, Clone)]
pub struct GrantConfig {
    pub min_grant_value: u32,
    pub max_grant_value: u32,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTtl,
    InvalidGrantBound,
    InvertedGrantBounds { min: u32, max: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTtl => {
                write!(f, "MAGIC_LINK_HASH_TTL must be a whole number of seconds")
            }
            ConfigError::InvalidGrantBound => {
                write!(f, "MIN_GRANT_VALUE and MAX_GRANT_VALUE must be whole pounds")
            }
            ConfigError::InvertedGrantBounds { min, max } => {
                write!(f, "MIN_GRANT_VALUE ({min}) may not exceed MAX_GRANT_VALUE ({max})")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
