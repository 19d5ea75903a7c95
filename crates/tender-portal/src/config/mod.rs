use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::procurement::evaluation::StatusPolicy;

const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";
const DEFAULT_EMAIL_FROM: &str = "Procurement Portal <notifications@tenders.example.gov>";

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

    /// Error responses carry their source chain everywhere except production.
    pub fn exposes_error_detail(self) -> bool {
        !matches!(self, Self::Production)
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub email: EmailConfig,
    pub auth: AuthConfig,
    pub evaluation: EvaluationSettings,
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

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "memory://".to_string());
        let backend = StoreBackend::from_url(&database_url)?;
        let document_dir = env::var("DOCUMENT_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let email = EmailConfig {
            api_key: non_empty_var("EMAIL_API_KEY"),
            api_url: env::var("EMAIL_API_URL").unwrap_or_else(|_| DEFAULT_EMAIL_API_URL.to_string()),
            from_address: env::var("EMAIL_FROM").unwrap_or_else(|_| DEFAULT_EMAIL_FROM.to_string()),
        };

        let status_policy = match non_empty_var("EVALUATION_STATUS_POLICY") {
            Some(raw) => {
                StatusPolicy::parse(&raw).ok_or(ConfigError::InvalidStatusPolicy { value: raw })?
            }
            None => StatusPolicy::default(),
        };
        let reconcile_secs = env::var("RECONCILE_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidReconcileInterval)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: matches!(environment, AppEnvironment::Development),
            },
            storage: StorageConfig {
                database_url,
                backend,
                document_dir,
            },
            email,
            auth: AuthConfig {
                session_secret: non_empty_var("SESSION_SECRET"),
            },
            evaluation: EvaluationSettings {
                status_policy,
                reconcile_interval: Duration::from_secs(reconcile_secs),
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
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
    pub ansi: bool,
}

/// Backends the bundled binary knows how to construct from `DATABASE_URL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
}

impl StoreBackend {
    fn from_url(url: &str) -> Result<Self, ConfigError> {
        let scheme = url.split_once("://").map(|(scheme, _)| scheme).unwrap_or(url);
        match scheme.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            _ => Err(ConfigError::UnsupportedDatabase {
                scheme: scheme.to_string(),
            }),
        }
    }
}

/// Persistent store and uploaded document locations.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    pub backend: StoreBackend,
    pub document_dir: PathBuf,
}

/// Outbound email provider settings. Without an API key messages are only logged.
#[derive(Clone)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub from_address: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Secrets owned by the session issuer; carried here so one `.env` configures the deployment.
#[derive(Clone)]
pub struct AuthConfig {
    pub session_secret: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "session_secret",
                &self.session_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationSettings {
    pub status_policy: StatusPolicy,
    pub reconcile_interval: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    UnsupportedDatabase { scheme: String },
    InvalidStatusPolicy { value: String },
    InvalidReconcileInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::UnsupportedDatabase { scheme } => write!(
                f,
                "DATABASE_URL scheme '{scheme}' is not supported (expected memory://)"
            ),
            ConfigError::InvalidStatusPolicy { value } => write!(
                f,
                "EVALUATION_STATUS_POLICY '{value}' must be 'permissive' or 'monotonic'"
            ),
            ConfigError::InvalidReconcileInterval => {
                write!(f, "RECONCILE_INTERVAL_SECS must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::UnsupportedDatabase { .. }
            | ConfigError::InvalidStatusPolicy { .. }
            | ConfigError::InvalidReconcileInterval => None,
        }
    }
}
