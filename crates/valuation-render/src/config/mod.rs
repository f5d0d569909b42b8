use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

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
    pub backend: BackendConfig,
    pub export: ExportConfig,
    pub maps: MapsConfig,
    pub views: ViewConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        let fallback_not_found = parse_flag("APP_FALLBACK_NOT_FOUND", false)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");
        let log_format = LogFormat::from_str(&var_or("APP_LOG_FORMAT", "compact"))
            .ok_or(ConfigError::InvalidLogFormat)?;

        let backend = BackendConfig {
            api_url: parse_url("API_URL", "http://localhost:3000/api")?,
            api_key: var_or("BACKEND_API_KEY", "xxx"),
            timeout: parse_seconds("BACKEND_TIMEOUT_SECS", 10)?,
        };

        let export = ExportConfig {
            pdf_app_url: parse_url("PDF_APP_URL", "http://localhost:4000")?,
            timeout: parse_seconds("EXPORT_TIMEOUT_SECS", 60)?,
            chrome_executable: optional_var("CHROME_EXECUTABLE").map(PathBuf::from),
        };

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                fallback_not_found,
            },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            backend,
            export,
            maps: MapsConfig {
                api_key: optional_var("MAPS_API_KEY"),
            },
            views: ViewConfig {
                template_path: optional_var("VIEW_TEMPLATE_PATH").map(PathBuf::from),
            },
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_url(key: &'static str, default: &str) -> Result<Url, ConfigError> {
    Url::parse(var_or(key, default).trim())
        .map_err(|source| ConfigError::InvalidUrl { key, source })
}

/// Longest accepted timeout: one day.
const MAX_TIMEOUT_SECS: u64 = 86_400;

fn parse_seconds(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match optional_var(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| (1..=MAX_TIMEOUT_SECS).contains(secs))
            .map(Duration::from_secs)
            .ok_or(ConfigError::InvalidDuration { key }),
    }
}

fn parse_flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match optional_var(key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key }),
        },
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Answer unmatched routes with 404 instead of an empty 200.
    pub fallback_not_found: bool,
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
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Backend data API location and service credential.
#[derive(Clone)]
pub struct BackendConfig {
    pub api_url: Url,
    pub api_key: String,
    pub timeout: Duration,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Where the rendering application lives and how long a browser may work on it.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub pdf_app_url: Url,
    pub timeout: Duration,
    pub chrome_executable: Option<PathBuf>,
}

#[derive(Clone, Default)]
pub struct MapsConfig {
    pub api_key: Option<String>,
}

impl fmt::Debug for MapsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewConfig {
    pub template_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidLogFormat,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
    InvalidDuration {
        key: &'static str,
    },
    InvalidFlag {
        key: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidLogFormat => write!(f, "APP_LOG_FORMAT must be compact or json"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidUrl { key, .. } => write!(f, "{key} must be an absolute URL"),
            ConfigError::InvalidDuration { key } => {
                write!(f, "{key} must be between 1 and {MAX_TIMEOUT_SECS} seconds")
            }
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidUrl { source, .. } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLogFormat
            | ConfigError::InvalidDuration { .. }
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "APP_FALLBACK_NOT_FOUND",
            "API_URL",
            "BACKEND_API_KEY",
            "BACKEND_TIMEOUT_SECS",
            "PDF_APP_URL",
            "EXPORT_TIMEOUT_SECS",
            "CHROME_EXECUTABLE",
            "MAPS_API_KEY",
            "VIEW_TEMPLATE_PATH",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(!config.server.fallback_not_found);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.backend.api_url.as_str(), "http://localhost:3000/api");
        assert_eq!(config.backend.api_key, "xxx");
        assert_eq!(config.backend.timeout, Duration::from_secs(10));
        assert_eq!(config.export.pdf_app_url.as_str(), "http://localhost:4000/");
        assert_eq!(config.export.timeout, Duration::from_secs(60));
        assert!(config.maps.api_key.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_malformed_backend_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("API_URL", "not a url");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidUrl { key: "API_URL", .. })
        ));

        reset_env();
        env::set_var("BACKEND_TIMEOUT_SECS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidDuration {
                key: "BACKEND_TIMEOUT_SECS"
            })
        ));

        reset_env();
        env::set_var("EXPORT_TIMEOUT_SECS", "18446744073709551615");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidDuration {
                key: "EXPORT_TIMEOUT_SECS"
            })
        ));

        reset_env();
        env::set_var("EXPORT_TIMEOUT_SECS", "86400");
        let config = AppConfig::load().expect("one day is accepted");
        assert_eq!(config.export.timeout, Duration::from_secs(86_400));

        reset_env();
        env::set_var("APP_FALLBACK_NOT_FOUND", "sometimes");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidFlag { .. })
        ));
        reset_env();
    }

    #[test]
    fn debug_output_hides_credentials() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("BACKEND_API_KEY", "super-secret");
        env::set_var("MAPS_API_KEY", "maps-secret");
        let config = AppConfig::load().expect("config loads");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("maps-secret"));
        reset_env();
    }
}
