use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::decision::rules::RulesConfig;
use crate::decision::scorecard::DEFAULT_MAX_REASON_CODES;

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

    pub const fn label(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

/// Top-level configuration for the engine service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig::from_env()?,
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

/// Engine-wide decisioning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Rule-evaluator approval gate when a strategy does not set its own.
    pub auto_approve_score: f64,
    /// Seeds every champion/challenger draw (mixed with the application id) when set.
    pub router_seed: Option<u64>,
    pub max_reason_codes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_approve_score: RulesConfig::default().auto_approve_score,
            router_seed: None,
            max_reason_codes: DEFAULT_MAX_REASON_CODES,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let auto_approve_score = match env::var("CREDIT_AUTO_APPROVE_SCORE") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|score| score.is_finite())
                .ok_or(ConfigError::InvalidApproveScore(raw))?,
            Err(_) => defaults.auto_approve_score,
        };

        let router_seed = match env::var("CREDIT_ROUTER_SEED") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidRouterSeed(raw))?,
            ),
            Err(_) => None,
        };

        let max_reason_codes = match env::var("CREDIT_MAX_REASON_CODES") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| (1..=10).contains(limit))
                .ok_or(ConfigError::InvalidReasonCodeLimit(raw))?,
            Err(_) => defaults.max_reason_codes,
        };

        Ok(Self {
            auto_approve_score,
            router_seed,
            max_reason_codes,
        })
    }

    pub fn rules_config(&self) -> RulesConfig {
        RulesConfig {
            auto_approve_score: self.auto_approve_score,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidApproveScore(String),
    InvalidRouterSeed(String),
    InvalidReasonCodeLimit(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidApproveScore(raw) => {
                write!(f, "CREDIT_AUTO_APPROVE_SCORE must be a number, got '{raw}'")
            }
            ConfigError::InvalidRouterSeed(raw) => {
                write!(f, "CREDIT_ROUTER_SEED must be a valid u64, got '{raw}'")
            }
            ConfigError::InvalidReasonCodeLimit(raw) => {
                write!(f, "CREDIT_MAX_REASON_CODES must be between 1 and 10, got '{raw}'")
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
            "CREDIT_AUTO_APPROVE_SCORE",
            "CREDIT_ROUTER_SEED",
            "CREDIT_MAX_REASON_CODES",
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
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn engine_settings_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CREDIT_AUTO_APPROVE_SCORE", "680");
        env::set_var("CREDIT_ROUTER_SEED", "2024");
        env::set_var("CREDIT_MAX_REASON_CODES", "3");
        let engine = EngineConfig::from_env().expect("engine config loads");
        assert_eq!(engine.auto_approve_score, 680.0);
        assert_eq!(engine.router_seed, Some(2024));
        assert_eq!(engine.max_reason_codes, 3);
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_reason_code_limit() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CREDIT_MAX_REASON_CODES", "25");
        let err = EngineConfig::from_env().expect_err("limit rejected");
        assert!(matches!(err, ConfigError::InvalidReasonCodeLimit(_)));
        reset_env();
    }
}
