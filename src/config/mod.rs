use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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
    pub loan: LoanSettings,
    pub screening: ScreeningSettings,
    pub directory: DirectorySettings,
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

        let loan = LoanSettings {
            multiplier: parse_env_f64("LOAN_MULTIPLIER", 5.0)?,
            term_years: parse_env_f64("LOAN_TERM_YEARS", 12.0)?,
            max_loan_amount: parse_env_f64("LOAN_MAX_AMOUNT", 1_000_000.0)?,
        };

        let simulation_match_probability =
            parse_env_f64("SCREENING_SIMULATION_PROBABILITY", 0.05)?;
        if !(0.0..=1.0).contains(&simulation_match_probability) {
            return Err(ConfigError::ProbabilityOutOfRange {
                key: "SCREENING_SIMULATION_PROBABILITY",
            });
        }

        let screening = ScreeningSettings {
            cache_ttl_secs: parse_env_u64("SCREENING_CACHE_TTL_SECS", 3600)?,
            simulation_match_probability,
            extra_denylist: env::var("SCREENING_DENYLIST")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|entry| !entry.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };

        let directory = DirectorySettings {
            users_file: env::var("USERS_FILE").ok().map(PathBuf::from),
            loans_file: env::var("LOANS_FILE").ok().map(PathBuf::from),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            loan,
            screening,
            directory,
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

/// Eligibility formula parameters and the configured amount ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanSettings {
    pub multiplier: f64,
    pub term_years: f64,
    pub max_loan_amount: f64,
}

/// Sanctions screening knobs.
///
/// `extra_denylist` entries are appended to the built-in simulation list; a
/// `simulation_match_probability` of zero disables the synthetic manual-review
/// path entirely (the mode a real sanctions feed should run in).
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningSettings {
    pub cache_ttl_secs: u64,
    pub simulation_match_probability: f64,
    pub extra_denylist: Vec<String>,
}

/// Optional CSV file backing for the user directory; when unset the service
/// falls back to the bundled sample records.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectorySettings {
    pub users_file: Option<PathBuf>,
    pub loans_file: Option<PathBuf>,
}

fn parse_env_f64(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    ProbabilityOutOfRange { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a valid number")
            }
            ConfigError::ProbabilityOutOfRange { key } => {
                write!(f, "{key} must lie within 0.0..=1.0")
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
