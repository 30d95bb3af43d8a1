use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

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

pub const DEFAULT_HSM_OTP_BASE_URL: &str = "http://210.212.188.44:8001/jrequest/";
pub const DEFAULT_HSM_SIGN_BASE_URL: &str = "http://210.212.188.35:8080/emSigner/";
pub const SANDBOX_CHECKOUT_URL: &str = "https://sandbox.pmc.local/checkout";
pub const DEVELOPMENT_CALLBACK_SECRET: &str = "pmcrms-development-callback-secret";

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub hsm: HsmConfig,
    pub mail: MailConfig,
    pub payment: PaymentConfig,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
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

        let timeout_secs = parse_number("HSM_TIMEOUT_SECS", 30)?;
        let hsm = HsmConfig {
            otp_base_url: env::var("HSM_OTP_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_HSM_OTP_BASE_URL.to_string()),
            sign_base_url: env::var("HSM_SIGN_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_HSM_SIGN_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };

        let mail = MailConfig {
            from_address: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@pmcrms.local".to_string()),
            portal_url: env::var("PORTAL_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        };

        let payment = PaymentConfig {
            fee: parse_number("PAYMENT_FEE", 3000)?,
            checkout_url: setting(environment, "PAYMENT_CHECKOUT_URL", SANDBOX_CHECKOUT_URL)?,
            callback_secret: setting(
                environment,
                "PAYMENT_CALLBACK_SECRET",
                DEVELOPMENT_CALLBACK_SECRET,
            )?,
        };

        let bootstrap_admin = non_blank("BOOTSTRAP_ADMIN_EMAIL");
        if environment == AppEnvironment::Production && bootstrap_admin.is_none() {
            return Err(ConfigError::Required {
                variable: "BOOTSTRAP_ADMIN_EMAIL",
            });
        }

        let storage = StorageConfig {
            media_root: PathBuf::from(
                env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string()),
            ),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            hsm,
            mail,
            payment,
            storage,
            identity: IdentityConfig { bootstrap_admin },
        })
    }
}

fn non_blank(variable: &'static str) -> Option<String> {
    env::var(variable)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Production deployments must set `variable`; other environments fall back to `default`.
fn setting(
    environment: AppEnvironment,
    variable: &'static str,
    default: &str,
) -> Result<String, ConfigError> {
    match non_blank(variable) {
        Some(value) => Ok(value),
        None if environment == AppEnvironment::Production => {
            Err(ConfigError::Required { variable })
        }
        None => Ok(default.to_string()),
    }
}

fn parse_number(variable: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(variable) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { variable }),
        Err(_) => Ok(default),
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

/// Endpoints of the signing HSM.
#[derive(Debug, Clone)]
pub struct HsmConfig {
    pub otp_base_url: String,
    pub sign_base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from_address: String,
    pub portal_url: String,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Licence fee in whole rupees.
    pub fee: u64,
    pub checkout_url: String,
    /// Shared with the gateway to checksum its callbacks.
    pub callback_secret: String,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Admin account registered at start-up when staff are not seeded.
    pub bootstrap_admin: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub media_root: PathBuf,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
    Required { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a non-negative integer")
            }
            ConfigError::Required { variable } => {
                write!(f, "{variable} must be set in production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::Required { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
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
        for variable in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "HSM_OTP_BASE_URL",
            "HSM_SIGN_BASE_URL",
            "HSM_TIMEOUT_SECS",
            "MAIL_FROM",
            "PORTAL_URL",
            "PAYMENT_FEE",
            "PAYMENT_CHECKOUT_URL",
            "PAYMENT_CALLBACK_SECRET",
            "BOOTSTRAP_ADMIN_EMAIL",
            "MEDIA_ROOT",
        ] {
            env::remove_var(variable);
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
        assert_eq!(config.hsm.otp_base_url, DEFAULT_HSM_OTP_BASE_URL);
        assert_eq!(config.hsm.timeout, Duration::from_secs(30));
        assert_eq!(config.payment.fee, 3000);
        assert_eq!(config.storage.media_root, PathBuf::from("./media"));
        assert_eq!(config.payment.checkout_url, SANDBOX_CHECKOUT_URL);
        assert_eq!(config.payment.callback_secret, DEVELOPMENT_CALLBACK_SECRET);
        assert_eq!(config.identity.bootstrap_admin, None);
    }

    #[test]
    fn production_refuses_development_fallbacks() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        env::set_var("PAYMENT_CHECKOUT_URL", "https://secure.gateway.in/transaction");
        match AppConfig::load() {
            Err(ConfigError::Required { variable }) => {
                assert_eq!(variable, "PAYMENT_CALLBACK_SECRET")
            }
            other => panic!("expected a missing secret, got {other:?}"),
        }

        env::set_var("PAYMENT_CALLBACK_SECRET", "live-working-key");
        match AppConfig::load() {
            Err(ConfigError::Required { variable }) => {
                assert_eq!(variable, "BOOTSTRAP_ADMIN_EMAIL")
            }
            other => panic!("expected a missing admin, got {other:?}"),
        }

        env::set_var("BOOTSTRAP_ADMIN_EMAIL", "admin@pmc.gov.in");
        let config = AppConfig::load().expect("production config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.payment.callback_secret, "live-working-key");
        assert_eq!(
            config.identity.bootstrap_admin.as_deref(),
            Some("admin@pmc.gov.in")
        );
        reset_env();
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
    fn rejects_non_numeric_fee() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PAYMENT_FEE", "three thousand");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { variable }) => assert_eq!(variable, "PAYMENT_FEE"),
            other => panic!("expected invalid number, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn hsm_endpoints_follow_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("HSM_SIGN_BASE_URL", "http://signer.test/emSigner/");
        env::set_var("HSM_TIMEOUT_SECS", "5");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.hsm.sign_base_url, "http://signer.test/emSigner/");
        assert_eq!(config.hsm.timeout, Duration::from_secs(5));
        reset_env();
    }
}
