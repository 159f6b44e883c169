//! Runtime configuration.
//!
//! Sources are layered lowest to highest: built-in defaults, `config/default.toml`,
//! `config/{RUN_ENV}.toml`, then `APP__*` environment variables
//! (`APP__PAYMENT_GATEWAY_SECRET`, `APP__DATABASE_URL`, ...).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::{env, path::Path, time::Duration};
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";
const FALLBACK_ENVIRONMENT: &str = "development";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// `development`, `staging`, `production`, ...
    pub environment: String,

    #[validate(custom = "known_log_level")]
    pub log_level: String,
    pub log_json: bool,
    pub auto_migrate: bool,

    /// Comma-separated storefront origins. Required outside development.
    pub cors_allowed_origins: Option<String>,

    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_connect_timeout_secs: u64,
    pub db_idle_timeout_secs: u64,
    pub db_acquire_timeout_secs: u64,

    /// ISO 4217 code every order is priced in
    #[validate(custom = "iso_currency")]
    pub currency: String,
    /// Flat fee in minor units, charged when the subtotal is non-zero
    #[validate(range(min = 0))]
    pub delivery_fee_minor: i64,

    pub payment_gateway_base_url: String,
    /// Gateway secret key. Doubles as the HMAC key for push notifications.
    pub payment_gateway_secret: Option<String>,
    #[validate(range(min = 1, max = 120))]
    pub payment_gateway_timeout_secs: u64,
    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_timeout_secs: u64,

    pub max_body_size: usize,
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://storefront.db?mode=rwc".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: FALLBACK_ENVIRONMENT.to_string(),
            log_level: "info".to_string(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: 16,
            db_min_connections: 2,
            db_connect_timeout_secs: 30,
            db_idle_timeout_secs: 600,
            db_acquire_timeout_secs: 8,
            currency: "NGN".to_string(),
            // 1500.00 NGN
            delivery_fee_minor: 150_000,
            payment_gateway_base_url: "https://api.paystack.co".to_string(),
            payment_gateway_secret: None,
            payment_gateway_timeout_secs: 10,
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_timeout_secs: 30,
            max_body_size: 200 * 1024,
            event_channel_capacity: 1024,
        }
    }
}

impl AppConfig {
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            ..Self::default()
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(FALLBACK_ENVIRONMENT)
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn payment_gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_gateway_timeout_secs)
    }

    /// Parsed CORS origins; empty when none are configured
    pub fn cors_origins(&self) -> Vec<String> {
        let Some(raw) = self.cors_allowed_origins.as_deref() else {
            return Vec::new();
        };
        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect()
    }

    fn has_gateway_secret(&self) -> bool {
        self.payment_gateway_secret
            .as_deref()
            .is_some_and(|secret| !secret.trim().is_empty())
    }

    /// Deployment rules that only apply outside development.
    fn check_deployment(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.is_development() {
            return Ok(());
        }

        if !self.has_gateway_secret() {
            errors.add(
                "payment_gateway_secret",
                invalid(
                    "required",
                    "APP__PAYMENT_GATEWAY_SECRET must be set; payments cannot be verified without it",
                ),
            );
        }
        if self.cors_origins().is_empty() {
            errors.add(
                "cors_allowed_origins",
                invalid("required", "APP__CORS_ALLOWED_ORIGINS must list the storefront origins"),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("could not read configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn known_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(invalid("log_level", "expected trace, debug, info, warn or error"))
    }
}

fn iso_currency(code: &str) -> Result<(), ValidationError> {
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(invalid("currency", "expected a three-letter uppercase ISO 4217 code"))
    }
}

/// Installs the global subscriber. `RUST_LOG`, when set, overrides `level`.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(format!("storefront_api={level},tower_http=info")),
    };
    let builder = fmt().with_env_filter(filter).with_target(false);

    // a subscriber may already be installed by tests
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| FALLBACK_ENVIRONMENT.to_string());

    if !Path::new(CONFIG_DIR).is_dir() {
        warn!(dir = CONFIG_DIR, "No config directory, using defaults and APP__* variables");
    }

    let cfg: AppConfig = Config::builder()
        .set_default("environment", run_env.as_str())?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .and_then(|()| cfg.check_deployment())
        .map_err(|e| {
            error!(error = %e, "Rejected configuration");
            AppConfigError::Validation(e)
        })?;

    info!(environment = %cfg.environment, "Configuration loaded");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            8080,
            "development".to_string(),
        )
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = dev();
        assert!(cfg.validate().is_ok());
        assert!(cfg.check_deployment().is_ok());
        assert_eq!(cfg.delivery_fee_minor, 150_000);
        assert_eq!(cfg.currency, "NGN");
    }

    #[test]
    fn production_requires_gateway_secret_and_origins() {
        let mut cfg = dev();
        cfg.environment = "production".to_string();
        let errors = cfg.check_deployment().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("payment_gateway_secret"));
        assert!(fields.contains_key("cors_allowed_origins"));

        cfg.payment_gateway_secret = Some("sk_live_abc".to_string());
        cfg.cors_allowed_origins = Some("https://shop.example.com".to_string());
        assert!(cfg.check_deployment().is_ok());
    }

    #[test]
    fn rejects_malformed_currency_and_log_level() {
        let mut cfg = dev();
        cfg.currency = "naira".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = dev();
        cfg.log_level = "loud".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cors_origins_are_trimmed() {
        let mut cfg = dev();
        cfg.cors_allowed_origins = Some(" http://a.test , ,http://b.test".to_string());
        assert_eq!(cfg.cors_origins(), vec!["http://a.test", "http://b.test"]);
    }
}
