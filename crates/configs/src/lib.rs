//! # configs
//!
//! Process settings for EduTrack. [`Settings::load`] reads `.env` (if any)
//! into the environment, then maps the environment onto [`Settings`] through
//! the `config` crate. Secrets stay wrapped in [`SecretString`] until the
//! adapter that needs them calls `expose_secret()`.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Used only outside production when `JWT_SECRET` is unset.
const DEV_JWT_SECRET: &str = "edutrack-development-secret-change-me";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("JWT_SECRET must be set in production")]
    MissingJwtSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Test => "test",
            AppEnv::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub window: Duration,
    /// Requests per window on `/api/*`.
    pub general: u32,
    /// Requests per window on `/api/auth/*`.
    pub auth: u32,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_env: AppEnv,
    pub host: String,
    pub port: u16,
    pub database_url: Option<SecretString>,
    pub database_max_connections: u32,
    pub jwt_secret: SecretString,
    pub recaptcha_secret_key: Option<SecretString>,
    pub frontend_url: String,
    pub redis_url: Option<String>,
    pub rate_limit: RateLimitSettings,
    pub notification_sweep: Duration,
    pub log_format: LogFormat,
}

/// The environment exactly as `config` sees it: flat, lowercase keys.
#[derive(Debug, Deserialize)]
struct RawSettings {
    app_env: AppEnv,
    host: String,
    port: u16,
    database_url: Option<String>,
    database_max_connections: u32,
    jwt_secret: Option<String>,
    recaptcha_secret_key: Option<String>,
    frontend_url: String,
    redis_url: Option<String>,
    rate_limit_window_secs: u64,
    rate_limit_general: u32,
    rate_limit_auth: u32,
    notification_sweep_secs: u64,
    log_format: LogFormat,
}

impl Settings {
    /// Loads `.env` then the process environment.
    pub fn load() -> Result<Self, SettingsError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();
        Self::from_env(None)
    }

    /// Builds settings from `vars` instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, SettingsError> {
        Self::from_env(Some(vars))
    }

    fn from_env(vars: Option<HashMap<String, String>>) -> Result<Self, SettingsError> {
        let raw: RawSettings = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 5000)?
            .set_default("database_max_connections", 10)?
            .set_default("frontend_url", "http://localhost:3000")?
            .set_default("rate_limit_window_secs", 900)?
            .set_default("rate_limit_general", 100)?
            .set_default("rate_limit_auth", 5)?
            .set_default("notification_sweep_secs", 300)?
            .set_default("log_format", "pretty")?
            .add_source(config::Environment::default().source(vars))
            .build()?
            .try_deserialize()?;
        raw.finish()
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }

    /// True when `JWT_SECRET` was unset and the development secret is in use.
    pub fn uses_development_jwt_secret(&self) -> bool {
        self.jwt_secret.expose_secret() == DEV_JWT_SECRET
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawSettings {
    fn finish(self) -> Result<Settings, SettingsError> {
        let jwt_secret = match non_empty(self.jwt_secret) {
            Some(secret) => SecretString::from(secret),
            None if self.app_env == AppEnv::Production => {
                return Err(SettingsError::MissingJwtSecret)
            }
            None => SecretString::from(DEV_JWT_SECRET),
        };

        Ok(Settings {
            app_env: self.app_env,
            host: self.host,
            port: self.port,
            database_url: non_empty(self.database_url).map(SecretString::from),
            database_max_connections: self.database_max_connections.max(1),
            jwt_secret,
            recaptcha_secret_key: non_empty(self.recaptcha_secret_key).map(SecretString::from),
            frontend_url: self.frontend_url.trim_end_matches('/').to_string(),
            redis_url: non_empty(self.redis_url),
            rate_limit: RateLimitSettings {
                window: Duration::from_secs(self.rate_limit_window_secs.max(1)),
                general: self.rate_limit_general,
                auth: self.rate_limit_auth,
            },
            notification_sweep: Duration::from_secs(self.notification_sweep_secs.max(1)),
            log_format: self.log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_in_development() {
        let s = Settings::from_vars(vars(&[])).unwrap();
        assert_eq!(s.app_env, AppEnv::Development);
        assert_eq!(s.bind_addr(), "0.0.0.0:5000");
        assert_eq!(s.rate_limit.general, 100);
        assert_eq!(s.rate_limit.auth, 5);
        assert_eq!(s.rate_limit.window, Duration::from_secs(900));
        assert_eq!(s.frontend_url, "http://localhost:3000");
        assert_eq!(s.log_format, LogFormat::Pretty);
        assert!(s.database_url.is_none());
        assert!(s.uses_development_jwt_secret());
    }

    #[test]
    fn production_requires_jwt_secret() {
        let err = Settings::from_vars(vars(&[("APP_ENV", "production")])).unwrap_err();
        assert!(matches!(err, SettingsError::MissingJwtSecret));

        let ok = Settings::from_vars(vars(&[
            ("APP_ENV", "production"),
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("RATE_LIMIT_AUTH", "10"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert!(ok.is_production());
        assert_eq!(ok.port, 8080);
        assert_eq!(ok.rate_limit.auth, 10);
        assert_eq!(ok.log_format, LogFormat::Json);
        assert_eq!(ok.jwt_secret.expose_secret(), "s3cret");
        assert!(!ok.uses_development_jwt_secret());
    }

    #[test]
    fn blank_optional_values_count_as_unset() {
        let s = Settings::from_vars(vars(&[("REDIS_URL", ""), ("DATABASE_URL", "  ")])).unwrap();
        assert!(s.redis_url.is_none());
        assert!(s.database_url.is_none());
    }
}
