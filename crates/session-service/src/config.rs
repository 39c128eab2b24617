//! Session service configuration.
//!
//! Configuration is loaded from environment variables. Secrets are held as
//! `SecretString` and the database URL is redacted in Debug output.

use common::secret::{is_blank, ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "nb_auth";

/// Google's ID token introspection endpoint.
pub const DEFAULT_GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Browser origins allowed by default (local frontend dev servers).
pub const DEFAULT_CORS_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Values shipped in sample configs that mean "not configured".
const PLACEHOLDER_GATEWAY_SECRETS: &[&str] = &["xxxxx", "changeme"];

/// `SameSite` attribute of the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

/// Attributes applied to the session cookie on every `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    /// Cookie name (default: `nb_auth`).
    pub name: String,

    /// Add the `Secure` attribute (required when `same_site` is `None`).
    pub secure: bool,

    /// `SameSite` attribute (default: `Lax`).
    pub same_site: SameSite,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            secure: false,
            same_site: SameSite::Lax,
        }
    }
}

/// Session service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Shared HMAC secret for session tokens.
    pub jwt_secret: SecretString,

    /// OAuth client id that Google ID tokens must be issued for.
    pub google_client_id: String,

    /// Google tokeninfo endpoint (overridable for tests).
    pub google_tokeninfo_url: String,

    /// Session cookie attributes.
    pub cookie: CookieSettings,

    /// Origins allowed to make credentialed cross-origin requests.
    pub cors_allowed_origins: Vec<String>,

    /// Payment gateway key secret. `None` disables payment verification.
    pub payment_key_secret: Option<SecretString>,

    /// Seconds to wait for in-flight requests after a shutdown signal.
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"[REDACTED]")
            .field("google_client_id", &self.google_client_id)
            .field("google_tokeninfo_url", &self.google_tokeninfo_url)
            .field("cookie", &self.cookie)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field(
                "payment_key_secret",
                &self.payment_key_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing JWT_SECRET: session signing key is not configured")]
    MissingSigningKey,

    #[error("Invalid cookie configuration: {0}")]
    InvalidCookieConfig(String),

    #[error("Invalid CORS configuration: {0}")]
    InvalidCorsConfig(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainSeconds(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwt_secret = vars
            .get("JWT_SECRET")
            .map(|s| SecretString::from(s.clone()))
            .filter(|s| !is_blank(s))
            .ok_or(ConfigError::MissingSigningKey)?;

        let google_client_id = vars
            .get("GOOGLE_CLIENT_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("GOOGLE_CLIENT_ID".to_string()))?;

        let google_tokeninfo_url = vars
            .get("GOOGLE_TOKENINFO_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GOOGLE_TOKENINFO_URL.to_string());

        let cookie = parse_cookie_settings(vars)?;

        let cors_allowed_origins = parse_origins(
            vars.get("CORS_ALLOWED_ORIGINS")
                .map_or(DEFAULT_CORS_ALLOWED_ORIGINS, String::as_str),
        )?;

        let payment_key_secret = vars
            .get("RAZORPAY_KEY_SECRET")
            .map(|s| SecretString::from(s.clone()))
            .filter(|s| {
                let value = s.expose_secret().trim();
                !value.is_empty() && !PLACEHOLDER_GATEWAY_SECRETS.contains(&value)
            });

        let drain_seconds = if let Some(value_str) = vars.get("DRAIN_SECONDS") {
            value_str.parse::<u64>().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "DRAIN_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            0
        };

        Ok(Config {
            database_url,
            bind_address,
            jwt_secret,
            google_client_id,
            google_tokeninfo_url,
            cookie,
            cors_allowed_origins,
            payment_key_secret,
            drain_seconds,
        })
    }
}

fn parse_cookie_settings(vars: &HashMap<String, String>) -> Result<CookieSettings, ConfigError> {
    let name = vars
        .get("SESSION_COOKIE_NAME")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());

    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::InvalidCookieConfig(format!(
            "SESSION_COOKIE_NAME must be a non-empty token of [A-Za-z0-9_-], got '{}'",
            name
        )));
    }

    let secure = match vars.get("SESSION_COOKIE_SECURE") {
        None => false,
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                return Err(ConfigError::InvalidCookieConfig(format!(
                    "SESSION_COOKIE_SECURE must be true or false, got '{}'",
                    value
                )))
            }
        },
    };

    let same_site = match vars.get("SESSION_COOKIE_SAME_SITE") {
        None => SameSite::Lax,
        Some(value) => SameSite::parse(value).ok_or_else(|| {
            ConfigError::InvalidCookieConfig(format!(
                "SESSION_COOKIE_SAME_SITE must be Strict, Lax or None, got '{}'",
                value
            ))
        })?,
    };

    // Browsers drop SameSite=None cookies that are not Secure.
    if same_site == SameSite::None && !secure {
        return Err(ConfigError::InvalidCookieConfig(
            "SESSION_COOKIE_SAME_SITE=None requires SESSION_COOKIE_SECURE=true".to_string(),
        ));
    }

    Ok(CookieSettings {
        name,
        secure,
        same_site,
    })
}

fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();

    if let Some(bad) = origins
        .iter()
        .find(|o| *o == "*" || !(o.starts_with("http://") || o.starts_with("https://")))
    {
        return Err(ConfigError::InvalidCorsConfig(format!(
            "CORS_ALLOWED_ORIGINS entries must be explicit http(s) origins, got '{}'",
            bad
        )));
    }

    Ok(origins)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://localhost/test".to_string(),
            ),
            (
                "JWT_SECRET".to_string(),
                "test-secret-at-least-32-bytes-long!!".to_string(),
            ),
            (
                "GOOGLE_CLIENT_ID".to_string(),
                "client-123.apps.googleusercontent.com".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.database_url, "postgresql://localhost/test");
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.google_tokeninfo_url, DEFAULT_GOOGLE_TOKENINFO_URL);
        assert_eq!(config.cookie, CookieSettings::default());
        assert_eq!(
            config.cors_allowed_origins,
            vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string()
            ]
        );
        assert!(config.payment_key_secret.is_none());
        assert_eq!(config.drain_seconds, 0);
    }

    #[test]
    fn test_from_vars_missing_database_url() {
        let mut vars = base_vars();
        vars.remove("DATABASE_URL");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_from_vars_missing_jwt_secret() {
        let mut vars = base_vars();
        vars.remove("JWT_SECRET");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingSigningKey)));
    }

    #[test]
    fn test_from_vars_blank_jwt_secret() {
        let mut vars = base_vars();
        vars.insert("JWT_SECRET".to_string(), "   ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingSigningKey)));
    }

    #[test]
    fn test_from_vars_blank_google_client_id() {
        let mut vars = base_vars();
        vars.insert("GOOGLE_CLIENT_ID".to_string(), "".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "GOOGLE_CLIENT_ID"));
    }

    #[test]
    fn test_cookie_settings_custom() {
        let mut vars = base_vars();
        vars.insert("SESSION_COOKIE_NAME".to_string(), "sid".to_string());
        vars.insert("SESSION_COOKIE_SECURE".to_string(), "true".to_string());
        vars.insert("SESSION_COOKIE_SAME_SITE".to_string(), "strict".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.cookie.name, "sid");
        assert!(config.cookie.secure);
        assert_eq!(config.cookie.same_site, SameSite::Strict);
    }

    #[test]
    fn test_same_site_none_requires_secure() {
        let mut vars = base_vars();
        vars.insert("SESSION_COOKIE_SAME_SITE".to_string(), "None".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidCookieConfig(msg)) if msg.contains("requires"))
        );

        vars.insert("SESSION_COOKIE_SECURE".to_string(), "true".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.cookie.same_site, SameSite::None);
    }

    #[test]
    fn test_invalid_cookie_values() {
        let mut vars = base_vars();
        vars.insert("SESSION_COOKIE_SECURE".to_string(), "maybe".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidCookieConfig(_))
        ));

        let mut vars = base_vars();
        vars.insert("SESSION_COOKIE_NAME".to_string(), "bad name;".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidCookieConfig(_))
        ));

        let mut vars = base_vars();
        vars.insert("SESSION_COOKIE_SAME_SITE".to_string(), "sometimes".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidCookieConfig(_))
        ));
    }

    #[test]
    fn test_cors_origins_parsing() {
        let mut vars = base_vars();
        vars.insert(
            "CORS_ALLOWED_ORIGINS".to_string(),
            " https://app.nutrebirth.com , ,http://localhost:3000".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            vec![
                "https://app.nutrebirth.com".to_string(),
                "http://localhost:3000".to_string()
            ]
        );
    }

    #[test]
    fn test_cors_wildcard_rejected() {
        let mut vars = base_vars();
        vars.insert("CORS_ALLOWED_ORIGINS".to_string(), "*".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidCorsConfig(_))
        ));
    }

    #[test]
    fn test_payment_secret_placeholders_are_unset() {
        for placeholder in ["", "  ", "xxxxx", "changeme"] {
            let mut vars = base_vars();
            vars.insert("RAZORPAY_KEY_SECRET".to_string(), placeholder.to_string());
            let config = Config::from_vars(&vars).unwrap();
            assert!(
                config.payment_key_secret.is_none(),
                "{placeholder:?} should count as unconfigured"
            );
        }

        let mut vars = base_vars();
        vars.insert("RAZORPAY_KEY_SECRET".to_string(), "live-secret".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(
            config.payment_key_secret.unwrap().expose_secret(),
            "live-secret"
        );
    }

    #[test]
    fn test_drain_seconds() {
        let mut vars = base_vars();
        vars.insert("DRAIN_SECONDS".to_string(), "15".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().drain_seconds, 15);

        vars.insert("DRAIN_SECONDS".to_string(), "-1".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidDrainSeconds(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = base_vars();
        vars.insert("RAZORPAY_KEY_SECRET".to_string(), "live-secret".to_string());
        let config = Config::from_vars(&vars).unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("test-secret-at-least-32-bytes-long!!"));
        assert!(!debug.contains("live-secret"));
        assert!(!debug.contains("postgresql://localhost/test"));
        assert!(debug.contains("client-123.apps.googleusercontent.com"));
    }
}
