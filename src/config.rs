//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default platform API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.twitter.com";

/// Default OAuth2 authorization page.
pub const DEFAULT_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OAuth2 client id of the platform app.
    pub client_id: String,
    /// OAuth2 client secret (confidential clients only).
    pub client_secret: Option<SecretString>,
    /// Redirect URI registered with the platform.
    pub callback_url: String,
    /// HMAC key used to sign session tokens.
    pub jwt_key: SecretString,
    /// HTTP listen port.
    pub port: u16,
    /// Platform API base URL.
    pub api_base_url: String,
    /// OAuth2 authorization page.
    pub authorize_url: String,
    /// Lifetime of an issued session token.
    pub session_timeout: Duration,
    /// How long after first login a token may still be refreshed.
    pub max_refresh: Duration,
    /// Per-request timeout for platform calls.
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Build configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = required("CLIENT_ID")?;
        let callback_url = required("CALLBACK_URL")?;
        let jwt_key = SecretString::from(required("JWT_KEY")?);
        let client_secret = std::env::var("CLIENT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        let port = parsed("SWEEPER_PORT", 8080)?;
        let api_base_url = std::env::var("SWEEPER_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        let authorize_url = std::env::var("SWEEPER_AUTHORIZE_URL")
            .unwrap_or_else(|_| DEFAULT_AUTHORIZE_URL.to_string());

        let session_timeout = Duration::from_secs(parsed("SWEEPER_SESSION_TIMEOUT_SECS", 604_800)?);
        let max_refresh = Duration::from_secs(parsed("SWEEPER_MAX_REFRESH_SECS", 604_800)?);
        let request_timeout = Duration::from_secs(parsed("SWEEPER_REQUEST_TIMEOUT_SECS", 30)?);

        Ok(Self {
            client_id,
            client_secret,
            callback_url,
            jwt_key,
            port,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            authorize_url,
            session_timeout,
            max_refresh,
            request_timeout,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parsed<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_to_default_when_unset() {
        // SAFETY: no other test touches this variable.
        unsafe { std::env::remove_var("SWEEPER_TEST_UNSET_PORT") };
        let port: u16 = parsed("SWEEPER_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn parsed_rejects_garbage() {
        // SAFETY: no other test touches this variable.
        unsafe { std::env::set_var("SWEEPER_TEST_BAD_PORT", "eighty") };
        let err = parsed::<u16>("SWEEPER_TEST_BAD_PORT", 8080).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SWEEPER_TEST_BAD_PORT"));
    }

    #[test]
    fn required_treats_blank_as_missing() {
        // SAFETY: no other test touches this variable.
        unsafe { std::env::set_var("SWEEPER_TEST_BLANK", "  ") };
        let err = required("SWEEPER_TEST_BLANK").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "SWEEPER_TEST_BLANK"));
    }
}
