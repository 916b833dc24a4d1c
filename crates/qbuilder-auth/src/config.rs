//! Authentication configuration.
//!
//! All values are read once at process start and shared immutably by every
//! endpoint. Nothing in this crate reads the environment directly.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! issuer = "https://sso.example.com/realms/forms/"
//! client_id = "questionnaire-builder"
//!
//! [auth.cookie]
//! max_age = "8h"
//!
//! [auth.redirect]
//! fallback_origin = "https://forms.example.com"
//! allowed_origins = ["https://forms.example.com"]
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Scopes requested for every login.
pub const DEFAULT_SCOPES: &[&str] = &[
    "openid",
    "questionnaire_create",
    "questionnaire_read",
    "questionnaire_write",
    "questionnaire_view",
    "user_roles",
];

/// Client scopes that make the provider add the API audiences to the token.
pub const AUDIENCE_SCOPES: &[&str] = &["aud_questionnaire", "aud_streaming"];

/// Audience (and `resource` indicator) sent with authorization and token requests.
pub const DEFAULT_AUDIENCE: &str = "questionnaire";

/// Key used for the session cookie when none is configured.
pub const DEFAULT_COOKIE_SECRET: &str = "default-secret-key";

/// Root auth configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OIDC issuer URL of the identity provider.
    pub issuer: String,

    /// OAuth client identifier.
    pub client_id: String,

    /// OAuth client secret, sent with HTTP Basic authentication.
    pub client_secret: String,

    /// Requested scopes, joined with spaces on the wire.
    pub scopes: Vec<String>,

    /// Value sent as both `audience` and `resource`.
    pub audience: String,

    /// Path appended to the resolved origin to form the redirect URI.
    pub redirect_path: String,

    /// Explicit token endpoint. Defaults to the Keycloak layout under the issuer.
    pub token_endpoint: Option<String>,

    /// Explicit end-session endpoint. Defaults to the Keycloak layout under the issuer.
    pub end_session_endpoint: Option<String>,

    /// Discovery settings.
    pub discovery: DiscoveryConfig,

    /// Session cookie settings.
    pub cookie: CookieConfig,

    /// Redirect origin allow-list.
    pub redirect: RedirectConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "https://sso.koala.primbs.dev/realms/koala/".to_string(),
            client_id: "api-debugger".to_string(),
            client_secret: String::new(),
            scopes: default_scopes(),
            audience: DEFAULT_AUDIENCE.to_string(),
            redirect_path: "/code".to_string(),
            token_endpoint: None,
            end_session_endpoint: None,
            discovery: DiscoveryConfig::default(),
            cookie: CookieConfig::default(),
            redirect: RedirectConfig::default(),
        }
    }
}

/// Returns [`DEFAULT_SCOPES`] followed by [`AUDIENCE_SCOPES`], without duplicates.
#[must_use]
pub fn default_scopes() -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for scope in DEFAULT_SCOPES.iter().chain(AUDIENCE_SCOPES) {
        if !scopes.iter().any(|s| s == scope) {
            scopes.push((*scope).to_string());
        }
    }
    scopes
}

impl AuthConfig {
    /// Space-separated scope string.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Issuer with any trailing slash removed.
    #[must_use]
    pub fn issuer_base(&self) -> &str {
        self.issuer.trim_end_matches('/')
    }

    /// Token endpoint used for the code exchange.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        self.token_endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/protocol/openid-connect/token", self.issuer_base()))
    }

    /// Provider logout endpoint.
    #[must_use]
    pub fn end_session_endpoint(&self) -> String {
        self.end_session_endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/protocol/openid-connect/logout", self.issuer_base()))
    }

    /// Redirect URI registered with the provider for the given origin.
    #[must_use]
    pub fn redirect_uri(&self, origin: &str) -> String {
        format!("{}{}", origin.trim_end_matches('/'), self.redirect_path)
    }

    /// Returns `true` when a client secret is configured.
    #[must_use]
    pub fn has_client_secret(&self) -> bool {
        !self.client_secret.is_empty()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is not an absolute URL
    /// - The client id or scope list is empty
    /// - The cookie name is empty or its max-age is zero
    /// - The fallback redirect origin is not an absolute URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.issuer)
            .map_err(|e| ConfigError::InvalidValue(format!("issuer '{}': {}", self.issuer, e)))?;

        if self.client_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "client_id cannot be empty".to_string(),
            ));
        }

        if self.scopes.is_empty() {
            return Err(ConfigError::InvalidValue(
                "at least one scope is required".to_string(),
            ));
        }

        if !self.redirect_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(format!(
                "redirect_path must start with '/': '{}'",
                self.redirect_path
            )));
        }

        if let Some(endpoint) = &self.token_endpoint {
            Url::parse(endpoint).map_err(|e| {
                ConfigError::InvalidValue(format!("token_endpoint '{}': {}", endpoint, e))
            })?;
        }

        if self.cookie.name.is_empty() {
            return Err(ConfigError::InvalidValue(
                "cookie.name cannot be empty".to_string(),
            ));
        }

        if self.cookie.max_age.is_zero() {
            return Err(ConfigError::InvalidValue(
                "cookie.max_age must be > 0".to_string(),
            ));
        }

        Url::parse(&self.redirect.fallback_origin).map_err(|e| {
            ConfigError::InvalidValue(format!(
                "redirect.fallback_origin '{}': {}",
                self.redirect.fallback_origin, e
            ))
        })?;

        Ok(())
    }
}

/// OIDC discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// HTTP request timeout for discovery.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Maximum discovery document size in bytes.
    pub max_response_size: usize,

    /// Allow plain HTTP issuers. Only meant for local identity providers.
    pub allow_http: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_response_size: 1024 * 1024,
            allow_http: false,
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name.
    pub name: String,

    /// Passphrase the cookie encryption key is derived from.
    pub secret: String,

    /// Cookie lifetime.
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,

    /// Cookie path.
    pub path: String,

    /// Set the `Secure` attribute.
    pub secure: bool,

    /// Set the `HttpOnly` attribute.
    pub http_only: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "auth_cookie".to_string(),
            secret: DEFAULT_COOKIE_SECRET.to_string(),
            max_age: Duration::from_secs(8 * 3600),
            path: "/".to_string(),
            secure: true,
            http_only: true,
        }
    }
}

impl CookieConfig {
    /// Returns `true` if the built-in development key is in use.
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_COOKIE_SECRET
    }
}

/// Redirect origin allow-list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Origin used when no candidate is allowed.
    pub fallback_origin: String,

    /// Exact origins accepted as redirect targets.
    /// When empty, only `localhost` and `127.0.0.1` origins are accepted.
    pub allowed_origins: Vec<String>,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            fallback_origin: "http://localhost:3000".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AuthConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.has_client_secret());
        assert!(config.cookie.uses_default_secret());
    }

    #[test]
    fn test_default_scopes_are_deduplicated_in_order() {
        let scopes = default_scopes();
        assert_eq!(scopes.first().map(String::as_str), Some("openid"));
        assert_eq!(scopes.last().map(String::as_str), Some("aud_streaming"));
        assert_eq!(scopes.len(), DEFAULT_SCOPES.len() + AUDIENCE_SCOPES.len());

        let config = AuthConfig::default();
        assert!(config.scope_string().starts_with("openid questionnaire_create"));
    }

    #[test]
    fn test_endpoints_derived_from_issuer() {
        let config = AuthConfig {
            issuer: "https://sso.example.com/realms/forms/".to_string(),
            ..AuthConfig::default()
        };
        assert_eq!(
            config.token_endpoint(),
            "https://sso.example.com/realms/forms/protocol/openid-connect/token"
        );
        assert_eq!(
            config.end_session_endpoint(),
            "https://sso.example.com/realms/forms/protocol/openid-connect/logout"
        );

        let config = AuthConfig {
            token_endpoint: Some("https://idp.example.com/token".to_string()),
            ..config
        };
        assert_eq!(config.token_endpoint(), "https://idp.example.com/token");
    }

    #[test]
    fn test_redirect_uri() {
        let config = AuthConfig::default();
        assert_eq!(
            config.redirect_uri("http://localhost:3000"),
            "http://localhost:3000/code"
        );
        assert_eq!(
            config.redirect_uri("https://forms.example.com/"),
            "https://forms.example.com/code"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let err = AuthConfig {
            issuer: "not a url".to_string(),
            ..AuthConfig::default()
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("issuer"));

        let err = AuthConfig {
            client_id: " ".to_string(),
            ..AuthConfig::default()
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("client_id"));

        let err = AuthConfig {
            scopes: Vec::new(),
            ..AuthConfig::default()
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("scope"));

        let mut config = AuthConfig::default();
        config.cookie.max_age = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AuthConfig::default();
        config.redirect.fallback_origin = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cookie_defaults() {
        let cookie = CookieConfig::default();
        assert_eq!(cookie.name, "auth_cookie");
        assert_eq!(cookie.max_age, Duration::from_secs(28_800));
        assert!(cookie.secure);
        assert!(cookie.http_only);
        assert_eq!(cookie.path, "/");
    }
}
