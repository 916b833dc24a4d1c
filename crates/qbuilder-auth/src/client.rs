//! Configured OIDC client for the authorization-code flow.
//!
//! [`OidcClient`] pairs a freshly discovered provider document with the
//! client credentials and builds the login URL. The code exchange itself goes
//! straight to the configured token endpoint, so [`exchange_code`] needs no
//! discovery round-trip and performs exactly one HTTP request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::AuthConfig;
use crate::discovery::{OidcDiscoveryClient, OidcDiscoveryDocument};
use crate::error::AuthError;

/// Tokens returned by a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Errors from the token endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The provider answered with a non-success status.
    #[error("Token endpoint returned status {status}")]
    Provider {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider response body (JSON when parsable, otherwise the raw text).
        body: Value,
    },

    /// The provider could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered 2xx but the body is not a token response.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

impl ExchangeError {
    /// HTTP status to answer the browser with.
    ///
    /// Provider error statuses are mirrored; everything else maps to 400.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Provider { status, .. } if (400..=599).contains(status) => *status,
            _ => 400,
        }
    }

    /// Error detail forwarded to the browser.
    #[must_use]
    pub fn detail(&self) -> Value {
        match self {
            Self::Provider { body, .. } => body.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

/// An OIDC client bound to one discovered provider.
#[derive(Debug, Clone)]
pub struct OidcClient {
    document: OidcDiscoveryDocument,
    client_id: String,
    scope: String,
    audience: String,
}

impl OidcClient {
    /// Discovers the provider configured in `config`.
    ///
    /// Every call fetches the discovery document again.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Discovery` if the document cannot be fetched or validated.
    pub async fn discover(http: &reqwest::Client, config: &AuthConfig) -> Result<Self, AuthError> {
        let discovery = OidcDiscoveryClient::new(http.clone(), config.discovery.clone());
        let document = discovery.discover(&config.issuer).await?;

        for capability in missing_capabilities(&document) {
            tracing::warn!(
                issuer = %document.issuer,
                capability,
                "Provider does not advertise a capability the login flow relies on"
            );
        }

        Ok(Self::from_document(document, config))
    }

    /// Builds a client from an already fetched document.
    #[must_use]
    pub fn from_document(document: OidcDiscoveryDocument, config: &AuthConfig) -> Self {
        Self {
            document,
            client_id: config.client_id.clone(),
            scope: config.scope_string(),
            audience: config.audience.clone(),
        }
    }

    /// The discovered provider document.
    #[must_use]
    pub fn document(&self) -> &OidcDiscoveryDocument {
        &self.document
    }

    /// Builds the provider login URL.
    ///
    /// `prompt=login` forces re-authentication. `resource` is appended only
    /// when the authorization endpoint does not already carry one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUrl` if the discovered authorization endpoint
    /// is not an absolute URL.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.document.authorization_endpoint)
            .map_err(|e| AuthError::invalid_url("authorization_endpoint", e))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("response_type", "code")
            .append_pair("state", state)
            .append_pair("prompt", "login")
            .append_pair("audience", &self.audience);

        if !url.query_pairs().any(|(key, _)| key == "resource") {
            url.query_pairs_mut().append_pair("resource", &self.audience);
        }

        Ok(url)
    }
}

/// Flow requirements the provider document does not advertise.
///
/// Absent lists are treated as supported, as the discovery defaults allow.
fn missing_capabilities(document: &OidcDiscoveryDocument) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !document.response_types_supported.is_empty() && !document.supports_response_type("code")
    {
        missing.push("response_type=code");
    }
    if !document.supports_authorization_code() {
        missing.push("grant_type=authorization_code");
    }
    if !document.supports_client_secret_basic() {
        missing.push("client_secret_basic");
    }
    missing
}

/// Exchanges an authorization code at the configured token endpoint.
///
/// The client authenticates with HTTP Basic. The request is sent once with
/// the HTTP client's own timeouts; there are no retries.
///
/// # Errors
///
/// - `ExchangeError::Network` if the endpoint is unreachable
/// - `ExchangeError::Provider` for any non-2xx answer
/// - `ExchangeError::InvalidResponse` if a 2xx body lacks `access_token`
pub async fn exchange_code(
    http: &reqwest::Client,
    config: &AuthConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenSet, ExchangeError> {
    let token_endpoint = config.token_endpoint();
    let scope = config.scope_string();

    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("scope", scope.as_str()),
        ("audience", config.audience.as_str()),
        ("resource", config.audience.as_str()),
    ];

    tracing::debug!(endpoint = %token_endpoint, "Exchanging authorization code");

    let response = http
        .post(&token_endpoint)
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .header("Accept", "application/json")
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(endpoint = %token_endpoint, error = %e, "Token endpoint unreachable");
            ExchangeError::Network(e.to_string())
        })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ExchangeError::Network(e.to_string()))?;

    if !status.is_success() {
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        tracing::warn!(status = status.as_u16(), body = %body, "Token exchange rejected");
        return Err(ExchangeError::Provider {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&text).map_err(|e| ExchangeError::InvalidResponse(e.to_string()))
}
