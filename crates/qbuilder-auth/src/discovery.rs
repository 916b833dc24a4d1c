//! OpenID Connect Discovery.
//!
//! Fetches provider metadata from `{issuer}/.well-known/openid-configuration`.
//! Documents are not cached: every authorization request performs a fresh
//! discovery.
//!
//! # Security Considerations
//!
//! - Only HTTPS issuers are accepted unless `allow_http` is set
//! - The `issuer` in the document must match the configured issuer
//! - Response size is bounded
//!
//! # References
//!
//! - [OpenID Connect Discovery 1.0](https://openid.net/specs/openid-connect-discovery-1_0.html)

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::DiscoveryConfig;

/// Provider metadata used by the authorization-code flow.
///
/// Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcDiscoveryDocument {
    /// URL that the OP asserts as its Issuer Identifier.
    pub issuer: String,

    /// URL of the OP's Authorization Endpoint.
    pub authorization_endpoint: String,

    /// URL of the OP's Token Endpoint.
    pub token_endpoint: String,

    #[serde(default)]
    pub response_types_supported: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,
}

impl OidcDiscoveryDocument {
    /// Returns `true` if this provider supports the specified response type.
    #[must_use]
    pub fn supports_response_type(&self, response_type: &str) -> bool {
        self.response_types_supported
            .iter()
            .any(|rt| rt == response_type)
    }

    /// Returns `true` if this provider supports the `authorization_code` grant type.
    ///
    /// Absent `grant_types_supported` means `authorization_code` and `implicit`.
    #[must_use]
    pub fn supports_authorization_code(&self) -> bool {
        match &self.grant_types_supported {
            Some(grants) => grants.iter().any(|g| g == "authorization_code"),
            None => true,
        }
    }

    /// Returns `true` if the token endpoint accepts `client_secret_basic`.
    ///
    /// Absent `token_endpoint_auth_methods_supported` defaults to `client_secret_basic`.
    #[must_use]
    pub fn supports_client_secret_basic(&self) -> bool {
        match &self.token_endpoint_auth_methods_supported {
            Some(methods) => methods.iter().any(|m| m == "client_secret_basic"),
            None => true,
        }
    }
}

/// Errors that can occur during OIDC discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// A network error occurred while fetching the discovery document.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpError(u16),

    /// The discovery document could not be parsed as JSON.
    #[error("Failed to parse discovery document: {0}")]
    ParseError(String),

    /// The issuer URL could not be parsed or is invalid.
    #[error("Invalid issuer URL: {0}")]
    InvalidIssuer(String),

    /// The issuer in the discovery document does not match the expected issuer.
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The expected issuer URL.
        expected: String,
        /// The actual issuer URL from the discovery document.
        actual: String,
    },

    /// The issuer URL scheme is not allowed (must be HTTPS in production).
    #[error("Invalid URL scheme: {0} (only HTTPS is allowed)")]
    InvalidScheme(String),

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

/// Client for fetching OIDC discovery documents.
#[derive(Debug, Clone)]
pub struct OidcDiscoveryClient {
    http_client: reqwest::Client,
    config: DiscoveryConfig,
}

impl OidcDiscoveryClient {
    /// Creates a discovery client sharing an existing HTTP client.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: DiscoveryConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Discovers OIDC configuration from an issuer URL.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The issuer URL is not HTTPS (unless `allow_http` is true)
    /// - The discovery document cannot be fetched or parsed
    /// - The issuer in the document does not match the expected issuer
    pub async fn discover(&self, issuer: &str) -> Result<OidcDiscoveryDocument, DiscoveryError> {
        let issuer_url = Url::parse(issuer)
            .map_err(|e| DiscoveryError::InvalidIssuer(format!("{issuer} - {e}")))?;
        self.validate_issuer_scheme(&issuer_url)?;

        let discovery_url = build_discovery_url(&issuer_url);

        let response = self
            .http_client
            .get(discovery_url.as_str())
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %discovery_url, error = %e, "Failed to fetch OIDC discovery");
                DiscoveryError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            tracing::warn!(
                url = %discovery_url,
                status = response.status().as_u16(),
                "OIDC discovery returned an error status"
            );
            return Err(DiscoveryError::HttpError(response.status().as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_response_size
        {
            return Err(DiscoveryError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DiscoveryError::NetworkError(e.to_string()))?;
        if body.len() > self.config.max_response_size {
            return Err(DiscoveryError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let document: OidcDiscoveryDocument = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(url = %discovery_url, error = %e, "Failed to parse OIDC discovery document");
            DiscoveryError::ParseError(e.to_string())
        })?;

        validate_issuer(&document, &issuer_url)?;

        tracing::debug!(issuer = %document.issuer, "Discovered OIDC configuration");

        Ok(document)
    }

    /// Validates that the issuer URL uses an allowed scheme.
    fn validate_issuer_scheme(&self, issuer: &Url) -> Result<(), DiscoveryError> {
        match issuer.scheme() {
            "https" => Ok(()),
            "http" if self.config.allow_http => Ok(()),
            other => Err(DiscoveryError::InvalidScheme(other.to_string())),
        }
    }
}

/// Builds `{issuer}/.well-known/openid-configuration`, ignoring a trailing slash on the issuer.
fn build_discovery_url(issuer: &Url) -> Url {
    let mut discovery_url = issuer.clone();
    let path = issuer.path().trim_end_matches('/');
    discovery_url.set_path(&format!("{}/.well-known/openid-configuration", path));
    discovery_url.set_query(None);
    discovery_url
}

/// The document issuer must equal the configured issuer, trailing slash aside.
fn validate_issuer(
    document: &OidcDiscoveryDocument,
    expected: &Url,
) -> Result<(), DiscoveryError> {
    let document_issuer = Url::parse(&document.issuer).map_err(|e| {
        DiscoveryError::InvalidIssuer(format!(
            "Invalid issuer URL in document: {} - {}",
            document.issuer, e
        ))
    })?;

    let expected_normalized = expected.as_str().trim_end_matches('/');
    let document_normalized = document_issuer.as_str().trim_end_matches('/');

    if expected_normalized != document_normalized {
        return Err(DiscoveryError::IssuerMismatch {
            expected: expected_normalized.to_string(),
            actual: document_normalized.to_string(),
        });
    }

    Ok(())
}
