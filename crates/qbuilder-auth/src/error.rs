//! Errors raised while starting the authorization-code flow.

use crate::discovery::DiscoveryError;

/// Errors that can occur while building a login URL for the provider.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// OIDC discovery failed.
    #[error("OIDC discovery failed")]
    Discovery(#[from] DiscoveryError),

    /// A provider URL could not be parsed.
    #[error("Invalid URL: {context}")]
    InvalidUrl {
        /// What the URL was for.
        context: String,
        #[source]
        source: url::ParseError,
    },
}

impl AuthError {
    /// Creates a new `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(context: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_source_chain_is_preserved() {
        let err: AuthError = DiscoveryError::HttpError(503).into();
        assert_eq!(err.to_string(), "OIDC discovery failed");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("HTTP error: status 503")
        );
    }

    #[test]
    fn test_invalid_url() {
        let source = url::Url::parse("::").unwrap_err();
        let err = AuthError::invalid_url("authorization_endpoint", source);
        assert!(err.to_string().contains("authorization_endpoint"));
        assert!(err.source().is_some());
    }
}
