//! Bearer credential resolution.
//!
//! Browser calls reach the proxies either with an explicit bearer token or
//! with only the encrypted session cookie. [`resolve_credential`] picks one
//! token with a fixed precedence:
//!
//! 1. `Authorization` header
//! 2. an optional custom header (e.g. `X-Koala-Access-Token`)
//! 3. the decrypted session cookie

use axum::http::{HeaderMap, header::AUTHORIZATION, header::COOKIE};

use crate::cookie::SessionCookieCipher;

/// Where a resolved token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    AuthorizationHeader,
    CustomHeader,
    Cookie,
}

impl CredentialSource {
    /// Label used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationHeader => "authorization-header",
            Self::CustomHeader => "custom-header",
            Self::Cookie => "cookie",
        }
    }
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bearer token and its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub token: String,
    pub source: CredentialSource,
}

/// Trims a header value and strips a case-insensitive `Bearer ` prefix.
///
/// Returns `None` for empty values.
#[must_use]
pub fn normalize_bearer(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim(),
        _ => trimmed,
    };

    (!token.is_empty()).then(|| token.to_string())
}

/// Resolves the bearer token for an outgoing proxy request.
#[must_use]
pub fn resolve_credential(
    headers: &HeaderMap,
    custom_header: Option<&str>,
    cipher: &SessionCookieCipher,
    cookie_name: &str,
) -> Option<ResolvedCredential> {
    let header_token = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(normalize_bearer)
    };

    if let Some(token) = header_token(AUTHORIZATION.as_str()) {
        return Some(ResolvedCredential {
            token,
            source: CredentialSource::AuthorizationHeader,
        });
    }

    if let Some(token) = custom_header.and_then(header_token) {
        return Some(ResolvedCredential {
            token,
            source: CredentialSource::CustomHeader,
        });
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|header| cipher.open_cookie_header(header, cookie_name))
        .map(|token| ResolvedCredential {
            token,
            source: CredentialSource::Cookie,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const CUSTOM: &str = "x-koala-access-token";

    fn cipher() -> SessionCookieCipher {
        SessionCookieCipher::new("test-secret")
    }

    fn cookie_header(token: &str) -> HeaderValue {
        let sealed = cipher().encrypt(token).unwrap();
        HeaderValue::from_str(&format!("auth_cookie={sealed}")).unwrap()
    }

    #[test]
    fn test_normalize_bearer() {
        assert_eq!(normalize_bearer("Bearer abc").as_deref(), Some("abc"));
        assert_eq!(normalize_bearer("bearer abc").as_deref(), Some("abc"));
        assert_eq!(normalize_bearer("BEARER   abc  ").as_deref(), Some("abc"));
        assert_eq!(normalize_bearer("  raw-token ").as_deref(), Some("raw-token"));
        assert_eq!(normalize_bearer("Bearer "), None);
        assert_eq!(normalize_bearer("   "), None);
        assert_eq!(normalize_bearer("Bearerabc").as_deref(), Some("Bearerabc"));
    }

    #[test]
    fn test_authorization_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-auth"));
        headers.insert(CUSTOM, HeaderValue::from_static("from-custom"));
        headers.insert(COOKIE, cookie_header("from-cookie"));

        let resolved = resolve_credential(&headers, Some(CUSTOM), &cipher(), "auth_cookie").unwrap();
        assert_eq!(resolved.token, "from-auth");
        assert_eq!(resolved.source, CredentialSource::AuthorizationHeader);
    }

    #[test]
    fn test_custom_header_before_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(CUSTOM, HeaderValue::from_static("Bearer from-custom"));
        headers.insert(COOKIE, cookie_header("from-cookie"));

        let resolved = resolve_credential(&headers, Some(CUSTOM), &cipher(), "auth_cookie").unwrap();
        assert_eq!(resolved.token, "from-custom");
        assert_eq!(resolved.source, CredentialSource::CustomHeader);

        let resolved = resolve_credential(&headers, None, &cipher(), "auth_cookie").unwrap();
        assert_eq!(resolved.token, "from-cookie");
        assert_eq!(resolved.source, CredentialSource::Cookie);
    }

    #[test]
    fn test_empty_headers_fall_through() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        headers.insert(COOKIE, cookie_header("from-cookie"));

        let resolved = resolve_credential(&headers, Some(CUSTOM), &cipher(), "auth_cookie").unwrap();
        assert_eq!(resolved.source, CredentialSource::Cookie);
    }

    #[test]
    fn test_undecryptable_cookie_is_no_token() {
        let mut headers = HeaderMap::new();
        let sealed = SessionCookieCipher::new("other-key").encrypt("token").unwrap();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("auth_cookie={sealed}")).unwrap(),
        );

        assert_eq!(resolve_credential(&headers, None, &cipher(), "auth_cookie"), None);
        assert_eq!(resolve_credential(&HeaderMap::new(), None, &cipher(), "auth_cookie"), None);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(CredentialSource::AuthorizationHeader.to_string(), "authorization-header");
        assert_eq!(CredentialSource::Cookie.as_str(), "cookie");
    }
}
