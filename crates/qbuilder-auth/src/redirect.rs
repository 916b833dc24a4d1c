//! Redirect-origin resolution.
//!
//! The browser app may run on several origins. The origin used to build the
//! OAuth redirect URI is taken from the first candidate that passes the
//! allow-list, checked in order: `redirect_origin` query parameter, `Origin`
//! header, `Referer` header. When nothing matches the configured fallback is
//! returned.

use regex::Regex;
use url::Url;

use crate::config::RedirectConfig;

/// Accepted when no explicit allow-list is configured.
const DEV_ORIGIN_PATTERN: &str = r"(?i)^https?://(localhost|127\.0\.0\.1)(:\d+)?$";

/// Validates and selects redirect origins.
#[derive(Debug, Clone)]
pub struct RedirectOriginResolver {
    fallback: String,
    allowed: Vec<String>,
    dev_pattern: Regex,
}

impl RedirectOriginResolver {
    /// Creates a resolver from configuration.
    ///
    /// Allow-list entries are normalized the same way candidates are, so
    /// `https://forms.example.com/` and `https://forms.example.com` are equivalent.
    #[must_use]
    pub fn new(config: &RedirectConfig) -> Self {
        let allowed = config
            .allowed_origins
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(|o| normalize_origin(o).unwrap_or_else(|| o.to_string()))
            .collect();

        Self {
            fallback: config.fallback_origin.trim_end_matches('/').to_string(),
            allowed,
            dev_pattern: Regex::new(DEV_ORIGIN_PATTERN).expect("valid dev origin pattern"),
        }
    }

    /// The origin returned when no candidate is allowed.
    #[must_use]
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Returns `true` if the already-normalized origin may be used as a redirect target.
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        if self.allowed.is_empty() {
            self.dev_pattern.is_match(origin)
        } else {
            self.allowed.iter().any(|o| o == origin)
        }
    }

    /// Picks the redirect origin from the request candidates.
    ///
    /// Never fails: malformed candidates are skipped.
    #[must_use]
    pub fn resolve(
        &self,
        query: Option<&str>,
        origin_header: Option<&str>,
        referer_header: Option<&str>,
    ) -> String {
        [query, origin_header, referer_header]
            .into_iter()
            .flatten()
            .filter_map(normalize_origin)
            .find(|origin| self.is_allowed(origin))
            .unwrap_or_else(|| {
                tracing::debug!(fallback = %self.fallback, "No allowed redirect origin, using fallback");
                self.fallback.clone()
            })
    }
}

/// Normalizes a URL to `scheme://host[:port]`.
///
/// Default ports are dropped and the host is lowercased. Returns `None` for
/// values that do not parse or have no host.
#[must_use]
pub fn normalize_origin(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let url = Url::parse(value).ok()?;
    let host = url.host_str()?;
    if host.is_empty() {
        return None;
    }

    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
