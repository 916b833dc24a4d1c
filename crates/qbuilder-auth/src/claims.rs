//! Claims preview for display purposes.
//!
//! The token endpoint surfaces a few profile fields (name, email, ...) to the
//! browser straight from the tokens it just received. The payload segment is
//! decoded **without verifying the signature**. The result is a preview: it
//! must never feed an authorization decision. Backends that receive the
//! access token do their own verification.

use base64::{
    Engine,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// base64url that accepts payloads with or without padding.
const BASE64URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors from decoding a token payload.
#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    /// The token does not have three dot-separated segments.
    #[error("Token is not a compact JWS (expected 3 segments, got {0})")]
    Malformed(usize),

    /// The payload segment is not valid base64url.
    #[error("Invalid payload encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The payload is not a JSON object.
    #[error("Invalid payload JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes the payload of a compact JWT without verifying it.
///
/// Non-authoritative: use only to display information about the user.
pub fn preview_claims(token: &str) -> Result<Map<String, Value>, ClaimsError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(ClaimsError::Malformed(segments.len()));
    }

    let payload = BASE64URL_LENIENT.decode(segments[1])?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Display profile returned to the browser after login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

impl UserProfile {
    /// Extracts the display fields from a claims map.
    #[must_use]
    pub fn from_claims(claims: &Map<String, Value>) -> Self {
        let field = |name: &str| claims.get(name).and_then(Value::as_str).map(str::to_string);

        Self {
            sub: field("sub"),
            sid: field("sid"),
            name: field("name"),
            given_name: field("given_name"),
            family_name: field("family_name"),
            email: field("email"),
            preferred_username: field("preferred_username"),
        }
    }

    /// Builds the profile from the ID token, falling back to the access token
    /// for `sub` and `sid`.
    ///
    /// Decoding failures are logged and skipped; a partial or empty profile is
    /// returned rather than an error.
    #[must_use]
    pub fn from_tokens(id_token: Option<&str>, access_token: Option<&str>) -> Self {
        let mut profile = id_token
            .and_then(|token| match preview_claims(token) {
                Ok(claims) => Some(Self::from_claims(&claims)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to decode id_token");
                    None
                }
            })
            .unwrap_or_default();

        if profile.sub.is_none()
            && let Some(token) = access_token
        {
            match preview_claims(token) {
                Ok(claims) => {
                    let fallback = Self::from_claims(&claims);
                    profile.sub = fallback.sub;
                    profile.sid = profile.sid.or(fallback.sid);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to decode access_token");
                }
            }
        }

        profile
    }
}
