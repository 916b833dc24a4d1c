//! OAuth endpoints: login start, code exchange and logout.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::{
        HeaderMap,
        header::{CACHE_CONTROL, SET_COOKIE},
    },
    response::IntoResponse,
};
use qbuilder_auth::{
    OidcClient, STATE_LENGTH, TokenSet, UserProfile, cookie::removal_cookie, exchange_code,
    generate_state, states_match,
};
use serde::{Deserialize, Serialize};
use url::Url;

use super::resolve_origin;
use crate::{error::ApiError, server::AppState};

#[derive(Debug, Deserialize)]
pub struct AuthorizationQuery {
    pub redirect_origin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizationResponse {
    pub state: String,
    pub auth_url: String,
}

/// `GET /authorization-code`
///
/// Returns a fresh CSRF state together with the provider login URL. The
/// browser keeps the state and echoes it back to `/get-token` as
/// `stored_state`.
pub async fn authorization_code(
    State(state): State<AppState>,
    query: Result<Query<AuthorizationQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Json<AuthorizationResponse>, ApiError> {
    let Query(query) = query?;
    let config = &state.config;
    let origin = resolve_origin(&state, query.redirect_origin.as_deref(), &headers);
    let redirect_uri = config.auth.redirect_uri(&origin);
    let expose = !config.is_production();

    let client = OidcClient::discover(&state.http_client, &config.auth)
        .await
        .map_err(|e| ApiError::authorization_url(&e, expose))?;

    let csrf_state = generate_state(STATE_LENGTH);
    let auth_url = client
        .authorization_url(&redirect_uri, &csrf_state)
        .map_err(|e| ApiError::authorization_url(&e, expose))?;

    tracing::info!(redirect_uri = %redirect_uri, "Generated authorization URL");

    Ok(Json(AuthorizationResponse {
        state: csrf_state,
        auth_url: auth_url.into(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub stored_state: Option<String>,
    pub redirect_origin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    fn new(tokens: TokenSet) -> Self {
        let profile =
            UserProfile::from_tokens(tokens.id_token.as_deref(), Some(&tokens.access_token));
        Self {
            profile,
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
        }
    }
}

/// `GET /get-token`
///
/// Exchanges the authorization code once the returned `state` matches the
/// browser's `stored_state`. On success the access token is also set as an
/// encrypted session cookie for the proxies.
pub async fn get_token(
    State(state): State<AppState>,
    query: Result<Query<TokenQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let config = &state.config;

    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        return Err(ApiError::MissingCode);
    };

    if !states_match(query.state.as_deref(), query.stored_state.as_deref()) {
        tracing::warn!(
            has_state = query.state.is_some(),
            has_stored_state = query.stored_state.is_some(),
            "State mismatch, refusing code exchange"
        );
        return Err(ApiError::StateMismatch);
    }

    let origin = resolve_origin(&state, query.redirect_origin.as_deref(), &headers);
    let redirect_uri = config.auth.redirect_uri(&origin);

    let tokens = exchange_code(&state.http_client, &config.auth, code, &redirect_uri)
        .await
        .map_err(|e| ApiError::token_exchange(&e))?;

    let cookie = state
        .cipher
        .seal_cookie(&tokens.access_token, &config.auth.cookie)
        .map_err(|e| ApiError::internal(&e, !config.is_production()))?;

    let body = TokenResponse::new(tokens);
    tracing::info!(
        sub = body.profile.sub.as_deref().unwrap_or("-"),
        "Token exchange succeeded"
    );

    Ok((
        [
            (SET_COOKIE, cookie.to_string()),
            (CACHE_CONTROL, "no-cache".to_string()),
        ],
        Json(body),
    ))
}

#[derive(Debug, Deserialize)]
pub struct EndSessionQuery {
    pub redirect_origin: Option<String>,
    pub id_token_hint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EndSessionResponse {
    pub success: bool,
    pub message: String,
    pub logout_url: String,
}

/// `GET|POST /end-session`
///
/// Drops the session cookie and returns the provider logout URL the browser
/// should navigate to. No request is made to the provider.
pub async fn end_session(
    State(state): State<AppState>,
    query: Result<Query<EndSessionQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let config = &state.config;
    let origin = resolve_origin(&state, query.redirect_origin.as_deref(), &headers);

    let mut logout_url = Url::parse(&config.auth.end_session_endpoint())
        .map_err(|e| ApiError::internal(&e, !config.is_production()))?;
    {
        let mut pairs = logout_url.query_pairs_mut();
        pairs
            .append_pair("client_id", &config.auth.client_id)
            .append_pair("post_logout_redirect_uri", &origin);
        if let Some(hint) = query.id_token_hint.as_deref().filter(|h| !h.is_empty()) {
            pairs.append_pair("id_token_hint", hint);
        }
    }

    tracing::info!(post_logout_redirect_uri = %origin, "Session ended");

    Ok((
        [
            (SET_COOKIE, removal_cookie(&config.auth.cookie).to_string()),
            (CACHE_CONTROL, "no-store".to_string()),
        ],
        Json(EndSessionResponse {
            success: true,
            message: "Logged out".to_string(),
            logout_url: logout_url.into(),
        }),
    ))
}
