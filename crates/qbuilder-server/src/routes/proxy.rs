//! Reverse proxies to the Questionnaire backend and the XAuth service.
//!
//! Both proxies share one forwarder parameterised by [`ProxyConfig`]:
//! 1. `OPTIONS` is answered locally with 204
//! 2. Methods outside the allow-list get 405 with an `Allow` header
//! 3. The target is `base_url` + the `path` query parameter
//! 4. A bearer token is resolved from the request and attached
//! 5. Status and body are mirrored back, CORS headers always added

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{
        HeaderMap, HeaderValue, Method, Request, StatusCode,
        header::{
            ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, AUTHORIZATION, CONTENT_TYPE,
        },
    },
    response::{IntoResponse, Response},
};
use qbuilder_auth::resolve_credential;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{config::ProxyConfig, server::AppState};

/// Errors answered by the proxies themselves.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Method {method} not allowed.")]
    MethodNotAllowed { method: String, allow: String },

    #[error("Missing access token")]
    MissingToken,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Failed to reach {upstream}")]
    Upstream { upstream: String, message: String },
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            Self::MethodNotAllowed { allow, .. } => {
                let mut response =
                    (StatusCode::METHOD_NOT_ALLOWED, Json(json!({ "error": self.to_string() })))
                        .into_response();
                if let Ok(value) = HeaderValue::from_str(allow) {
                    response.headers_mut().insert(ALLOW, value);
                }
                response
            }
            Self::MissingToken => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": self.to_string() })))
                    .into_response()
            }
            Self::InvalidBody(_) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": self.to_string() })))
                    .into_response()
            }
            Self::Upstream { message, .. } => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": self.to_string(), "message": message })),
            )
                .into_response(),
        }
    }
}

/// `/questionnaire-response-proxy`
pub async fn questionnaire_response_proxy(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    let proxy = &state.config.proxies.questionnaire_response;
    forward(&state, proxy, request).await
}

/// `/xauth-proxy`
pub async fn xauth_proxy(State(state): State<AppState>, request: Request<Body>) -> Response {
    let proxy = &state.config.proxies.xauth;
    forward(&state, proxy, request).await
}

/// Forwards one request and decorates whatever comes back with CORS headers.
pub async fn forward(state: &AppState, proxy: &ProxyConfig, request: Request<Body>) -> Response {
    let mut response = match proxy_request(state, proxy, request).await {
        Ok(response) => response,
        Err(e) => {
            match &e {
                ProxyError::Upstream { message, .. } => {
                    warn!(upstream = %proxy.upstream_name, error = %message, "Upstream request failed")
                }
                other => debug!(error = %other, "Proxy request rejected"),
            }
            e.into_response()
        }
    };
    apply_cors(response.headers_mut(), proxy);
    response
}

async fn proxy_request(
    state: &AppState,
    proxy: &ProxyConfig,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let method = request.method().clone();

    if method == Method::OPTIONS {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    if !proxy.allows(method.as_str()) {
        return Err(ProxyError::MethodNotAllowed {
            method: method.to_string(),
            allow: proxy.allowed_methods.join(", "),
        });
    }

    let path = requested_path(request.uri().query(), &proxy.default_path);
    let target_url = target_url(&proxy.base_url, &path);

    let credential = resolve_credential(
        request.headers(),
        proxy.custom_token_header.as_deref(),
        &state.cipher,
        &state.config.auth.cookie.name,
    );

    match &credential {
        Some(c) => debug!(source = %c.source, "Resolved access token"),
        None if proxy.require_token => return Err(ProxyError::MissingToken),
        None => debug!("No access token, forwarding anonymously"),
    }

    let mut builder = state
        .http_client
        .request(method.clone(), &target_url)
        .header(CONTENT_TYPE, proxy.content_type.as_str())
        .header(ACCEPT, proxy.accept.as_str())
        .timeout(proxy.timeout());

    if let Some(c) = &credential {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", c.token));
    }

    if method != Method::GET && method != Method::DELETE {
        let body = axum::body::to_bytes(request.into_body(), state.config.server.body_limit_bytes)
            .await
            .map_err(|e| ProxyError::InvalidBody(e.to_string()))?;
        builder = builder.body(body);
    }

    info!(
        method = %method,
        target_url = %target_url,
        timeout_secs = proxy.timeout_secs,
        "Proxying request"
    );

    let upstream = builder.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            format!("Request timed out after {} seconds", proxy.timeout_secs)
        } else if e.is_connect() {
            format!("Failed to connect to target: {e}")
        } else {
            e.to_string()
        };
        ProxyError::Upstream {
            upstream: proxy.upstream_name.clone(),
            message,
        }
    })?;

    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));

    let body = upstream.bytes().await.map_err(|e| ProxyError::Upstream {
        upstream: proxy.upstream_name.clone(),
        message: format!("Failed to read response body: {e}"),
    })?;

    info!(status = %status, "Proxy request completed");

    let mut response = (status, body).into_response();
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    Ok(response)
}

/// The `path` query parameter with a leading `/`, or the default path.
fn requested_path(query: Option<&str>, default_path: &str) -> String {
    let path = query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "path")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| default_path.to_string());

    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

fn target_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn apply_cors(headers: &mut HeaderMap, proxy: &ProxyConfig) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    if let Ok(value) = HeaderValue::from_str(&proxy.allow_headers) {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
    }
    if let Ok(value) = HeaderValue::from_str(&proxy.cors_methods()) {
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value);
    }
}
