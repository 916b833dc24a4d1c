use axum::{
    Json,
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use qbuilder_auth::OidcClient;
use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::server::AppState;

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "functions-server" })),
    )
}

pub async fn test(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "message": "Functions server is running",
            "timestamp": now_rfc3339(),
            "path": uri.path(),
        })),
    )
}

/// Reports the effective OAuth configuration and whether discovery succeeds.
/// The client secret itself is never included.
pub async fn diagnose(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    let fallback = state.resolver.fallback();

    let mut keycloak = json!({
        "issuer": config.auth.issuer,
        "client_id": config.auth.client_id,
        "has_secret": config.auth.has_client_secret(),
    });

    match OidcClient::discover(&state.http_client, &config.auth).await {
        Ok(client) => {
            keycloak["discovery"] = Value::from("success");
            keycloak["authorization_endpoint"] =
                Value::from(client.document().authorization_endpoint.as_str());
        }
        Err(e) => {
            keycloak["discovery"] = Value::from("failed");
            keycloak["error"] = Value::from(crate::error::error_chain(&e).join(": "));
        }
    }

    Json(json!({
        "timestamp": now_rfc3339(),
        "keycloak": keycloak,
        "redirect": {
            "default_origin": fallback,
            "redirect_uri": config.auth.redirect_uri(fallback),
        },
        "environment": {
            "environment": config.environment,
            "port": config.server.port,
        },
    }))
}
