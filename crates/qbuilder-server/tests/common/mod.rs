#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use qbuilder_server::{AppConfig, build_app};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use wiremock::MockServer;

pub const COOKIE_SECRET: &str = "integration-secret";
pub const REALM_PATH: &str = "/realms/test";

pub struct TestServer {
    pub base: String,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

pub async fn start_server(cfg: AppConfig) -> TestServer {
    let app = build_app(cfg).expect("build app");

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        base: format!("http://{addr}"),
        shutdown: Some(tx),
        handle: Some(handle),
    }
}

/// Config whose identity provider and backends all live on `mock`.
pub fn config_for(mock: &MockServer) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.server.host = "127.0.0.1".into();
    cfg.auth.issuer = format!("{}{}", mock.uri(), REALM_PATH);
    cfg.auth.client_id = "builder".into();
    cfg.auth.client_secret = "s3cret".into();
    cfg.auth.discovery.allow_http = true;
    cfg.auth.cookie.secret = COOKIE_SECRET.into();
    cfg.proxies.questionnaire_response.base_url = format!("{}/fhir", mock.uri());
    cfg.proxies.xauth.base_url = format!("{}/api/xauth/v0", mock.uri());
    cfg
}

pub fn discovery_document(mock: &MockServer) -> Value {
    let issuer = format!("{}{}", mock.uri(), REALM_PATH);
    json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/protocol/openid-connect/auth"),
        "token_endpoint": format!("{issuer}/protocol/openid-connect/token"),
        "end_session_endpoint": format!("{issuer}/protocol/openid-connect/logout"),
        "response_types_supported": ["code"]
    })
}

/// Unsigned compact JWT carrying `claims`.
pub fn jwt(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// Value of the named cookie from a `Set-Cookie` header.
pub fn set_cookie_value(header: &str, name: &str) -> Option<String> {
    let first = header.split(';').next()?;
    let (key, value) = first.split_once('=')?;
    (key.trim() == name).then(|| value.trim().to_string())
}
