mod common;

use common::{REALM_PATH, config_for, discovery_document, start_server};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn health_and_test_endpoints() {
    let mock = MockServer::start().await;
    let server = start_server(config_for(&mock)).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "functions-server");

    let resp = client
        .get(format!("{}/test", server.base))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Functions server is running");
    assert_eq!(body["path"], "/test");
    assert!(body["timestamp"].as_str().unwrap().contains('T'));

    server.stop().await;
}

#[tokio::test]
async fn request_id_is_generated_or_preserved() {
    let mock = MockServer::start().await;
    let server = start_server(config_for(&mock)).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    let generated = resp.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let resp = client
        .get(format!("{}/health", server.base))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-42");

    server.stop().await;
}

#[tokio::test]
async fn function_responses_are_not_cacheable() {
    let mock = MockServer::start().await;
    let server = start_server(config_for(&mock)).await;

    let resp = reqwest::get(format!("{}/.netlify/functions/get-token", server.base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.headers()["cache-control"],
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(resp.headers()["pragma"], "no-cache");
    assert_eq!(resp.headers()["expires"], "0");

    server.stop().await;
}

#[tokio::test]
async fn diagnose_reports_discovery_outcome() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REALM_PATH}/.well-known/openid-configuration")))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_document(&mock)))
        .expect(1)
        .mount(&mock)
        .await;

    let server = start_server(config_for(&mock)).await;
    let body: Value = reqwest::get(format!("{}/.netlify/functions/diagnose", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["keycloak"]["client_id"], "builder");
    assert_eq!(body["keycloak"]["has_secret"], true);
    assert_eq!(body["keycloak"]["discovery"], "success");
    assert!(body["keycloak"].get("client_secret").is_none());
    assert_eq!(body["redirect"]["default_origin"], "http://localhost:3000");
    assert_eq!(body["redirect"]["redirect_uri"], "http://localhost:3000/code");
    assert_eq!(body["environment"]["port"], 9000);
    server.stop().await;

    let mut cfg = config_for(&mock);
    cfg.auth.issuer = "http://sso.example.com/realms/test".into();
    cfg.auth.discovery.allow_http = false;
    let server = start_server(cfg).await;
    let body: Value = reqwest::get(format!("{}/diagnose", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["keycloak"]["discovery"], "failed");
    assert!(
        body["keycloak"]["error"]
            .as_str()
            .unwrap()
            .contains("Invalid URL scheme")
    );
    server.stop().await;
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let mock = MockServer::start().await;
    let server = start_server(config_for(&mock)).await;

    let resp = reqwest::get(format!("{}/.netlify/functions/unknown", server.base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    server.stop().await;
}
