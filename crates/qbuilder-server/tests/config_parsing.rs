use std::{fs, time::Duration};

use config::Map;
use qbuilder_server::config::loader::load_config_with_env;

fn env(pairs: &[(&str, &str)]) -> Map<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("qbuilder.toml");

    let toml_content = r#"
environment = "staging"

[server]
host = "127.0.0.1"
port = 9100

[logging]
level = "debug"

[auth]
issuer = "https://sso.example.com/realms/forms/"
client_id = "questionnaire-builder"

[auth.cookie]
max_age = "4h"

[auth.redirect]
fallback_origin = "https://forms.example.com"

[proxies.xauth]
base_url = "https://xauth.example.com/v0"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses, untouched fields keep their defaults
    let cfg = load_config_with_env(path.to_str(), &env(&[])).expect("should parse config");
    assert_eq!(cfg.server.port, 9100);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.environment, "staging");
    assert_eq!(cfg.auth.client_id, "questionnaire-builder");
    assert_eq!(cfg.auth.cookie.max_age, Duration::from_secs(4 * 3600));
    assert_eq!(cfg.auth.cookie.name, "auth_cookie");
    assert_eq!(cfg.proxies.xauth.base_url, "https://xauth.example.com/v0");
    assert!(cfg.proxies.xauth.require_token);
    assert_eq!(cfg.proxies.xauth.allowed_methods, vec!["GET".to_string()]);
    assert_eq!(
        cfg.proxies.questionnaire_response.default_path,
        "/QuestionnaireResponse"
    );

    // 2) Prefixed env overrides the file
    let cfg = load_config_with_env(
        path.to_str(),
        &env(&[("QBUILDER__SERVER__PORT", "9200"), ("QBUILDER__LOGGING__LEVEL", "warn")]),
    )
    .expect("prefixed env overrides");
    assert_eq!(cfg.server.port, 9200);
    assert_eq!(cfg.logging.level, "warn");

    // 3) Flat deployment variables win over everything
    let cfg = load_config_with_env(
        path.to_str(),
        &env(&[
            ("QBUILDER__SERVER__PORT", "9200"),
            ("FUNCTIONS_PORT", "9300"),
            ("KEYCLOAK_ISSUER", "https://idp.example.org/realms/koala"),
            ("KEYCLOAK_CLIENT_ID", "deployed-client"),
            ("KEYCLOAK_CLIENT_SECRET", "deployed-secret"),
            ("CINCINNO", "cookie-key"),
            ("QUESTIONNAIRE_API_URL", "http://fhir.internal:8080"),
            ("XAUTH_API_URL", "https://xauth.internal/v0"),
            ("APP_REDIRECT_FALLBACK", "https://app.example.org"),
            ("APP_REDIRECT_ORIGINS", " https://app.example.org, ,https://beta.example.org "),
            ("NODE_ENV", "production"),
        ]),
    )
    .expect("flat env overrides");
    assert_eq!(cfg.server.port, 9300);
    assert_eq!(cfg.auth.issuer, "https://idp.example.org/realms/koala");
    assert_eq!(cfg.auth.client_id, "deployed-client");
    assert!(cfg.auth.has_client_secret());
    assert_eq!(cfg.auth.cookie.secret, "cookie-key");
    assert_eq!(
        cfg.proxies.questionnaire_response.base_url,
        "http://fhir.internal:8080"
    );
    assert_eq!(cfg.proxies.xauth.base_url, "https://xauth.internal/v0");
    assert_eq!(cfg.auth.redirect.fallback_origin, "https://app.example.org");
    assert_eq!(
        cfg.auth.redirect.allowed_origins,
        vec![
            "https://app.example.org".to_string(),
            "https://beta.example.org".to_string()
        ]
    );
    assert!(cfg.is_production());

    // 4) Empty flat variables are ignored
    let cfg = load_config_with_env(path.to_str(), &env(&[("KEYCLOAK_CLIENT_ID", "  ")]))
        .expect("blank variables ignored");
    assert_eq!(cfg.auth.client_id, "questionnaire-builder");

    // 5) Invalid values are rejected
    let err = load_config_with_env(path.to_str(), &env(&[("FUNCTIONS_PORT", "not-a-port")]))
        .unwrap_err();
    assert!(err.contains("FUNCTIONS_PORT"));

    let err = load_config_with_env(path.to_str(), &env(&[("QUESTIONNAIRE_API_URL", "nope")]))
        .unwrap_err();
    assert!(err.contains("questionnaire_response"));

    fs::write(&path, "[server]\nport = 0\n").expect("write toml");
    assert!(load_config_with_env(path.to_str(), &env(&[])).is_err());
}

#[test]
fn missing_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config_with_env(path.to_str(), &env(&[])).expect("defaults are valid");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.environment, "development");
    assert_eq!(cfg.auth.client_id, "api-debugger");
    assert!(cfg.auth.redirect.allowed_origins.is_empty());
}
