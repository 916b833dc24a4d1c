use qbuilder_auth::AuthConfig;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Deployment environment. Anything other than `production` exposes
    /// error details in responses.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// OAuth client, session cookie and redirect settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Upstream services behind the reverse proxies
    #[serde(default)]
    pub proxies: ProxiesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            environment: default_environment(),
            auth: AuthConfig::default(),
            proxies: ProxiesConfig::default(),
        }
    }
}

fn default_environment() -> String {
    "development".into()
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        self.auth.validate().map_err(|e| format!("auth: {e}"))?;
        self.proxies
            .questionnaire_response
            .validate()
            .map_err(|e| format!("proxies.questionnaire_response: {e}"))?;
        self.proxies
            .xauth
            .validate()
            .map_err(|e| format!("proxies.xauth: {e}"))?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    9000
}
fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One upstream behind a reverse proxy endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Upstream base URL; the `path` query parameter is appended to it.
    pub base_url: String,
    /// Path used when the request has no `path` parameter.
    pub default_path: String,
    /// Methods forwarded upstream. `OPTIONS` is always answered locally.
    pub allowed_methods: Vec<String>,
    /// Answer 401 instead of forwarding when no bearer token is found.
    pub require_token: bool,
    /// Extra request header that may carry the bearer token.
    #[serde(default)]
    pub custom_token_header: Option<String>,
    /// `Content-Type` sent upstream.
    pub content_type: String,
    /// `Accept` sent upstream.
    pub accept: String,
    /// `Access-Control-Allow-Headers` value.
    pub allow_headers: String,
    pub timeout_secs: u64,
    /// Name used in the 502 message, e.g. "Failed to reach XAuth server".
    pub upstream_name: String,
}

impl ProxyConfig {
    pub fn questionnaire_response() -> Self {
        Self {
            base_url: "http://172.22.0.27:8080".into(),
            default_path: "/QuestionnaireResponse".into(),
            allowed_methods: vec!["GET".into(), "POST".into(), "DELETE".into()],
            require_token: false,
            custom_token_header: Some("X-Koala-Access-Token".into()),
            content_type: "application/fhir+json".into(),
            accept: "application/fhir+json".into(),
            allow_headers: "Content-Type, Authorization, X-Koala-Access-Token".into(),
            timeout_secs: 30,
            upstream_name: "Questionnaire backend".into(),
        }
    }

    pub fn xauth() -> Self {
        Self {
            base_url: "https://api.koala.primbs.dev/api/xauth/v0".into(),
            default_path: "/".into(),
            allowed_methods: vec!["GET".into()],
            require_token: true,
            custom_token_header: None,
            content_type: "application/json".into(),
            accept: "application/json".into(),
            allow_headers: "Content-Type, Authorization".into(),
            timeout_secs: 30,
            upstream_name: "XAuth server".into(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Methods for the `Access-Control-Allow-Methods` header, `OPTIONS` included.
    pub fn cors_methods(&self) -> String {
        let mut methods = self.allowed_methods.clone();
        if !methods.iter().any(|m| m.eq_ignore_ascii_case("OPTIONS")) {
            methods.push("OPTIONS".into());
        }
        methods.join(",")
    }

    pub fn allows(&self, method: &str) -> bool {
        self.allowed_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }

    pub fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.base_url)
            .map_err(|e| format!("base_url '{}': {e}", self.base_url))?;
        if self.allowed_methods.is_empty() {
            return Err("allowed_methods cannot be empty".into());
        }
        for method in &self.allowed_methods {
            axum::http::Method::from_bytes(method.as_bytes())
                .map_err(|_| format!("invalid HTTP method '{method}'"))?;
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be > 0".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxiesConfig {
    #[serde(default = "ProxyConfig::questionnaire_response")]
    pub questionnaire_response: ProxyConfig,
    #[serde(default = "ProxyConfig::xauth")]
    pub xauth: ProxyConfig,
}

impl Default for ProxiesConfig {
    fn default() -> Self {
        Self {
            questionnaire_response: ProxyConfig::questionnaire_response(),
            xauth: ProxyConfig::xauth(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, ConfigBuilder, Environment, File, Map, builder::DefaultState};
    use std::path::PathBuf;

    /// Deployment variables mapped onto config keys, applied last.
    const FLAT_ENV: &[(&str, &str)] = &[
        ("KEYCLOAK_ISSUER", "auth.issuer"),
        ("KEYCLOAK_CLIENT_ID", "auth.client_id"),
        ("KEYCLOAK_CLIENT_SECRET", "auth.client_secret"),
        ("CINCINNO", "auth.cookie.secret"),
        ("APP_REDIRECT_FALLBACK", "auth.redirect.fallback_origin"),
        ("QUESTIONNAIRE_API_URL", "proxies.questionnaire_response.base_url"),
        ("XAUTH_API_URL", "proxies.xauth.base_url"),
        ("NODE_ENV", "environment"),
    ];

    /// Loads configuration from an optional TOML file and the process environment.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let env: Map<String, String> = std::env::vars().collect();
        load_config_with_env(path, &env)
    }

    /// Loads configuration using `env` in place of the process environment.
    ///
    /// Precedence, lowest first: built-in defaults, TOML file,
    /// `QBUILDER__SECTION__KEY` variables, flat deployment variables.
    pub fn load_config_with_env(
        path: Option<&str>,
        env: &Map<String, String>,
    ) -> Result<AppConfig, String> {
        let defaults = Config::try_from(&AppConfig::default())
            .map_err(|e| format!("config defaults error: {e}"))?;
        let mut builder = Config::builder().add_source(defaults);

        let file = path.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("qbuilder.toml"));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }

        // e.g. QBUILDER__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("QBUILDER")
                .try_parsing(true)
                .separator("__")
                .source(Some(env.clone())),
        );

        builder = apply_flat_env(builder, env)?;

        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    fn apply_flat_env(
        mut builder: ConfigBuilder<DefaultState>,
        env: &Map<String, String>,
    ) -> Result<ConfigBuilder<DefaultState>, String> {
        let lookup = |name: &str| {
            env.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        for (var, key) in FLAT_ENV {
            builder = builder
                .set_override_option(*key, lookup(var))
                .map_err(|e| format!("{var}: {e}"))?;
        }

        let origins = lookup("APP_REDIRECT_ORIGINS").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
        builder = builder
            .set_override_option("auth.redirect.allowed_origins", origins)
            .map_err(|e| format!("APP_REDIRECT_ORIGINS: {e}"))?;

        let port = lookup("FUNCTIONS_PORT")
            .map(|raw| {
                raw.parse::<u16>()
                    .map(i64::from)
                    .map_err(|e| format!("FUNCTIONS_PORT '{raw}': {e}"))
            })
            .transpose()?;
        builder = builder
            .set_override_option("server.port", port)
            .map_err(|e| format!("FUNCTIONS_PORT: {e}"))?;

        Ok(builder)
    }
}
