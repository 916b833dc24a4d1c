use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router, middleware,
    routing::{any, get},
};
use qbuilder_auth::{RedirectOriginResolver, SessionCookieCipher};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::AppConfig,
    middleware as app_middleware,
    routes::{health, oauth, proxy},
};

/// Prefix under which the functions are also reachable, matching the
/// hosted deployment layout.
pub const FUNCTIONS_PREFIX: &str = "/.netlify/functions";

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http_client: reqwest::Client,
    pub cipher: Arc<SessionCookieCipher>,
    pub resolver: Arc<RedirectOriginResolver>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("qbuilder-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        if config.auth.cookie.uses_default_secret() {
            tracing::warn!("Session cookie key is the built-in default; set CINCINNO in deployment");
        }
        if !config.auth.has_client_secret() {
            tracing::warn!(client_id = %config.auth.client_id, "No client secret configured");
        }

        Ok(Self {
            cipher: Arc::new(SessionCookieCipher::new(&config.auth.cookie.secret)),
            resolver: Arc::new(RedirectOriginResolver::new(&config.auth.redirect)),
            http_client,
            config: Arc::new(config),
        })
    }
}

/// Routes of the individual functions, mounted twice by [`build_app`].
fn function_routes() -> Router<AppState> {
    // OAuth endpoints are called with credentials from the browser app.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let oauth_routes = Router::new()
        .route("/authorization-code", get(oauth::authorization_code))
        .route("/get-token", get(oauth::get_token))
        .route(
            "/end-session",
            get(oauth::end_session).post(oauth::end_session),
        )
        .route("/diagnose", get(health::diagnose))
        .layer(cors);

    // Proxies answer OPTIONS and set their own CORS headers.
    let proxy_routes = Router::new()
        .route(
            "/questionnaire-response-proxy",
            any(proxy::questionnaire_response_proxy),
        )
        .route("/xauth-proxy", any(proxy::xauth_proxy));

    oauth_routes
        .merge(proxy_routes)
        .layer(middleware::from_fn(app_middleware::no_cache))
}

pub fn build_app(cfg: AppConfig) -> anyhow::Result<Router> {
    let body_limit = cfg.server.body_limit_bytes;
    let state = AppState::new(cfg)?;
    let functions = function_routes();

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/test", get(health::test))
        .merge(functions.clone())
        .nest(FUNCTIONS_PREFIX, functions)
        .with_state(state)
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        // Outermost so the trace span sees the request id.
        .layer(middleware::from_fn(app_middleware::request_id));

    Ok(app)
}

pub struct FunctionsServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<FunctionsServer> {
        tracing::info!(
            environment = %self.config.environment,
            issuer = %self.config.auth.issuer,
            questionnaire_api = %self.config.proxies.questionnaire_response.base_url,
            xauth_api = %self.config.proxies.xauth.base_url,
            redirect_fallback = %self.config.auth.redirect.fallback_origin,
            allowed_origins = ?self.config.auth.redirect.allowed_origins,
            "Functions server configured"
        );

        let app = build_app(self.config)?;
        Ok(FunctionsServer {
            addr: self.addr,
            app,
        })
    }
}

impl FunctionsServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
