pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod server;

pub use config::{AppConfig, LoggingConfig, ProxiesConfig, ProxyConfig, ServerConfig};
pub use error::ApiError;
pub use observability::{init_tracing, shutdown_tracing};
pub use server::{AppState, FunctionsServer, ServerBuilder, build_app};
