//! # qbuilder-auth
//!
//! OAuth 2.0 / OpenID Connect building blocks for the Questionnaire builder
//! functions service.
//!
//! This crate provides:
//! - Immutable auth configuration shared by every endpoint
//! - Redirect-origin validation against an allow-list
//! - CSRF `state` generation for the authorization-code flow
//! - OIDC discovery and authorization URL construction
//! - Authorization code exchange with HTTP Basic client authentication
//! - Unverified claims preview for display purposes
//! - Encrypted session cookies carrying the access token
//! - Bearer credential resolution from headers or the session cookie
//!
//! ## Modules
//!
//! - [`config`] - Auth configuration
//! - [`redirect`] - Redirect-origin resolver
//! - [`state`] - CSRF state generation
//! - [`discovery`] - OIDC discovery document and client
//! - [`client`] - Configured OIDC client (authorization URL, token exchange)
//! - [`claims`] - Non-authoritative JWT claims preview
//! - [`cookie`] - Session cookie encryption and serialization
//! - [`credential`] - Bearer token resolution

pub mod claims;
pub mod client;
pub mod config;
pub mod cookie;
pub mod credential;
pub mod discovery;
pub mod error;
pub mod redirect;
pub mod state;

pub use claims::{ClaimsError, UserProfile, preview_claims};
pub use client::{ExchangeError, OidcClient, TokenSet, exchange_code};
pub use config::{AuthConfig, ConfigError, CookieConfig, DiscoveryConfig, RedirectConfig};
pub use cookie::{CookieError, SessionCookieCipher};
pub use credential::{CredentialSource, ResolvedCredential, normalize_bearer, resolve_credential};
pub use discovery::{DiscoveryError, OidcDiscoveryClient, OidcDiscoveryDocument};
pub use error::AuthError;
pub use redirect::RedirectOriginResolver;
pub use state::{STATE_LENGTH, generate_state, states_match};
