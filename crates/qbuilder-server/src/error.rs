//! HTTP error responses for the OAuth endpoints.

use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use qbuilder_auth::{AuthError, ExchangeError};
use serde_json::{Value, json};

/// Errors returned by the OAuth endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Discovery or URL construction failed while starting a login.
    #[error("Failed to generate authorization URL")]
    AuthorizationUrl {
        message: String,
        /// Error source chain, only populated outside production.
        stack: Option<String>,
    },

    #[error("Invalid query parameters: {0}")]
    InvalidQuery(String),

    #[error("Missing authorization code.")]
    MissingCode,

    #[error("State mismatch. Please try signing in again.")]
    StateMismatch,

    /// The identity provider rejected or never answered the code exchange.
    #[error("Token exchange failed")]
    TokenExchange { status: StatusCode, detail: Value },

    #[error("Internal error")]
    Internal {
        message: String,
        stack: Option<String>,
    },
}

impl ApiError {
    pub fn authorization_url(err: &AuthError, expose_details: bool) -> Self {
        let chain = error_chain(err);
        Self::AuthorizationUrl {
            message: chain.join(": "),
            stack: expose_details.then(|| format_stack(&chain)),
        }
    }

    pub fn token_exchange(err: &ExchangeError) -> Self {
        Self::TokenExchange {
            status: StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST),
            detail: err.detail(),
        }
    }

    pub fn internal(err: &(dyn std::error::Error + 'static), expose_details: bool) -> Self {
        let chain = error_chain(err);
        Self::Internal {
            message: chain.join(": "),
            stack: expose_details.then(|| format_stack(&chain)),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthorizationUrl { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidQuery(_) | Self::MissingCode | Self::StateMismatch => {
                StatusCode::BAD_REQUEST
            }
            Self::TokenExchange { status, .. } => *status,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidQuery(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::AuthorizationUrl { message, stack } | Self::Internal { message, stack } => {
                let mut body = json!({
                    "error": self.to_string(),
                    "message": message,
                });
                if let Some(stack) = stack {
                    body["stack"] = Value::String(stack.clone());
                }
                body
            }
            Self::InvalidQuery(_) | Self::MissingCode | Self::StateMismatch => {
                json!({ "error": self.to_string() })
            }
            Self::TokenExchange { detail, .. } => json!({
                "message": self.to_string(),
                "error": detail,
            }),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %body, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %body, "request rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// Display strings of an error and all of its sources, outermost first.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        chain.push(e.to_string());
        current = e.source();
    }
    chain
}

fn format_stack(chain: &[String]) -> String {
    chain
        .iter()
        .enumerate()
        .map(|(i, msg)| format!("{i}: {msg}"))
        .collect::<Vec<_>>()
        .join("\n")
}
