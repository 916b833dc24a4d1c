pub mod health;
pub mod oauth;
pub mod proxy;

use axum::http::{
    HeaderMap, HeaderName,
    header::{ORIGIN, REFERER},
};

use crate::server::AppState;

/// Resolves the redirect origin from the query parameter and the
/// `Origin`/`Referer` request headers.
pub(crate) fn resolve_origin(
    state: &AppState,
    redirect_origin: Option<&str>,
    headers: &HeaderMap,
) -> String {
    let header = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
    state
        .resolver
        .resolve(redirect_origin, header(ORIGIN), header(REFERER))
}
