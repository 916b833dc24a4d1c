use axum::{
    body::Body,
    http::{
        HeaderName, HeaderValue, Request,
        header::{CACHE_CONTROL, EXPIRES, PRAGMA},
    },
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// Request ID middleware: preserves an incoming x-request-id or generates one,
// and echoes it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    let req_id_value = match req.headers().get(&header_name).cloned() {
        Some(value) => Some(value),
        None => HeaderValue::from_str(&Uuid::new_v4().to_string()).ok(),
    };

    let Some(req_id_value) = req_id_value else {
        return next.run(req).await;
    };

    // Available to the trace span and handlers
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

// Browsers and intermediaries must never cache OAuth or proxy responses.
// Handlers that set their own Cache-Control keep it.
pub async fn no_cache(req: Request<Body>, next: Next) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
    }
    headers
        .entry(PRAGMA)
        .or_insert(HeaderValue::from_static("no-cache"));
    headers.entry(EXPIRES).or_insert(HeaderValue::from_static("0"));

    res
}
