//! CORS handling
//!
//! `create-payment-intent` answers with a single origin taken from an
//! allow-list: the caller's origin when listed, otherwise the first entry.
//! The other endpoints allow any origin.

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, ORIGIN,
};
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Origins allowed to call the checkout endpoint. Never empty.
#[derive(Debug, Clone)]
pub struct OriginAllowList {
    origins: Vec<String>,
}

impl OriginAllowList {
    /// Returns `None` for an empty list.
    pub fn new(origins: Vec<String>) -> Option<Self> {
        if origins.is_empty() {
            None
        } else {
            Some(Self { origins })
        }
    }

    /// The origin to echo back for a request carrying `origin`.
    pub fn resolve<'a>(&'a self, origin: Option<&str>) -> &'a str {
        origin
            .and_then(|o| self.origins.iter().find(|allowed| allowed.as_str() == o))
            .unwrap_or(&self.origins[0])
    }
}

/// Middleware adding the allow-list CORS headers to every response, errors included.
pub async fn checkout_cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(request).await;

    let allowed = state.allowed_origins.resolve(origin.as_deref());
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(allowed) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

/// `Access-Control-Allow-Origin: *` for the status and webhook endpoints.
pub fn open_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}
