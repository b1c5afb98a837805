//! Admission limiting middleware.
//!
//! Wraps every route. A rejected request gets `429` with
//! `{"error": "Rate limit exceeded. Please try again later."}` and never
//! reaches its handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::routes::AppState;
use super::types::ApiError;

/// Key shared by requests whose origin cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&req, state.config.trust_forwarded_for);
    match state.limiter.check(&key) {
        Ok(()) => next.run(req).await,
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Client identity for rate limiting: the peer IP, or the forwarded client
/// address when `trust_forwarded` is set and a proxy header is present.
pub fn client_key(req: &Request<Body>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(ip) = forwarded_ip(req.headers()) {
            return ip;
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request<Body> {
        Request::builder().uri("/tasks").body(Body::empty()).unwrap()
    }

    #[test]
    fn test_uses_peer_ip() {
        let mut req = request();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([1, 2, 3, 4], 5555))));
        assert_eq!(client_key(&req, false), "1.2.3.4");
    }

    #[test]
    fn test_missing_peer_is_unknown() {
        assert_eq!(client_key(&request(), false), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_forwarded_headers_only_when_trusted() {
        let mut req = request();
        req.headers_mut()
            .insert("x-forwarded-for", "9.9.9.9, 10.0.0.1".parse().unwrap());
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 80))));

        assert_eq!(client_key(&req, true), "9.9.9.9");
        assert_eq!(client_key(&req, false), "127.0.0.1");
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut req = request();
        req.headers_mut()
            .insert("x-real-ip", "8.8.4.4".parse().unwrap());
        assert_eq!(client_key(&req, true), "8.8.4.4");
    }
}
