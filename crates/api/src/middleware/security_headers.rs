//! Security headers middleware.
//!
//! Adds security-related HTTP headers to all responses.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;

const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";

/// Middleware that adds security headers to all responses.
///
/// Headers added:
/// - `X-Content-Type-Options: nosniff`
/// - `X-Frame-Options: DENY`
/// - `X-XSS-Protection: 1; mode=block`
/// - `Strict-Transport-Security` when `security.hsts_enabled` is set
///
/// HSTS belongs only behind proper HTTPS termination, so it is off by default.
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    apply_security_headers(response.headers_mut(), state.config.security.hsts_enabled);
    response
}

fn apply_security_headers(headers: &mut HeaderMap, hsts_enabled: bool) {
    headers.insert(
        header::HeaderName::from_static(headers::X_CONTENT_TYPE_OPTIONS),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::HeaderName::from_static(headers::X_FRAME_OPTIONS),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::HeaderName::from_static(headers::X_XSS_PROTECTION),
        HeaderValue::from_static("1; mode=block"),
    );

    if hsts_enabled {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_VALUE),
        );
    }
}

/// Security header names.
pub mod headers {
    pub const X_CONTENT_TYPE_OPTIONS: &str = "x-content-type-options";
    pub const X_FRAME_OPTIONS: &str = "x-frame-options";
    pub const X_XSS_PROTECTION: &str = "x-xss-protection";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_applied_without_hsts() {
        let mut map = HeaderMap::new();
        apply_security_headers(&mut map, false);

        assert_eq!(map.get(headers::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(map.get(headers::X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(map.get(headers::X_XSS_PROTECTION).unwrap(), "1; mode=block");
        assert!(map.get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[test]
    fn test_hsts_applied_when_enabled() {
        let mut map = HeaderMap::new();
        apply_security_headers(&mut map, true);

        let hsts = map.get(header::STRICT_TRANSPORT_SECURITY).unwrap();
        assert!(hsts.to_str().unwrap().contains("31536000"));
        assert!(hsts.to_str().unwrap().contains("includeSubDomains"));
    }
}
