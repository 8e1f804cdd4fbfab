//! Installation identity extraction.
//!
//! Callers are identified by an opaque installation id; license verification
//! itself lives in the upstream licensing service and is not re-checked here.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::errors::AppError;

/// The tenant identity attached to every analysis request.
#[derive(Debug, Clone)]
pub struct Installation {
    pub install_id: String,
    pub site_url: Option<String>,
    /// Plan name hint from the caller; the cached value wins (see `license`).
    pub plan: Option<String>,
}

pub(crate) fn parse_install_headers(headers: &HeaderMap) -> Result<Installation, AppError> {
    let install_id = headers
        .get("x-install-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let site_url = headers
        .get("x-site-url")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let plan = headers
        .get("x-plan")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    Ok(Installation {
        install_id,
        site_url,
        plan,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for Installation
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_install_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_missing_install_id_is_unauthorized() {
        let result = parse_install_headers(&headers(&[("x-site-url", "https://example.com")]));
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_blank_install_id_is_unauthorized() {
        let result = parse_install_headers(&headers(&[("x-install-id", "  ")]));
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_full_header_set_parses() {
        let install = parse_install_headers(&headers(&[
            ("x-install-id", "install-123"),
            ("x-site-url", "https://example.com"),
            ("x-plan", "pro"),
        ]))
        .unwrap();
        assert_eq!(install.install_id, "install-123");
        assert_eq!(install.site_url.as_deref(), Some("https://example.com"));
        assert_eq!(install.plan.as_deref(), Some("pro"));
    }

    #[test]
    fn test_optional_headers_default_to_none() {
        let install = parse_install_headers(&headers(&[("x-install-id", "install-123")])).unwrap();
        assert!(install.site_url.is_none());
        assert!(install.plan.is_none());
    }
}
