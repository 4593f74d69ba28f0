//! Viewer authorization.
//!
//! The hub never authenticates anyone. The HTTP layer asks an injected
//! `SessionValidator` whether a request may proceed.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::DashboardConfig;

/// Decides whether a viewer request is authorized.
pub trait SessionValidator: Send + Sync {
    fn authorize(&self, headers: &HeaderMap) -> bool;
}

/// Accepts every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl SessionValidator for AllowAll {
    fn authorize(&self, _headers: &HeaderMap) -> bool {
        true
    }
}

/// HTTP basic auth against a single username/password pair.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn credentials(headers: &HeaderMap) -> Option<(String, String)> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let encoded = value.strip_prefix("Basic ")?;
        let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
        let (user, pass) = decoded.split_once(':')?;
        Some((user.to_string(), pass.to_string()))
    }
}

impl SessionValidator for BasicAuth {
    fn authorize(&self, headers: &HeaderMap) -> bool {
        Self::credentials(headers)
            .is_some_and(|(user, pass)| user == self.username && pass == self.password)
    }
}

/// Validator implied by the config: basic auth when credentials are set.
pub fn validator_from_config(config: &DashboardConfig) -> Arc<dyn SessionValidator> {
    if config.auth_enabled() {
        Arc::new(BasicAuth::new(&config.username, &config.password))
    } else {
        Arc::new(AllowAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_basic_auth_accepts_matching_credentials() {
        let auth = BasicAuth::new("ops", "s3cret");
        let encoded = STANDARD.encode("ops:s3cret");
        assert!(auth.authorize(&headers_with(&format!("Basic {encoded}"))));
    }

    #[test]
    fn test_basic_auth_rejects_wrong_or_missing_credentials() {
        let auth = BasicAuth::new("ops", "s3cret");
        let wrong = STANDARD.encode("ops:guess");
        assert!(!auth.authorize(&headers_with(&format!("Basic {wrong}"))));
        assert!(!auth.authorize(&headers_with("Bearer abc")));
        assert!(!auth.authorize(&headers_with("Basic !!!")));
        assert!(!auth.authorize(&HeaderMap::new()));
    }

    #[test]
    fn test_password_may_contain_colon() {
        let auth = BasicAuth::new("ops", "a:b");
        let encoded = STANDARD.encode("ops:a:b");
        assert!(auth.authorize(&headers_with(&format!("Basic {encoded}"))));
    }

    #[test]
    fn test_validator_from_config() {
        let open = validator_from_config(&DashboardConfig::default());
        assert!(open.authorize(&HeaderMap::new()));

        let config = DashboardConfig {
            username: "ops".to_string(),
            password: "s3cret".to_string(),
            ..Default::default()
        };
        assert!(!validator_from_config(&config).authorize(&HeaderMap::new()));
    }
}
