//! Bearer-token check for the privileged routes.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Admin tokens accepted by `require_admin`.
#[derive(Debug, Clone, Default)]
pub struct AdminAuth {
    tokens: HashSet<String>,
}

impl AdminAuth {
    /// Build from configured tokens. Blank entries are rejected.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self, String> {
        let mut valid = HashSet::new();
        for token in tokens {
            let trimmed = token.trim();
            if trimmed.is_empty() {
                return Err("Empty admin token value in configuration".to_string());
            }
            valid.insert(trimmed.to_string());
        }
        Ok(Self { tokens: valid })
    }

    /// No tokens configured: every caller is treated as privileged.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.tokens.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn verify(&self, provided: &str) -> bool {
        let mut found = false;
        for expected in &self.tokens {
            if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
                found = true;
            }
        }
        found
    }
}

/// Middleware guarding `/direct-sql`, `/analytics` and `/clear-cache`.
pub async fn require_admin(
    State(auth): State<Arc<AdminAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !auth.is_enabled() {
        debug!(path = %request.uri().path(), "Admin check disabled");
        return next.run(request).await;
    }

    let token = match extract_bearer_token(&request) {
        Ok(Some(token)) => token,
        Ok(None) => {
            warn!(path = %request.uri().path(), "Admin check failed: missing Authorization header");
            return unauthorized_response(
                "Missing Bearer token in Authorization header",
                "Include an admin token: 'Authorization: Bearer <token>'",
            );
        }
        Err(msg) => {
            warn!("Admin check failed: invalid header format");
            return unauthorized_response(
                msg,
                "Use the format: 'Authorization: Bearer <your-token>'",
            );
        }
    };

    if auth.verify(token) {
        next.run(request).await
    } else {
        warn!(token_prefix = %mask_token(token), "Admin check failed: invalid token");
        unauthorized_response(
            "Invalid admin token",
            "Check that you are using a token configured with --admin-token",
        )
    }
}

fn extract_bearer_token(request: &Request<Body>) -> Result<Option<&str>, &'static str> {
    let Some(auth_header) = request.headers().get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Authorization header contains invalid characters")?;

    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err("Invalid Authorization header format. Expected 'Bearer <token>'");
    };
    if token.is_empty() {
        return Err("Bearer token is empty");
    }

    Ok(Some(token))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn mask_token(token: &str) -> String {
    match token.char_indices().nth(3) {
        Some((idx, _)) => format!("{}***", &token[..idx]),
        None => "***".to_string(),
    }
}

fn unauthorized_response(message: impl Into<String>, suggestion: impl Into<String>) -> Response {
    #[derive(Serialize)]
    struct Unauthorized {
        success: bool,
        error: String,
        code: &'static str,
        suggestion: String,
    }

    let body = Unauthorized {
        success: false,
        error: message.into(),
        code: "unauthorized",
        suggestion: suggestion.into(),
    };
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tokens_rejects_blank() {
        assert!(AdminAuth::from_tokens(vec!["  ".to_string()]).is_err());
        let auth = AdminAuth::from_tokens(vec![" secret ".to_string()]).unwrap();
        assert!(auth.is_enabled());
        assert!(auth.verify("secret"));
        assert!(!auth.verify("secrets"));
    }

    #[test]
    fn test_disabled_has_no_tokens() {
        let auth = AdminAuth::disabled();
        assert!(!auth.is_enabled());
        assert_eq!(auth.token_count(), 0);
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("ab"), "***");
        assert_eq!(mask_token("abcdef"), "abc***");
        assert_eq!(mask_token("ééé"), "***");
    }
}
