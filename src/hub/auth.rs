//! Authorization gate for the tool endpoint
//!
//! Implements Bearer token authentication with constant-time comparison.

use super::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::debug;

/// List of paths that don't require authentication
const PUBLIC_PATHS: &[&str] = &["/", "/version"];

/// Client id attached to every accepted credential
pub const CLIENT_ID: &str = "finder-client";

/// What an accepted credential is allowed to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub client_id: String,
    pub scopes: Vec<String>,
}

/// Compares presented credentials against the single configured secret
pub struct AuthGate {
    secret: String,
}

impl AuthGate {
    pub fn new(secret: impl Into<String>) -> Self {
        AuthGate {
            secret: secret.into(),
        }
    }

    /// Allow with a grant, or deny with `None`. An empty secret denies everything.
    pub fn authorize(&self, credential: &str) -> Option<AccessGrant> {
        if self.secret.is_empty() || !constant_time_eq(credential.as_bytes(), self.secret.as_bytes())
        {
            return None;
        }
        Some(AccessGrant {
            client_id: CLIENT_ID.to_string(),
            scopes: vec!["*".to_string()],
        })
    }
}

/// Authentication middleware
///
/// Checks for a Bearer token in the Authorization header. On success the
/// [`AccessGrant`] is stored in the request extensions; on failure the
/// handler is never reached.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    // Check if path is public
    let path = req.uri().path();
    if PUBLIC_PATHS.iter().any(|p| *p == path) {
        return Ok(next.run(req).await);
    }

    let grant = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .and_then(|token| state.gate.authorize(token));

    match grant {
        Some(grant) => {
            debug!("Auth successful for {}", grant.client_id);
            req.extensions_mut().insert(grant);
            Ok(next.run(req).await)
        }
        None => {
            debug!("Auth failed - missing or invalid token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"wrong"));
        assert!(!constant_time_eq(b"secret", b"secre"));
        assert!(!constant_time_eq(b"secret", b"secrets"));
    }

    #[test]
    fn test_gate_allow_and_deny() {
        let gate = AuthGate::new("s3cret");
        let grant = gate.authorize("s3cret").unwrap();
        assert_eq!(grant.client_id, CLIENT_ID);
        assert_eq!(grant.scopes, vec!["*".to_string()]);
        assert!(gate.authorize("S3CRET").is_none());
        assert!(gate.authorize("").is_none());
    }

    #[test]
    fn test_empty_secret_denies() {
        assert!(AuthGate::new("").authorize("").is_none());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn test_public_paths() {
        assert!(PUBLIC_PATHS.contains(&"/"));
        assert!(PUBLIC_PATHS.contains(&"/version"));
        assert!(!PUBLIC_PATHS.contains(&"/mcp"));
    }
}
