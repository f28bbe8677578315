//! Bearer token authentication middleware.
//!
//! Tokens are either persisted API keys (SHA-256 of the raw key matched
//! against `key_hash`) or the configured development key, which grants
//! read/write/admin with no agent scope.
//!
//! # Security model
//!
//! - Only the key hash is stored; lookup is by hash with a unique index
//! - The development key is compared in constant time
//! - Revoked or expired keys are rejected with 401
//! - `last_used_at` is stamped fire-and-forget off the request path

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{config, db, error::Error, AppState};

/// Authentication context injected into request extensions after
/// successful validation.
#[derive(Clone, Debug)]
pub struct AuthContext {
    /// Persisted key id; None for the development key.
    pub key_id: Option<Uuid>,
    /// Agent scope of the key, when present.
    pub agent_id: Option<Uuid>,
    pub permissions: Vec<String>,
}

impl AuthContext {
    fn dev() -> Self {
        Self {
            key_id: None,
            agent_id: None,
            permissions: vec!["read".into(), "write".into(), "admin".into()],
        }
    }

    pub fn has_permission(&self, perm: &str) -> bool {
        self.permissions.iter().any(|p| p == perm || p == "admin")
    }

    /// 403 unless the key carries the permission.
    pub fn require(&self, perm: &str) -> Result<(), Error> {
        if self.has_permission(perm) {
            Ok(())
        } else {
            Err(Error::PermissionDenied)
        }
    }

    /// 403 when the key is scoped to a different agent.
    pub fn check_agent(&self, agent_id: Uuid) -> Result<(), Error> {
        match self.agent_id {
            Some(scope) if scope != agent_id => Err(Error::PermissionDenied),
            _ => Ok(()),
        }
    }
}

fn extract_bearer(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(String::from)
}

/// Middleware that requires a valid API key on every /api/v1 route.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let token = extract_bearer(&req).ok_or(Error::Unauthenticated)?;

    let context = validate_token(&state, &token).await?;

    if let Some(key_id) = context.key_id {
        // Stamp last_used_at without blocking the request.
        let db = state.db.clone();
        tokio::spawn(async move {
            db::touch_api_key(&db, key_id).await;
        });
    }

    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

async fn validate_token(state: &AppState, token: &str) -> Result<AuthContext, Error> {
    if let Some(dev_key) = &config::config().auth.dev_api_key {
        if constant_time_eq(token, dev_key) {
            return Ok(AuthContext::dev());
        }
    }

    let token_hash = hash_token(token);

    let key = db::find_api_key_by_hash(&state.db, &token_hash)
        .await?
        .ok_or(Error::Unauthenticated)?;

    if key.is_revoked() || key.is_expired() {
        return Err(Error::Unauthenticated);
    }

    Ok(AuthContext {
        key_id: Some(key.id),
        agent_id: key.agent_id,
        permissions: key.permissions_vec(),
    })
}

/// Hash a token using SHA-256.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token() {
        let token = "hm_abc12345_secretpart";
        let hash = hash_token(token);

        // Hash should be consistent and 64 hex chars (256 bits)
        assert_eq!(hash, hash_token(token));
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, hash_token("hm_abc12345_different"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(!constant_time_eq("hello", "world"));
        assert!(!constant_time_eq("hello", "hello!"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_dev_context_has_all_permissions() {
        let ctx = AuthContext::dev();
        assert!(ctx.has_permission("read"));
        assert!(ctx.has_permission("write"));
        assert!(ctx.has_permission("admin"));
        assert!(ctx.require("write").is_ok());
    }

    #[test]
    fn test_read_only_context() {
        let ctx = AuthContext {
            key_id: Some(Uuid::new_v4()),
            agent_id: None,
            permissions: vec!["read".into()],
        };
        assert!(ctx.require("read").is_ok());
        assert!(matches!(ctx.require("write"), Err(Error::PermissionDenied)));
    }
}
