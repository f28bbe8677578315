//! API key model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted API key. The raw key is returned exactly once at
/// creation; only its SHA-256 hash and display prefix are stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub key_prefix: String,
    pub name: String,
    pub agent_id: Option<Uuid>,
    pub permissions: Value,
    pub rate_limit: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|e| e < Utc::now())
    }

    pub fn permissions_vec(&self) -> Vec<String> {
        self.permissions
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_permission(&self, perm: &str) -> bool {
        let perms = self.permissions_vec();
        perms.iter().any(|p| p == perm || p == "admin")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{new_id, now};
    use serde_json::json;

    fn key_with(perms: serde_json::Value) -> ApiKey {
        ApiKey {
            id: new_id(),
            key_hash: "h".into(),
            key_prefix: "hm_test".into(),
            name: "test".into(),
            agent_id: None,
            permissions: perms,
            rate_limit: 1000,
            expires_at: None,
            last_used_at: None,
            revoked_at: None,
            created_at: now(),
        }
    }

    #[test]
    fn test_admin_implies_all() {
        let key = key_with(json!(["admin"]));
        assert!(key.has_permission("read"));
        assert!(key.has_permission("write"));
    }

    #[test]
    fn test_read_only() {
        let key = key_with(json!(["read"]));
        assert!(key.has_permission("read"));
        assert!(!key.has_permission("write"));
    }

    #[test]
    fn test_expiry() {
        let mut key = key_with(json!(["read"]));
        assert!(!key.is_expired());
        key.expires_at = Some(now() - chrono::Duration::hours(1));
        assert!(key.is_expired());
    }
}
