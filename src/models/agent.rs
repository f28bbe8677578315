//! Agent models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A named principal owning a private memory namespace.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub id: Uuid,
    pub slug: String,
    pub display_name: String,
    pub description: Option<String>,
    /// Small arbitrary JSON document for persistent self-state,
    /// editable by merge-patch.
    pub core_memory: Value,
    pub config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validate an agent or project slug: `^[a-z0-9][a-z0-9_-]*$`.
pub fn is_valid_slug(slug: &str) -> bool {
    let mut chars = slug.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Derive a slug from a display name: lowercase, runs of
/// non-alphanumerics collapse to '-', trimmed of leading/trailing '-'.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_slugs() {
        assert!(is_valid_slug("a-b_c"));
        assert!(is_valid_slug("agent1"));
        assert!(is_valid_slug("0x"));
    }

    #[test]
    fn test_invalid_slugs() {
        assert!(!is_valid_slug("abc!"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("_leading"));
        assert!(!is_valid_slug("UPPER"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Project"), "my-project");
        assert_eq!(slugify("  Alpha -- Beta!  "), "alpha-beta");
        assert_eq!(slugify("v2.0 Release"), "v2-0-release");
    }
}
