//! Decay engine.
//!
//! Items move active → cooling once their TTL elapses without enough
//! accesses, then cooling → archived after a further grace window.
//! Active items whose access count meets the policy minimum are immune.
//! Sweeps run hourly in the background and on demand per agent.

use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::Result;
use crate::models::{DecayStats, MemoryKind};

/// Cooling items archive after this many days without updates.
pub const COOLING_TO_ARCHIVED_DAYS: i32 = 30;

/// The kinds governed by decay policies.
pub const DECAY_KINDS: [MemoryKind; 5] = [
    MemoryKind::SessionMessage,
    MemoryKind::Fact,
    MemoryKind::Decision,
    MemoryKind::Task,
    MemoryKind::Event,
];

#[derive(Clone)]
pub struct DecayEngine {
    db: DbPool,
}

impl DecayEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Run a sweep, optionally scoped to one agent. Resolves the
    /// applicable policy per (agent, kind); kinds without a TTL do not
    /// decay.
    pub async fn sweep(&self, agent_scope: Option<Uuid>) -> Result<DecayStats> {
        let agents = match agent_scope {
            Some(id) => vec![db::get_agent(&self.db, id).await?],
            None => db::list_agents(&self.db).await?,
        };

        let mut stats = DecayStats::default();

        for agent in &agents {
            for kind in DECAY_KINDS {
                let Some(policy) = db::resolve_policy(&self.db, agent.id, kind).await? else {
                    continue;
                };
                let Some(ttl_days) = policy.ttl_days else {
                    continue;
                };

                let cooled = self
                    .mark_cooling(agent.id, kind, ttl_days, policy.min_accesses)
                    .await?;
                let archived = self.mark_archived(agent.id, kind).await?;
                let immune = self.count_immune(agent.id, kind, policy.min_accesses).await?;

                stats.transitioned_to_cooling += cooled;
                stats.transitioned_to_archived += archived;
                stats.immune_items += immune;

                if cooled > 0 || archived > 0 {
                    debug!(
                        agent = %agent.slug,
                        kind = %kind,
                        cooled,
                        archived,
                        "Decay transitions applied"
                    );
                }
            }
        }

        info!(
            cooling = stats.transitioned_to_cooling,
            archived = stats.transitioned_to_archived,
            immune = stats.immune_items,
            "Decay sweep complete"
        );

        Ok(stats)
    }

    /// active → cooling for stale, under-accessed rows.
    async fn mark_cooling(
        &self,
        agent_id: Uuid,
        kind: MemoryKind,
        ttl_days: i32,
        min_accesses: i32,
    ) -> Result<u64> {
        let sql = format!(
            r#"
            UPDATE {table} SET decay_status = 'cooling'
            WHERE agent_id = $1
              AND decay_status = 'active'
              AND access_count < $2
              AND (
                  (last_accessed_at IS NULL AND {time_col} < NOW() - ($3 * INTERVAL '1 day'))
                  OR last_accessed_at < NOW() - ($3 * INTERVAL '1 day')
              )
            "#,
            table = kind.table(),
            time_col = kind.time_column(),
        );

        let result = sqlx::query(&sql)
            .bind(agent_id)
            .bind(min_accesses)
            .bind(ttl_days as f64)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// cooling → archived after the grace window.
    async fn mark_archived(&self, agent_id: Uuid, kind: MemoryKind) -> Result<u64> {
        let sql = format!(
            r#"
            UPDATE {table} SET decay_status = 'archived'
            WHERE agent_id = $1
              AND decay_status = 'cooling'
              AND {updated_col} < NOW() - ($2 * INTERVAL '1 day')
            "#,
            table = kind.table(),
            updated_col = kind.updated_column(),
        );

        let result = sqlx::query(&sql)
            .bind(agent_id)
            .bind(COOLING_TO_ARCHIVED_DAYS as f64)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Active rows whose access count meets the policy minimum.
    async fn count_immune(
        &self,
        agent_id: Uuid,
        kind: MemoryKind,
        min_accesses: i32,
    ) -> Result<u64> {
        let sql = format!(
            r#"
            SELECT COUNT(*) FROM {table}
            WHERE agent_id = $1 AND decay_status = 'active' AND access_count >= $2
            "#,
            table = kind.table(),
        );

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(agent_id)
            .bind(min_accesses)
            .fetch_one(&self.db)
            .await?;

        Ok(count as u64)
    }

    /// Per-table decay status counts plus the applicable policies.
    pub async fn status(&self, agent_id: Uuid) -> Result<Value> {
        let mut tables = Map::new();

        for kind in DECAY_KINDS {
            let sql = format!(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE decay_status = 'active') AS active,
                    COUNT(*) FILTER (WHERE decay_status = 'cooling') AS cooling,
                    COUNT(*) FILTER (WHERE decay_status = 'archived') AS archived
                FROM {table}
                WHERE agent_id = $1
                "#,
                table = kind.table(),
            );

            let (active, cooling, archived): (i64, i64, i64) = sqlx::query_as(&sql)
                .bind(agent_id)
                .fetch_one(&self.db)
                .await?;

            tables.insert(
                kind.table().to_string(),
                json!({ "active": active, "cooling": cooling, "archived": archived }),
            );
        }

        let policies = db::list_policies(&self.db, Some(agent_id)).await?;

        Ok(json!({
            "tables": Value::Object(tables),
            "policies": policies,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_kind_set() {
        assert_eq!(DECAY_KINDS.len(), 5);
        assert!(!DECAY_KINDS.contains(&MemoryKind::Project));
    }

    #[test]
    fn test_grace_window() {
        assert_eq!(COOLING_TO_ARCHIVED_DAYS, 30);
    }
}
